//! Prepares the database and imports per-guild prefixes from a legacy
//! `prefixes.json` file (`{"<guild_id>": "<prefix>"}`).
//!
//! Usage: `migrate [path/to/prefixes.json]`

use perchbot::config::Config;
use perchbot::db::Database;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LEGACY_PREFIX_FILE: &str = "prefixes.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let db = Database::new(
        config.database_path.clone(),
        config.prefix.clone(),
        config.settings_cache_capacity,
    );
    db.ensure_ready().await?;
    println!("Database ready at {}", db.path().display());

    let legacy_path: PathBuf = std::env::args()
        .nth(1)
        .unwrap_or_else(|| LEGACY_PREFIX_FILE.to_string())
        .into();
    if !legacy_path.exists() {
        info!("No legacy prefix file at {}, nothing to import", legacy_path.display());
        return Ok(());
    }

    let raw = std::fs::read_to_string(&legacy_path)?;
    let prefixes = parse_legacy_prefixes(&raw)?;
    let mut imported = 0usize;
    for (guild_id, prefix) in prefixes {
        db.set_guild_prefix(guild_id, Some(&prefix)).await?;
        imported += 1;
    }
    println!("Imported {} guild prefix(es) from {}", imported, legacy_path.display());
    Ok(())
}

/// Reads the legacy map. Entries whose key is not a guild id are skipped.
fn parse_legacy_prefixes(raw: &str) -> anyhow::Result<Vec<(u64, String)>> {
    let entries: BTreeMap<String, String> = serde_json::from_str(raw)?;
    let mut prefixes = Vec::with_capacity(entries.len());
    for (key, prefix) in entries {
        match key.trim().parse::<u64>() {
            Ok(guild_id) => prefixes.push((guild_id, prefix)),
            Err(_) => warn!("Skipping legacy prefix entry with invalid guild id {:?}", key),
        }
    }
    Ok(prefixes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_legacy_prefixes() {
        let raw = r#"{"123": "?", "not-a-guild": "$", "456": ">>"}"#;
        let parsed = parse_legacy_prefixes(raw).unwrap();
        assert_eq!(parsed, vec![(123, "?".to_string()), (456, ">>".to_string())]);

        assert!(parse_legacy_prefixes("{}").unwrap().is_empty());
        assert!(parse_legacy_prefixes("[1, 2]").is_err());
    }

    #[tokio::test]
    async fn test_import_into_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("bot.db"), "!", 16);
        for (guild_id, prefix) in parse_legacy_prefixes(r#"{"77": " % "}"#).unwrap() {
            db.set_guild_prefix(guild_id, Some(&prefix)).await.unwrap();
        }
        assert_eq!(db.get_prefix(Some(77)).await.unwrap(), "%");
        assert_eq!(db.get_prefix(Some(78)).await.unwrap(), "!");
    }
}
