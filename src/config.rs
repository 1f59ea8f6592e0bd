use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub prefix: String,
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    pub autosave_interval: Duration,
    pub settings_cache_capacity: usize,
    pub status_message: String,
    pub dev_guild_id: Option<u64>,
}

pub const DEFAULT_PREFIX: &str = "!";
const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        let discord_token = env::var("DISCORD_TOKEN")
            .or_else(|_| env::var("TOKEN"))
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("DISCORD_TOKEN must be set"))?;

        let autosave_interval = match env::var("AUTOSAVE_INTERVAL") {
            Ok(raw) => humantime::parse_duration(raw.trim()).map_err(|e| {
                anyhow::anyhow!("AUTOSAVE_INTERVAL must be a duration like '6h': {}", e)
            })?,
            Err(_) => DEFAULT_AUTOSAVE_INTERVAL,
        };
        if autosave_interval.is_zero() {
            anyhow::bail!("AUTOSAVE_INTERVAL must be greater than zero");
        }

        Ok(Config {
            discord_token,
            prefix: normalise_prefix(env::var("BOT_PREFIX").ok().as_deref()),
            database_path: env::var("DB_PATH")
                .unwrap_or_else(|_| "data/bot.db".to_string())
                .into(),
            log_dir: env::var("LOG_DIR")
                .unwrap_or_else(|_| "logs".to_string())
                .into(),
            autosave_interval,
            settings_cache_capacity: env::var("SETTINGS_CACHE_CAPACITY")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            status_message: env::var("STATUS_MESSAGE")
                .unwrap_or_else(|_| "Operation Full Stack".to_string()),
            dev_guild_id: env::var("DEV_GUILD_ID").ok().and_then(|id| id.parse().ok()),
        })
    }
}

/// Trims the configured prefix, falling back to `!` when nothing is left.
fn normalise_prefix(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_PREFIX)
        .to_string()
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("prefix", &self.prefix)
            .field("database_path", &self.database_path)
            .field("log_dir", &self.log_dir)
            .field("autosave_interval", &self.autosave_interval)
            .field("settings_cache_capacity", &self.settings_cache_capacity)
            .field("status_message", &self.status_message)
            .field("dev_guild_id", &self.dev_guild_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Env vars are process-global, so everything lives in one test.
    #[test]
    fn test_config_logic() {
        for var in [
            "DISCORD_TOKEN",
            "TOKEN",
            "BOT_PREFIX",
            "DB_PATH",
            "AUTOSAVE_INTERVAL",
            "SETTINGS_CACHE_CAPACITY",
        ] {
            env::remove_var(var);
        }

        // 1. Missing token
        assert!(Config::build().is_err(), "Should fail without a token");

        // 2. Legacy TOKEN and defaults
        env::set_var("TOKEN", "legacy_token");
        let config = Config::build().unwrap();
        assert_eq!(config.discord_token, "legacy_token");
        assert_eq!(config.prefix, "!");
        assert_eq!(config.database_path, PathBuf::from("data/bot.db"));
        assert_eq!(config.autosave_interval, Duration::from_secs(21_600));
        assert_eq!(config.settings_cache_capacity, 1000);

        // 3. Overrides
        env::set_var("DISCORD_TOKEN", "test_token");
        env::set_var("BOT_PREFIX", "  ?  ");
        env::set_var("AUTOSAVE_INTERVAL", "30m");
        env::set_var("DB_PATH", "/tmp/perch.db");
        let config = Config::build().unwrap();
        assert_eq!(config.discord_token, "test_token");
        assert_eq!(config.prefix, "?");
        assert_eq!(config.autosave_interval, Duration::from_secs(1800));
        assert_eq!(config.database_path, PathBuf::from("/tmp/perch.db"));

        // 4. Blank prefix and bad interval
        env::set_var("BOT_PREFIX", "   ");
        assert_eq!(Config::build().unwrap().prefix, "!");
        env::set_var("AUTOSAVE_INTERVAL", "soon");
        assert!(Config::build().is_err());
        env::set_var("AUTOSAVE_INTERVAL", "0s");
        assert!(Config::build().is_err());
        env::remove_var("AUTOSAVE_INTERVAL");

        // 5. Debug redaction
        let debug_output = format!("{:?}", Config::build().unwrap());
        assert!(!debug_output.contains("test_token"));
        assert!(debug_output.contains("[REDACTED]"));

        for var in ["DISCORD_TOKEN", "TOKEN", "BOT_PREFIX", "DB_PATH"] {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_normalise_prefix() {
        assert_eq!(normalise_prefix(None), "!");
        assert_eq!(normalise_prefix(Some("")), "!");
        assert_eq!(normalise_prefix(Some(" $ ")), "$");
    }
}
