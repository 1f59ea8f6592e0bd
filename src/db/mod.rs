//! SQLite persistence for balances, guild settings and metadata.
//!
//! Every public operation makes sure the schema exists, then runs its work on
//! the blocking pool with a short-lived connection so the gateway tasks never
//! wait on disk I/O.

mod error;
mod schema;

pub use error::{StoreError, StoreResult};
pub use schema::LAST_SAVE_KEY;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::cache::SettingsCache;
use crate::format::parse_timestamp;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolved configuration for one guild. A guild without a row is all `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildSettings {
    pub guild_id: u64,
    pub prefix: Option<String>,
    pub welcome_channel_id: Option<u64>,
    pub mod_role_id: Option<u64>,
    pub admin_role_id: Option<u64>,
}

impl GuildSettings {
    pub fn empty(guild_id: u64) -> Self {
        Self {
            guild_id,
            prefix: None,
            welcome_channel_id: None,
            mod_role_id: None,
            admin_role_id: None,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            guild_id: from_sql_id(row.get(0)?),
            prefix: row.get(1)?,
            welcome_channel_id: row.get::<_, Option<i64>>(2)?.map(from_sql_id),
            mod_role_id: row.get::<_, Option<i64>>(3)?.map(from_sql_id),
            admin_role_id: row.get::<_, Option<i64>>(4)?.map(from_sql_id),
        })
    }
}

/// The columns of `guild_settings` that can be updated on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Prefix,
    WelcomeChannel,
    ModeratorRole,
    AdminRole,
}

impl SettingsField {
    const fn column(self) -> &'static str {
        match self {
            Self::Prefix => "prefix",
            Self::WelcomeChannel => "welcome_channel_id",
            Self::ModeratorRole => "mod_role_id",
            Self::AdminRole => "admin_role_id",
        }
    }
}

// Snowflakes are stored bit-for-bit in SQLite's signed INTEGER.
fn to_sql_id(id: u64) -> i64 {
    id as i64
}

fn from_sql_id(id: i64) -> u64 {
    id as u64
}

fn id_value(id: Option<u64>) -> Value {
    id.map_or(Value::Null, |id| Value::Integer(to_sql_id(id)))
}

fn open_connection(path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

fn initialise(path: &Path) -> StoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let conn = open_connection(path)?;
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.execute_batch(schema::SCHEMA)?;
    debug!("Database: journal mode is {}", mode);
    Ok(())
}

fn apply_delta(conn: &Connection, user_id: u64, delta: i64) -> rusqlite::Result<i64> {
    let current: i64 = conn
        .query_row(
            "SELECT balance FROM points WHERE user_id = ?1",
            [to_sql_id(user_id)],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);
    let updated = current.saturating_add(delta);
    conn.execute(
        "INSERT INTO points (user_id, balance) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET balance = excluded.balance",
        params![to_sql_id(user_id), updated],
    )?;
    Ok(updated)
}

fn read_metadata(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
        row.get(0)
    })
    .optional()
}

fn write_metadata(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, value),
    )?;
    Ok(())
}

#[derive(Clone)]
pub struct Database {
    path: Arc<PathBuf>,
    default_prefix: Arc<str>,
    ready: Arc<OnceCell<()>>,
    settings: SettingsCache,
}

impl Database {
    /// Builds a handle without touching the disk; the schema is created on first use.
    pub fn new(
        path: impl Into<PathBuf>,
        default_prefix: impl Into<String>,
        cache_capacity: usize,
    ) -> Self {
        Self {
            path: Arc::new(path.into()),
            default_prefix: Arc::from(default_prefix.into()),
            ready: Arc::new(OnceCell::new()),
            settings: SettingsCache::new(cache_capacity),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn default_prefix(&self) -> &str {
        &self.default_prefix
    }

    /// Creates the schema once per handle. Concurrent callers wait for the
    /// first one; a failed attempt leaves the handle uninitialised.
    pub async fn ensure_ready(&self) -> StoreResult<()> {
        self.ready
            .get_or_try_init(|| async {
                info!("Database: Initializing schema at {}", self.path.display());
                let path = Arc::clone(&self.path);
                tokio::task::spawn_blocking(move || initialise(&path)).await??;
                debug!("Database: Schema initialized successfully");
                Ok::<(), StoreError>(())
            })
            .await?;
        Ok(())
    }

    /// Runs `f` on the blocking pool against a fresh connection.
    pub async fn run_blocking<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_ready().await?;
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || {
            let mut conn = open_connection(&path)?;
            f(&mut conn)
        })
        .await?
    }

    // --- Guild settings ---

    /// Cache-first read of a guild's settings.
    pub async fn get_guild_settings(&self, guild_id: u64) -> StoreResult<GuildSettings> {
        if let Some(cached) = self.settings.get(guild_id) {
            return Ok(cached);
        }
        self.fetch_guild_settings(guild_id).await
    }

    /// Reads a guild's settings from the store and refreshes the cache.
    pub async fn fetch_guild_settings(&self, guild_id: u64) -> StoreResult<GuildSettings> {
        let seen = self.settings.generation();
        let settings = self
            .run_blocking(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT guild_id, prefix, welcome_channel_id, mod_role_id, admin_role_id
                         FROM guild_settings WHERE guild_id = ?1",
                        [to_sql_id(guild_id)],
                        GuildSettings::from_row,
                    )
                    .optional()?;
                Ok(row.unwrap_or_else(|| GuildSettings::empty(guild_id)))
            })
            .await?;
        // A write that landed while we were reading wins; skip caching the old row.
        if !self.settings.insert_if_current(settings.clone(), seen) {
            debug!("Database: Skipped caching settings for guild {} after a concurrent write", guild_id);
        }
        Ok(settings)
    }

    async fn upsert_guild_field(
        &self,
        guild_id: u64,
        field: SettingsField,
        value: Value,
    ) -> StoreResult<GuildSettings> {
        let column = field.column();
        debug!("Database: Setting {} for guild {}", column, guild_id);
        self.run_blocking(move |conn| {
            let sql = format!(
                "INSERT INTO guild_settings (guild_id, {column}) VALUES (?1, ?2)
                 ON CONFLICT(guild_id) DO UPDATE SET {column} = excluded.{column}"
            );
            conn.execute(&sql, params![to_sql_id(guild_id), value])?;
            Ok(())
        })
        .await?;
        self.settings.evict(guild_id);
        self.fetch_guild_settings(guild_id).await
    }

    /// Stores a prefix override. Surrounding whitespace is trimmed and an
    /// empty prefix clears the override.
    pub async fn set_guild_prefix(
        &self,
        guild_id: u64,
        prefix: Option<&str>,
    ) -> StoreResult<GuildSettings> {
        let normalised = prefix
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map_or(Value::Null, |p| Value::Text(p.to_string()));
        self.upsert_guild_field(guild_id, SettingsField::Prefix, normalised)
            .await
    }

    pub async fn reset_guild_prefix(&self, guild_id: u64) -> StoreResult<GuildSettings> {
        self.set_guild_prefix(guild_id, None).await
    }

    pub async fn set_welcome_channel(
        &self,
        guild_id: u64,
        channel_id: Option<u64>,
    ) -> StoreResult<GuildSettings> {
        self.upsert_guild_field(guild_id, SettingsField::WelcomeChannel, id_value(channel_id))
            .await
    }

    pub async fn set_moderator_role(
        &self,
        guild_id: u64,
        role_id: Option<u64>,
    ) -> StoreResult<GuildSettings> {
        self.upsert_guild_field(guild_id, SettingsField::ModeratorRole, id_value(role_id))
            .await
    }

    pub async fn set_admin_role(
        &self,
        guild_id: u64,
        role_id: Option<u64>,
    ) -> StoreResult<GuildSettings> {
        self.upsert_guild_field(guild_id, SettingsField::AdminRole, id_value(role_id))
            .await
    }

    /// Resolves the command prefix. Without a guild (DMs) the default is used
    /// and the store is not consulted.
    pub async fn get_prefix(&self, guild_id: Option<u64>) -> StoreResult<String> {
        let Some(guild_id) = guild_id else {
            return Ok(self.default_prefix.to_string());
        };
        let settings = self.get_guild_settings(guild_id).await?;
        Ok(settings
            .prefix
            .unwrap_or_else(|| self.default_prefix.to_string()))
    }

    pub async fn get_welcome_channel_id(&self, guild_id: u64) -> StoreResult<Option<u64>> {
        Ok(self.get_guild_settings(guild_id).await?.welcome_channel_id)
    }

    pub async fn get_moderator_role_id(&self, guild_id: u64) -> StoreResult<Option<u64>> {
        Ok(self.get_guild_settings(guild_id).await?.mod_role_id)
    }

    pub async fn get_admin_role_id(&self, guild_id: u64) -> StoreResult<Option<u64>> {
        Ok(self.get_guild_settings(guild_id).await?.admin_role_id)
    }

    /// Forgets every setting for a guild.
    pub async fn clear_guild_settings(&self, guild_id: u64) -> StoreResult<()> {
        self.run_blocking(move |conn| {
            conn.execute(
                "DELETE FROM guild_settings WHERE guild_id = ?1",
                [to_sql_id(guild_id)],
            )?;
            Ok(())
        })
        .await?;
        self.settings.evict(guild_id);
        Ok(())
    }

    // --- Points ledger ---

    pub async fn get_balance(&self, user_id: u64) -> StoreResult<i64> {
        self.run_blocking(move |conn| {
            let balance = conn
                .query_row(
                    "SELECT balance FROM points WHERE user_id = ?1",
                    [to_sql_id(user_id)],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(balance.unwrap_or(0))
        })
        .await
    }

    /// Adjusts a balance by `delta` and returns the new total.
    ///
    /// The read and the write share one immediate transaction, so concurrent
    /// credits to the same user are serialized by SQLite's write lock.
    pub async fn add_balance(&self, user_id: u64, delta: i64) -> StoreResult<i64> {
        self.run_blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let updated = apply_delta(&tx, user_id, delta)?;
            tx.commit()?;
            debug!("Database: Balance for user {} is now {}", user_id, updated);
            Ok(updated)
        })
        .await
    }

    /// Credits `delta` and records `stamp` under `key`, but only if `decide`
    /// accepts the value currently stored under `key`.
    ///
    /// The read, the decision and both writes happen in one immediate
    /// transaction, so two callers racing on the same key cannot both be
    /// credited and a failed write leaves neither change behind. Returns the
    /// new balance, or whatever `decide` refused with.
    pub async fn credit_with_stamp<F, R>(
        &self,
        user_id: u64,
        delta: i64,
        key: &str,
        stamp: &str,
        decide: F,
    ) -> StoreResult<Result<i64, R>>
    where
        F: FnOnce(Option<&str>) -> Result<(), R> + Send + 'static,
        R: Send + 'static,
    {
        let key = key.to_string();
        let stamp = stamp.to_string();
        self.run_blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current = read_metadata(&tx, &key)?;
            if let Err(refusal) = decide(current.as_deref()) {
                return Ok(Err(refusal));
            }
            let updated = apply_delta(&tx, user_id, delta)?;
            write_metadata(&tx, &key, &stamp)?;
            tx.commit()?;
            debug!("Database: Credited user {} under {}, balance now {}", user_id, key, updated);
            Ok(Ok(updated))
        })
        .await
    }

    /// Highest balances first; equal balances rank the lower user id first.
    pub async fn leaderboard(&self, limit: usize) -> StoreResult<Vec<(u64, i64)>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, balance FROM points
                 ORDER BY balance DESC, user_id ASC LIMIT ?1",
            )?;
            let rows = stmt.query_map([limit], |row| {
                Ok((from_sql_id(row.get(0)?), row.get(1)?))
            })?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row?);
            }
            Ok(results)
        })
        .await
    }

    // --- Metadata ---

    pub async fn get_metadata_value(&self, key: &str) -> StoreResult<Option<String>> {
        let key = key.to_string();
        self.run_blocking(move |conn| Ok(read_metadata(conn, &key)?))
            .await
    }

    pub async fn set_metadata_value(&self, key: &str, value: &str) -> StoreResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.run_blocking(move |conn| {
            write_metadata(conn, &key, &value)?;
            Ok(())
        })
        .await
    }

    /// Records the time of the last scheduled save, to the second.
    pub async fn record_last_save(&self, when: DateTime<Utc>) -> StoreResult<()> {
        let value = when.to_rfc3339_opts(SecondsFormat::Secs, false);
        self.set_metadata_value(LAST_SAVE_KEY, &value).await
    }

    /// Returns `None` if no save has been recorded. A stored value that is not
    /// ISO-8601 is reported as [`StoreError::InvalidTimestamp`].
    pub async fn get_last_save(&self) -> StoreResult<Option<DateTime<Utc>>> {
        match self.get_metadata_value(LAST_SAVE_KEY).await? {
            None => Ok(None),
            Some(raw) => match parse_timestamp(&raw) {
                Some(ts) => Ok(Some(ts)),
                None => Err(StoreError::InvalidTimestamp(raw)),
            },
        }
    }
}
