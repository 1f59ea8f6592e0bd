/// Tables backing the bot. Every statement is idempotent.
pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS points (
        user_id INTEGER PRIMARY KEY,
        balance INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS guild_settings (
        guild_id INTEGER PRIMARY KEY,
        prefix TEXT,
        welcome_channel_id INTEGER,
        mod_role_id INTEGER,
        admin_role_id INTEGER
    );
";

/// Metadata key holding the last scheduled save.
pub const LAST_SAVE_KEY: &str = "last_save";
