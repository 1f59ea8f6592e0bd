pub mod autosave;
pub mod cache;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod format;
pub mod logging;
pub mod services;

use chrono::{DateTime, Utc};

/// Custom data passed to all commands
pub struct Data {
    pub config: config::Config,
    pub db: db::Database,
    pub launch_time: DateTime<Utc>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
