//! Tracing setup: console output plus rolling log files.

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::Config;

/// Installs the global subscriber.
///
/// * console: filtered by `RUST_LOG`, `info` when unset
/// * `bot.log`: everything at INFO and above, rotated daily
/// * `errors.log`: ERROR events only
///
/// The returned guards flush the file writers when dropped, so keep them
/// alive for the lifetime of the process.
pub fn install_tracing(config: &Config) -> anyhow::Result<Vec<WorkerGuard>> {
    std::fs::create_dir_all(&config.log_dir)?;

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::layer().with_target(true).with_filter(console_filter);

    let (bot_writer, bot_guard) =
        tracing_appender::non_blocking(rolling::daily(&config.log_dir, "bot.log"));
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(bot_writer)
        .with_filter(LevelFilter::INFO);

    let (error_writer, error_guard) =
        tracing_appender::non_blocking(rolling::never(&config.log_dir, "errors.log"));
    let error_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(error_writer)
        .with_filter(LevelFilter::ERROR);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(error_layer)
        .try_init()?;

    Ok(vec![bot_guard, error_guard])
}
