use anyhow::Context;
use std::{fs::OpenOptions, sync::Arc};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggerConfig;

/// Настраивает глобальный subscriber: читаемый вывод в stdout и,
/// если задан путь, JSON-строки в файл. RUST_LOG имеет приоритет над конфигом.
pub fn init(config: &LoggerConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log level directive {:?}", config.level))?;

    let file_layer = if config.path.is_empty() {
        None
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)
            .with_context(|| format!("failed to open log file {}", config.path))?;
        Some(fmt::layer().json().with_ansi(false).with_writer(Arc::new(file)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(())
}
