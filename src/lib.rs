pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod logger;
pub mod models;
pub mod services;
pub mod storage;

use anyhow::Context;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::database::Database;
use crate::services::calendar::Calendar;
use crate::storage::{EventStore, MemoryEventStore, PgEventStore};

// Shared state для HTTP-слоя
#[derive(Clone)]
pub struct AppState {
    pub calendar: Calendar,
}

impl AppState {
    pub fn new(store: Arc<dyn EventStore>) -> Arc<Self> {
        Arc::new(Self {
            calendar: Calendar::new(store),
        })
    }
}

/// Выбирает хранилище один раз при старте. Для PostgreSQL
/// сразу применяет встроенные миграции.
pub async fn open_store(config: &DatabaseConfig) -> anyhow::Result<Arc<dyn EventStore>> {
    if config.in_memory {
        info!("Using in-memory event store");
        return Ok(Arc::new(MemoryEventStore::new()));
    }

    let db = Database::connect(config)
        .await
        .context("failed to connect to database")?;
    info!("Database connected");

    db.run_migrations()
        .await
        .context("failed to run migrations")?;

    Ok(Arc::new(PgEventStore::new(&db)))
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { concat!("Calendar API v", env!("CARGO_PKG_VERSION")) }))
        .route("/health", get(|| async { "OK" }))
        .merge(controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
