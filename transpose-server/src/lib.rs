//! transpose-server library interface
//!
//! Exposes the application state, router construction and the engine
//! layers for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod providers;
pub mod transposer;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use transpose_common::config::Config;

use crate::db::TransposeStore;
use crate::providers::ProviderRegistry;
use crate::transposer::Transposer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Configured provider adapters in fixed priority order
    pub registry: Arc<ProviderRegistry>,
    /// The transposition engine
    pub transposer: Arc<Transposer>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, registry: Arc<ProviderRegistry>, config: &Config) -> Self {
        let transposer = Arc::new(Transposer::new(
            registry.clone(),
            TransposeStore::new(db.clone()),
            config.link_base_url.clone(),
            config.min_matches,
            config.playlist_concurrency,
        ));

        Self {
            db,
            registry,
            transposer,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::transpose_routes())
        .merge(api::convert_routes())
        .merge(api::refresh_routes())
        .merge(api::health_routes())
        .with_state(state)
}
