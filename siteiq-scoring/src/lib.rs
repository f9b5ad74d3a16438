//! siteiq-scoring library interface
//!
//! Exposes the scoring core and the HTTP surface for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod scoring;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use pipeline::RunDispatcher;
use sqlx::SqlitePool;
use std::sync::Arc;
use store::SqliteStore;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Store over the same pool, used through the store traits
    pub store: SqliteStore,
    /// Background run execution
    pub dispatcher: Arc<RunDispatcher>,
    /// Model version stamped on runs that do not name one
    pub model_version: String,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        store: SqliteStore,
        dispatcher: Arc<RunDispatcher>,
        model_version: impl Into<String>,
    ) -> Self {
        Self {
            db: store.pool().clone(),
            store,
            dispatcher,
            model_version: model_version.into(),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::upload_routes())
        .merge(api::run_routes())
        .merge(api::recommendation_routes())
        .merge(api::schema_config_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
