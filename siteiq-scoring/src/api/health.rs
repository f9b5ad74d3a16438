//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the database does not answer
    pub status: String,
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Runs submitted and not yet finished
    pub runs_in_flight: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let status = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Health check database ping failed");
            "degraded"
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "siteiq-scoring".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        runs_in_flight: state.dispatcher.in_flight(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
