//! Schema configuration API handlers
//!
//! PUT /api/v1/schema-configs/global, PUT /api/v1/schema-configs/tenant,
//! GET /api/v1/schema-configs/resolved
//!
//! A document is installed only after it resolves, so a run never meets a
//! stored configuration that cannot be merged.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use super::TenantId;
use crate::{
    db,
    error::{ApiError, ApiResult},
    models::SchemaConfig,
    schema::{self, ResolvedSchema},
    store::ConfigStore,
    AppState,
};

/// PUT body for both scopes
#[derive(Debug, Deserialize)]
pub struct InstallConfigRequest {
    pub config: Value,
    #[serde(default)]
    pub description: Option<String>,
}

/// PUT /api/v1/schema-configs/global
pub async fn install_global(
    State(state): State<AppState>,
    Json(request): Json<InstallConfigRequest>,
) -> ApiResult<(StatusCode, Json<SchemaConfig>)> {
    schema::resolve_json(&request.config, None)?;

    let installed = db::schema_configs::install(
        &state.db,
        None,
        &request.config,
        request.description.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(installed)))
}

/// PUT /api/v1/schema-configs/tenant
pub async fn install_tenant(
    State(state): State<AppState>,
    tenant: TenantId,
    Json(request): Json<InstallConfigRequest>,
) -> ApiResult<(StatusCode, Json<SchemaConfig>)> {
    let global = state
        .store
        .get_active_global_config()
        .await?
        .ok_or_else(|| {
            ApiError::Unprocessable("no active global schema configuration found".to_string())
        })?;

    schema::resolve_json(&global.config, Some(&request.config))?;

    let installed = db::schema_configs::install(
        &state.db,
        Some(tenant.as_str()),
        &request.config,
        request.description.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(installed)))
}

/// GET /api/v1/schema-configs/resolved
pub async fn get_resolved(
    State(state): State<AppState>,
    tenant: TenantId,
) -> ApiResult<Json<ResolvedSchema>> {
    let global = state
        .store
        .get_active_global_config()
        .await?
        .ok_or_else(|| ApiError::NotFound("no active global schema configuration found".to_string()))?;
    let override_config = state.store.get_active_tenant_config(tenant.as_str()).await?;

    let resolved =
        schema::resolve_json(&global.config, override_config.as_ref().map(|c| &c.config))?;

    Ok(Json(resolved))
}

/// Build schema configuration routes
pub fn schema_config_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/schema-configs/global", put(install_global))
        .route("/api/v1/schema-configs/tenant", put(install_tenant))
        .route("/api/v1/schema-configs/resolved", get(get_resolved))
}
