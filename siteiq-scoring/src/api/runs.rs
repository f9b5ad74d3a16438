//! Scoring run API handlers
//!
//! POST /api/v1/uploads/:upload_id/runs, GET /api/v1/runs/:run_id

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::{idempotency_key, parse_id, release_claim, TenantId};
use crate::{
    db,
    error::{ApiError, ApiResult},
    models::{ScoringRun, ValidationStatus},
    store::{ClaimStore, RunStore},
    AppState,
};

/// Claim resource type for runs
pub const RUN_RESOURCE: &str = "scoring_run";

/// POST /api/v1/uploads/:upload_id/runs request (body optional)
#[derive(Debug, Default, Deserialize)]
pub struct CreateRunRequest {
    /// Used when the `Idempotency-Key` header is absent
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub scoring_config: Option<Value>,
}

impl CreateRunRequest {
    /// `scoring_config.model_version`, unless absent or "latest"
    fn model_version(&self) -> Option<&str> {
        self.scoring_config
            .as_ref()
            .and_then(|c| c.get("model_version"))
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty() && *v != "latest")
    }
}

/// POST /api/v1/uploads/:upload_id/runs
///
/// Creates a queued run and returns 202 Accepted; scoring continues in the
/// background.
pub async fn create_run(
    State(state): State<AppState>,
    tenant: TenantId,
    Path(upload_id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<CreateRunRequest>>,
) -> ApiResult<(StatusCode, Json<ScoringRun>)> {
    let upload_id = parse_id(&upload_id, "upload_id")?;
    let request = body.map(|Json(b)| b).unwrap_or_default();

    let upload = db::uploads::get_upload(&state.db, tenant.as_str(), upload_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("upload not found".to_string()))?;

    if upload.validation_status != ValidationStatus::Valid {
        return Err(ApiError::Unprocessable(
            "upload has validation errors; cannot create scoring run".to_string(),
        ));
    }

    let key = idempotency_key(&headers).or_else(|| {
        request
            .idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    });

    let model_version = request
        .model_version()
        .unwrap_or(state.model_version.as_str())
        .to_string();

    let run = ScoringRun::new(tenant.as_str(), upload_id, model_version, upload.row_count)
        .with_idempotency_key(key.clone())
        .with_scoring_config(request.scoring_config.clone());

    if let Some(key) = &key {
        let claim = state
            .store
            .claim(tenant.as_str(), key, RUN_RESOURCE, &run.id.to_string())
            .await?;

        if claim.already_existed {
            tracing::info!(
                tenant_id = %tenant.as_str(),
                idempotency_key = %key,
                existing_id = %claim.resource_id,
                "Duplicate run idempotency key"
            );
            let existing = match Uuid::parse_str(&claim.resource_id) {
                Ok(id) => state.store.get_run(tenant.as_str(), id).await?,
                Err(_) => None,
            };
            return Err(ApiError::Conflict {
                message: "scoring run with this idempotency key already exists".to_string(),
                existing: existing
                    .map(serde_json::to_value)
                    .transpose()
                    .map_err(siteiq_common::Error::from)?,
            });
        }
    }

    if let Err(e) = state.store.create_run(&run).await {
        if let Some(key) = &key {
            release_claim(&state.store, tenant.as_str(), key, RUN_RESOURCE, run.id).await;
        }
        return Err(e.into());
    }

    tracing::info!(
        run_id = %run.id,
        upload_id = %upload_id,
        tenant_id = %tenant.as_str(),
        model_version = %run.model_version,
        "Scoring run created"
    );

    state.dispatcher.submit(run.clone());

    Ok((StatusCode::ACCEPTED, Json(run)))
}

/// GET /api/v1/runs/:run_id
pub async fn get_run(
    State(state): State<AppState>,
    tenant: TenantId,
    Path(run_id): Path<String>,
) -> ApiResult<Json<ScoringRun>> {
    let run_id = parse_id(&run_id, "run_id")?;

    state
        .store
        .get_run(tenant.as_str(), run_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("run not found".to_string()))
}

/// Build run routes
pub fn run_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/uploads/:upload_id/runs", post(create_run))
        .route("/api/v1/runs/:run_id", get(get_run))
}
