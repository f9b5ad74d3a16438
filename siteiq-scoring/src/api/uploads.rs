//! Upload API handlers
//!
//! POST /api/v1/uploads, GET /api/v1/uploads/:upload_id

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use super::{idempotency_key, parse_id, release_claim, TenantId};
use crate::{
    db,
    error::{ApiError, ApiResult},
    ingest::{self, IngestOutcome, IngestRequest},
    models::Upload,
    store::ClaimStore,
    AppState,
};

/// Claim resource type for uploads
pub const UPLOAD_RESOURCE: &str = "upload";

/// POST /api/v1/uploads response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub upload: Upload,
    /// Identical content was already uploaded by this tenant
    pub duplicate: bool,
}

/// POST /api/v1/uploads
///
/// 201 on a new upload, 200 with `duplicate: true` on repeated content,
/// 409 when the idempotency key was already used.
pub async fn create_upload(
    State(state): State<AppState>,
    tenant: TenantId,
    headers: HeaderMap,
    Json(request): Json<IngestRequest>,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    if request.rows.is_empty() {
        return Err(ApiError::BadRequest("upload contains no rows".to_string()));
    }

    let upload_id = Uuid::new_v4();
    let key = idempotency_key(&headers);

    if let Some(key) = &key {
        let claim = state
            .store
            .claim(tenant.as_str(), key, UPLOAD_RESOURCE, &upload_id.to_string())
            .await?;

        if claim.already_existed {
            tracing::info!(
                tenant_id = %tenant.as_str(),
                idempotency_key = %key,
                existing_id = %claim.resource_id,
                "Duplicate upload idempotency key"
            );
            let existing = match Uuid::parse_str(&claim.resource_id) {
                Ok(id) => db::uploads::get_upload(&state.db, tenant.as_str(), id).await?,
                Err(_) => None,
            };
            return Err(ApiError::Conflict {
                message: "upload with this idempotency key already exists".to_string(),
                existing: existing
                    .map(serde_json::to_value)
                    .transpose()
                    .map_err(siteiq_common::Error::from)?,
            });
        }
    }

    let outcome = ingest::ingest(&state.db, tenant.as_str(), upload_id, &request, key.clone()).await;

    // The key stays bound only when this upload id was actually stored
    if let Some(key) = &key {
        if !matches!(outcome, Ok(IngestOutcome::Stored(_))) {
            release_claim(&state.store, tenant.as_str(), key, UPLOAD_RESOURCE, upload_id).await;
        }
    }

    match outcome? {
        IngestOutcome::Stored(upload) => Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                upload,
                duplicate: false,
            }),
        )),
        IngestOutcome::Duplicate(upload) => Ok((
            StatusCode::OK,
            Json(UploadResponse {
                upload,
                duplicate: true,
            }),
        )),
    }
}

/// GET /api/v1/uploads/:upload_id
pub async fn get_upload(
    State(state): State<AppState>,
    tenant: TenantId,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<Upload>> {
    let upload_id = parse_id(&upload_id, "upload_id")?;

    db::uploads::get_upload(&state.db, tenant.as_str(), upload_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("upload not found".to_string()))
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/uploads", post(create_upload))
        .route("/api/v1/uploads/:upload_id", get(get_upload))
}
