//! HTTP API handlers for siteiq-scoring
//!
//! Every `/api/v1` route is tenant-scoped through the `X-Tenant-Id` header.

pub mod health;
pub mod recommendations;
pub mod runs;
pub mod schema_configs;
pub mod tenant;
pub mod uploads;

pub use health::health_routes;
pub use recommendations::recommendation_routes;
pub use runs::run_routes;
pub use schema_configs::schema_config_routes;
pub use tenant::{TenantId, TENANT_HEADER};
pub use uploads::upload_routes;

use crate::error::{ApiError, ApiResult};
use crate::store::ClaimStore;
use axum::http::HeaderMap;
use uuid::Uuid;

/// Request header carrying the client's idempotency key
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Non-empty `Idempotency-Key` header value, if any
pub(crate) fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse a UUID path parameter, 400 when malformed
pub(crate) fn parse_id(value: &str, name: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| ApiError::BadRequest(format!("invalid {} format", name)))
}

/// Release a won claim after the write it guarded failed or was skipped
///
/// A failed release is only logged; the claim then lapses at its TTL.
pub(crate) async fn release_claim(
    claims: &dyn ClaimStore,
    tenant_id: &str,
    key: &str,
    resource_type: &str,
    candidate_id: Uuid,
) {
    match claims
        .release(tenant_id, key, resource_type, &candidate_id.to_string())
        .await
    {
        Ok(_) => tracing::debug!(
            tenant_id = %tenant_id,
            idempotency_key = %key,
            resource_type = %resource_type,
            "Released idempotency claim"
        ),
        Err(e) => tracing::warn!(
            tenant_id = %tenant_id,
            idempotency_key = %key,
            resource_type = %resource_type,
            error = %e,
            "Failed to release idempotency claim"
        ),
    }
}
