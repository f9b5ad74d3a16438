//! Tenant identification

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

pub const TENANT_HEADER: &str = "X-Tenant-Id";

/// Calling tenant, taken from the `X-Tenant-Id` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for TenantId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| TenantId(v.to_string()))
            .ok_or_else(|| ApiError::BadRequest(format!("missing {} header", TENANT_HEADER)))
    }
}
