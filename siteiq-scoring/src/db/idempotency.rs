//! Idempotency claim persistence
//!
//! A claim is one atomic upsert. SQLite serializes writers, so two callers
//! racing on the same key can never both read back their own claim token.

use crate::models::Claim;
use chrono::{DateTime, Utc};
use siteiq_common::time::to_db;
use siteiq_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Claim `(tenant_id, key, resource_type)` for `candidate_id`
///
/// An expired claim is taken over as if absent. Each call writes its own
/// claim token, so a caller only wins when the returned token is its own,
/// even if it repeats the winner's candidate id.
pub async fn claim(
    pool: &SqlitePool,
    tenant_id: &str,
    key: &str,
    resource_type: &str,
    candidate_id: &str,
    now: DateTime<Utc>,
    ttl: chrono::Duration,
) -> Result<Claim> {
    if key.trim().is_empty() {
        return Err(Error::InvalidInput("idempotency key must not be empty".to_string()));
    }

    let token = Uuid::new_v4().to_string();
    let created_at = to_db(&now);
    let expires_at = to_db(&(now + ttl));

    let row = sqlx::query(
        r#"
        INSERT INTO idempotency_keys
            (tenant_id, key, resource_type, resource_id, claim_token, created_at, expires_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (tenant_id, key, resource_type) DO UPDATE SET
            resource_id = CASE WHEN idempotency_keys.expires_at <= excluded.created_at
                THEN excluded.resource_id ELSE idempotency_keys.resource_id END,
            claim_token = CASE WHEN idempotency_keys.expires_at <= excluded.created_at
                THEN excluded.claim_token ELSE idempotency_keys.claim_token END,
            created_at = CASE WHEN idempotency_keys.expires_at <= excluded.created_at
                THEN excluded.created_at ELSE idempotency_keys.created_at END,
            expires_at = CASE WHEN idempotency_keys.expires_at <= excluded.created_at
                THEN excluded.expires_at ELSE idempotency_keys.expires_at END
        RETURNING resource_id, claim_token
        "#,
    )
    .bind(tenant_id)
    .bind(key)
    .bind(resource_type)
    .bind(candidate_id)
    .bind(&token)
    .bind(&created_at)
    .bind(&expires_at)
    .fetch_one(pool)
    .await?;

    let winner_token: String = row.get("claim_token");

    Ok(Claim {
        already_existed: winner_token != token,
        resource_id: row.get("resource_id"),
    })
}

/// Drop the claim `candidate_id` holds on `(tenant_id, key, resource_type)`
///
/// No-op when the key is bound to a different resource. Returns whether a
/// claim was removed.
pub async fn release(
    pool: &SqlitePool,
    tenant_id: &str,
    key: &str,
    resource_type: &str,
    candidate_id: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM idempotency_keys
        WHERE tenant_id = ? AND key = ? AND resource_type = ? AND resource_id = ?
        "#,
    )
    .bind(tenant_id)
    .bind(key)
    .bind(resource_type)
    .bind(candidate_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete claims that expired before `now`, returning how many were removed
pub async fn clean_expired(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM idempotency_keys WHERE expires_at <= ?")
        .bind(to_db(&now))
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
