//! Scoring run persistence

use super::{parse_json, parse_uuid, parse_uuid_opt};
use crate::models::{RunStatus, ScoringRun, StatusUpdate};
use siteiq_common::time::{from_db, from_db_opt, to_db};
use siteiq_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

const RUN_COLUMNS: &str = r#"
    id, upload_id, tenant_id, status, model_version, scoring_config,
    schema_config_snapshot_id, row_count, scored_count, attempt, last_error,
    idempotency_key, duration_ms, started_at, completed_at, created_at, updated_at
"#;

/// Insert a new run
pub async fn insert_run(pool: &SqlitePool, run: &ScoringRun) -> Result<()> {
    let scoring_config = run
        .scoring_config
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO scoring_runs (
            id, upload_id, tenant_id, status, model_version, scoring_config,
            schema_config_snapshot_id, row_count, scored_count, attempt, last_error,
            idempotency_key, duration_ms, started_at, completed_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(run.id.to_string())
    .bind(run.upload_id.to_string())
    .bind(&run.tenant_id)
    .bind(run.status.as_str())
    .bind(&run.model_version)
    .bind(scoring_config)
    .bind(run.schema_config_snapshot_id.map(|id| id.to_string()))
    .bind(run.row_count)
    .bind(run.scored_count)
    .bind(run.attempt)
    .bind(&run.last_error)
    .bind(&run.idempotency_key)
    .bind(run.duration_ms)
    .bind(run.started_at.as_ref().map(to_db))
    .bind(run.completed_at.as_ref().map(to_db))
    .bind(to_db(&run.created_at))
    .bind(to_db(&run.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a run owned by `tenant_id`
pub async fn get_run(pool: &SqlitePool, tenant_id: &str, run_id: Uuid) -> Result<Option<ScoringRun>> {
    let sql = format!(
        "SELECT {} FROM scoring_runs WHERE id = ? AND tenant_id = ?",
        RUN_COLUMNS
    );

    let row = sqlx::query(&sql)
        .bind(run_id.to_string())
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?;

    row.map(|r| run_from_row(&r)).transpose()
}

/// Write a status change
///
/// Optional fields that are `None` keep their stored value. Entering RUNNING
/// stamps `started_at` once and clears `completed_at`; entering a terminal
/// status stamps `completed_at`. Success clears an earlier attempt's error.
pub async fn update_status(pool: &SqlitePool, run_id: Uuid, update: &StatusUpdate) -> Result<()> {
    let now = to_db(&chrono::Utc::now());
    let status = update.status.as_str();

    let result = sqlx::query(
        r#"
        UPDATE scoring_runs SET
            status = ?1,
            scored_count = COALESCE(?2, scored_count),
            last_error = CASE WHEN ?1 = 'succeeded' THEN NULL ELSE COALESCE(?3, last_error) END,
            duration_ms = COALESCE(?4, duration_ms),
            started_at = CASE WHEN ?1 = 'running' THEN COALESCE(started_at, ?5) ELSE started_at END,
            completed_at = CASE
                WHEN ?1 IN ('succeeded', 'failed') THEN ?5
                WHEN ?1 = 'running' THEN NULL
                ELSE completed_at
            END,
            updated_at = ?5
        WHERE id = ?6
        "#,
    )
    .bind(status)
    .bind(update.scored_count)
    .bind(&update.last_error)
    .bind(update.duration_ms)
    .bind(&now)
    .bind(run_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Scoring run {}", run_id)));
    }

    Ok(())
}

/// Bump the attempt counter, returning the new count
pub async fn increment_attempt(pool: &SqlitePool, run_id: Uuid) -> Result<i64> {
    let attempt: Option<i64> = sqlx::query_scalar(
        "UPDATE scoring_runs SET attempt = attempt + 1, updated_at = ? WHERE id = ? RETURNING attempt",
    )
    .bind(to_db(&chrono::Utc::now()))
    .bind(run_id.to_string())
    .fetch_optional(pool)
    .await?;

    attempt.ok_or_else(|| Error::NotFound(format!("Scoring run {}", run_id)))
}

/// Record which snapshot the run was scored with
pub async fn set_snapshot_id(pool: &SqlitePool, run_id: Uuid, snapshot_id: Uuid) -> Result<()> {
    let result = sqlx::query(
        "UPDATE scoring_runs SET schema_config_snapshot_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(snapshot_id.to_string())
    .bind(to_db(&chrono::Utc::now()))
    .bind(run_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Scoring run {}", run_id)));
    }

    Ok(())
}

fn run_from_row(row: &SqliteRow) -> Result<ScoringRun> {
    let status: String = row.get("status");
    let scoring_config: Option<String> = row.get("scoring_config");

    Ok(ScoringRun {
        id: parse_uuid(&row.get::<String, _>("id"), "id")?,
        upload_id: parse_uuid(&row.get::<String, _>("upload_id"), "upload_id")?,
        tenant_id: row.get("tenant_id"),
        status: status.parse::<RunStatus>()?,
        model_version: row.get("model_version"),
        scoring_config: scoring_config
            .map(|c| parse_json(&c, "scoring_config"))
            .transpose()?,
        schema_config_snapshot_id: parse_uuid_opt(
            row.get("schema_config_snapshot_id"),
            "schema_config_snapshot_id",
        )?,
        row_count: row.get("row_count"),
        scored_count: row.get("scored_count"),
        attempt: row.get("attempt"),
        last_error: row.get("last_error"),
        idempotency_key: row.get("idempotency_key"),
        duration_ms: row.get("duration_ms"),
        started_at: from_db_opt(row.get("started_at"))?,
        completed_at: from_db_opt(row.get("completed_at"))?,
        created_at: from_db(&row.get::<String, _>("created_at"))?,
        updated_at: from_db(&row.get::<String, _>("updated_at"))?,
    })
}
