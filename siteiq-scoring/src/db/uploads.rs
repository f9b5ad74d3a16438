//! Upload persistence

use super::{parse_json, parse_uuid};
use crate::models::{SiteRecord, Upload, ValidationStatus};
use siteiq_common::time::{from_db, to_db};
use siteiq_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

const UPLOAD_COLUMNS: &str = r#"
    id, tenant_id, filename, status, validation_status, row_count,
    warnings, errors, idempotency_key, content_hash, created_at, updated_at
"#;

/// Insert an upload and its records in one transaction
pub async fn insert_upload(pool: &SqlitePool, upload: &Upload, records: &[SiteRecord]) -> Result<()> {
    let warnings = serde_json::to_string(&upload.warnings)?;
    let errors = serde_json::to_string(&upload.errors)?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO uploads (
            id, tenant_id, filename, status, validation_status, row_count,
            warnings, errors, idempotency_key, content_hash, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(upload.id.to_string())
    .bind(&upload.tenant_id)
    .bind(&upload.filename)
    .bind(&upload.status)
    .bind(upload.validation_status.as_str())
    .bind(upload.row_count)
    .bind(warnings)
    .bind(errors)
    .bind(&upload.idempotency_key)
    .bind(&upload.content_hash)
    .bind(to_db(&upload.created_at))
    .bind(to_db(&upload.updated_at))
    .execute(&mut *tx)
    .await?;

    for record in records {
        sqlx::query(
            r#"
            INSERT INTO site_records (
                id, upload_id, tenant_id, site_id, site_name, data, row_index, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.upload_id.to_string())
        .bind(&record.tenant_id)
        .bind(&record.site_id)
        .bind(&record.site_name)
        .bind(&record.data)
        .bind(record.row_index)
        .bind(to_db(&record.created_at))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(())
}

/// Load an upload owned by `tenant_id`
pub async fn get_upload(pool: &SqlitePool, tenant_id: &str, upload_id: Uuid) -> Result<Option<Upload>> {
    let sql = format!(
        "SELECT {} FROM uploads WHERE id = ? AND tenant_id = ?",
        UPLOAD_COLUMNS
    );

    let row = sqlx::query(&sql)
        .bind(upload_id.to_string())
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?;

    row.map(|r| upload_from_row(&r)).transpose()
}

/// Earlier upload by the same tenant with identical content
pub async fn find_by_content_hash(
    pool: &SqlitePool,
    tenant_id: &str,
    content_hash: &str,
) -> Result<Option<Upload>> {
    let sql = format!(
        "SELECT {} FROM uploads WHERE tenant_id = ? AND content_hash = ? ORDER BY created_at LIMIT 1",
        UPLOAD_COLUMNS
    );

    let row = sqlx::query(&sql)
        .bind(tenant_id)
        .bind(content_hash)
        .fetch_optional(pool)
        .await?;

    row.map(|r| upload_from_row(&r)).transpose()
}

fn upload_from_row(row: &SqliteRow) -> Result<Upload> {
    let validation_status: String = row.get("validation_status");

    Ok(Upload {
        id: parse_uuid(&row.get::<String, _>("id"), "id")?,
        tenant_id: row.get("tenant_id"),
        filename: row.get("filename"),
        status: row.get("status"),
        validation_status: ValidationStatus::parse(&validation_status),
        row_count: row.get("row_count"),
        warnings: parse_json(&row.get::<String, _>("warnings"), "warnings")?,
        errors: parse_json(&row.get::<String, _>("errors"), "errors")?,
        idempotency_key: row.get("idempotency_key"),
        content_hash: row.get("content_hash"),
        created_at: from_db(&row.get::<String, _>("created_at"))?,
        updated_at: from_db(&row.get::<String, _>("updated_at"))?,
    })
}
