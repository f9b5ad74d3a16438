//! Input record reads

use super::parse_uuid;
use crate::models::SiteRecord;
use siteiq_common::time::from_db;
use siteiq_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// All records of an upload in input order
pub async fn get_input_records(pool: &SqlitePool, upload_id: Uuid) -> Result<Vec<SiteRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, upload_id, tenant_id, site_id, site_name, data, row_index, created_at
        FROM site_records
        WHERE upload_id = ?
        ORDER BY row_index
        "#,
    )
    .bind(upload_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(SiteRecord {
                id: parse_uuid(&row.get::<String, _>("id"), "id")?,
                upload_id: parse_uuid(&row.get::<String, _>("upload_id"), "upload_id")?,
                tenant_id: row.get("tenant_id"),
                site_id: row.get("site_id"),
                site_name: row.get("site_name"),
                data: row.get("data"),
                row_index: row.get("row_index"),
                created_at: from_db(&row.get::<String, _>("created_at"))?,
            })
        })
        .collect()
}
