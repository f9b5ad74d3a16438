//! Schema configuration and snapshot persistence
//!
//! `tenant_id IS NULL` marks the global configuration. At most one row per
//! tenant (or the global slot) is active; installing a new version
//! deactivates the previous one.

use super::{parse_json, parse_uuid, parse_uuid_opt};
use crate::models::{SchemaConfig, SchemaConfigSnapshot};
use serde_json::Value;
use siteiq_common::time::{from_db, to_db};
use siteiq_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Active config for a tenant, or the global config when `tenant_id` is None
pub async fn get_active(pool: &SqlitePool, tenant_id: Option<&str>) -> Result<Option<SchemaConfig>> {
    let row = sqlx::query(
        r#"
        SELECT id, tenant_id, version, config, description, is_active, created_at, updated_at
        FROM schema_configs
        WHERE tenant_id IS ? AND is_active = 1
        ORDER BY version DESC
        LIMIT 1
        "#,
    )
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| config_from_row(&r)).transpose()
}

/// Install a new active version, deactivating the current one
pub async fn install(
    pool: &SqlitePool,
    tenant_id: Option<&str>,
    config: &Value,
    description: Option<&str>,
) -> Result<SchemaConfig> {
    let config_json = serde_json::to_string(config)?;
    let mut tx = pool.begin().await?;

    let current_version: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(version), 0) FROM schema_configs WHERE tenant_id IS ?",
    )
    .bind(tenant_id)
    .fetch_one(&mut *tx)
    .await?;

    let now = chrono::Utc::now();
    let installed = SchemaConfig {
        id: Uuid::new_v4(),
        tenant_id: tenant_id.map(str::to_string),
        version: current_version + 1,
        config: config.clone(),
        description: description.map(str::to_string),
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    sqlx::query("UPDATE schema_configs SET is_active = 0, updated_at = ? WHERE tenant_id IS ? AND is_active = 1")
        .bind(to_db(&now))
        .bind(tenant_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO schema_configs (id, tenant_id, version, config, description, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(installed.id.to_string())
    .bind(tenant_id)
    .bind(installed.version)
    .bind(config_json)
    .bind(description)
    .bind(to_db(&now))
    .bind(to_db(&now))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        config_id = %installed.id,
        tenant_id = tenant_id.unwrap_or("<global>"),
        version = installed.version,
        "Installed schema config"
    );

    Ok(installed)
}

/// Store a snapshot; snapshots are never updated afterwards
pub async fn insert_snapshot(pool: &SqlitePool, snapshot: &SchemaConfigSnapshot) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO schema_config_snapshots (
            id, run_id, schema_config_id, tenant_schema_config_id, upload_id,
            config, snapshot_data, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(snapshot.id.to_string())
    .bind(snapshot.run_id.to_string())
    .bind(snapshot.schema_config_id.to_string())
    .bind(snapshot.tenant_schema_config_id.map(|id| id.to_string()))
    .bind(snapshot.upload_id.to_string())
    .bind(serde_json::to_string(&snapshot.config)?)
    .bind(serde_json::to_string(&snapshot.snapshot_data)?)
    .bind(to_db(&snapshot.created_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_snapshot(pool: &SqlitePool, snapshot_id: Uuid) -> Result<Option<SchemaConfigSnapshot>> {
    let row = sqlx::query(
        r#"
        SELECT id, run_id, schema_config_id, tenant_schema_config_id, upload_id,
               config, snapshot_data, created_at
        FROM schema_config_snapshots
        WHERE id = ?
        "#,
    )
    .bind(snapshot_id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(SchemaConfigSnapshot {
            id: parse_uuid(&row.get::<String, _>("id"), "id")?,
            run_id: parse_uuid(&row.get::<String, _>("run_id"), "run_id")?,
            schema_config_id: parse_uuid(&row.get::<String, _>("schema_config_id"), "schema_config_id")?,
            tenant_schema_config_id: parse_uuid_opt(
                row.get("tenant_schema_config_id"),
                "tenant_schema_config_id",
            )?,
            upload_id: parse_uuid(&row.get::<String, _>("upload_id"), "upload_id")?,
            config: parse_json(&row.get::<String, _>("config"), "config")?,
            snapshot_data: parse_json(&row.get::<String, _>("snapshot_data"), "snapshot_data")?,
            created_at: from_db(&row.get::<String, _>("created_at"))?,
        })),
        None => Ok(None),
    }
}

fn config_from_row(row: &SqliteRow) -> Result<SchemaConfig> {
    Ok(SchemaConfig {
        id: parse_uuid(&row.get::<String, _>("id"), "id")?,
        tenant_id: row.get("tenant_id"),
        version: row.get("version"),
        config: parse_json(&row.get::<String, _>("config"), "config")?,
        description: row.get("description"),
        is_active: row.get::<i64, _>("is_active") != 0,
        created_at: from_db(&row.get::<String, _>("created_at"))?,
        updated_at: from_db(&row.get::<String, _>("updated_at"))?,
    })
}
