//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates every table the
//! scoring service uses. Table creation is idempotent, so this runs on every
//! startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Connection pool size used when the caller does not configure one
pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    init_database_with(db_path, DEFAULT_MAX_CONNECTIONS).await
}

/// Same as [`init_database`] with an explicit pool size
pub async fn init_database_with(db_path: &Path, max_connections: u32) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL lets status polling read while a run writes its results
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema_configs_table(&pool).await?;
    create_uploads_table(&pool).await?;
    create_site_records_table(&pool).await?;
    create_scoring_runs_table(&pool).await?;
    create_schema_config_snapshots_table(&pool).await?;
    create_recommendations_table(&pool).await?;
    create_idempotency_keys_table(&pool).await?;

    info!("Database schema ready");

    Ok(pool)
}

async fn create_schema_configs_table(pool: &SqlitePool) -> Result<()> {
    // tenant_id NULL marks the global config
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_configs (
            id TEXT PRIMARY KEY,
            tenant_id TEXT,
            version INTEGER NOT NULL DEFAULT 1,
            config TEXT NOT NULL,
            description TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_schema_configs_active ON schema_configs(tenant_id, is_active)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_uploads_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS uploads (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            status TEXT NOT NULL,
            validation_status TEXT NOT NULL,
            row_count INTEGER NOT NULL DEFAULT 0,
            warnings TEXT NOT NULL DEFAULT '[]',
            errors TEXT NOT NULL DEFAULT '[]',
            idempotency_key TEXT,
            content_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_uploads_content_hash ON uploads(tenant_id, content_hash)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_site_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS site_records (
            id TEXT PRIMARY KEY,
            upload_id TEXT NOT NULL REFERENCES uploads(id) ON DELETE CASCADE,
            tenant_id TEXT NOT NULL,
            site_id TEXT NOT NULL,
            site_name TEXT,
            data TEXT NOT NULL,
            row_index INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_site_records_upload ON site_records(upload_id, row_index)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_scoring_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scoring_runs (
            id TEXT PRIMARY KEY,
            upload_id TEXT NOT NULL REFERENCES uploads(id),
            tenant_id TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('queued', 'running', 'succeeded', 'failed')),
            model_version TEXT NOT NULL,
            scoring_config TEXT,
            schema_config_snapshot_id TEXT,
            row_count INTEGER NOT NULL DEFAULT 0,
            scored_count INTEGER NOT NULL DEFAULT 0,
            attempt INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            idempotency_key TEXT,
            duration_ms INTEGER,
            started_at TEXT,
            completed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_scoring_runs_tenant ON scoring_runs(tenant_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_schema_config_snapshots_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_config_snapshots (
            id TEXT PRIMARY KEY,
            run_id TEXT NOT NULL REFERENCES scoring_runs(id) ON DELETE CASCADE,
            schema_config_id TEXT NOT NULL,
            tenant_schema_config_id TEXT,
            upload_id TEXT NOT NULL,
            config TEXT NOT NULL,
            snapshot_data TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_recommendations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recommendations (
            id TEXT PRIMARY KEY,
            run_id TEXT NOT NULL REFERENCES scoring_runs(id) ON DELETE CASCADE,
            tenant_id TEXT NOT NULL,
            site_id TEXT NOT NULL,
            site_name TEXT,
            ranking INTEGER NOT NULL,
            final_score REAL NOT NULL,
            raw_score REAL NOT NULL,
            component_scores TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            UNIQUE(run_id, site_id),
            UNIQUE(run_id, ranking)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_idempotency_keys_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS idempotency_keys (
            tenant_id TEXT NOT NULL,
            key TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            claim_token TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            PRIMARY KEY (tenant_id, key, resource_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_idempotency_keys_expires ON idempotency_keys(expires_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
