//! siteiq-scoring - site scoring service
//!
//! Ingests tabular site records, scores them against a tenant-resolved
//! schema and serves ranked, explained recommendations over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use siteiq_common::config::{load_config, resolve_database_path};
use siteiq_scoring::pipeline::{Pipeline, PipelineConfig, RunDispatcher};
use siteiq_scoring::store::{spawn_claim_sweeper, ClaimStore, SqliteStore};
use siteiq_scoring::{db, schema, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "siteiq-scoring", version, about = "SiteIQ site scoring service")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "SITEIQ_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides server.bind_address
    #[arg(short, long)]
    bind: Option<String>,

    /// SQLite database file, overrides database.path
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// JSON global schema document installed as the active global config
    #[arg(long)]
    global_schema: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting siteiq-scoring");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let db_path = resolve_database_path(args.database.as_deref(), &config);
    info!("Database: {}", db_path.display());

    let pool =
        siteiq_common::db::init_database_with(&db_path, config.database.max_connections).await?;
    info!("Database connection established");

    if let Some(path) = args
        .global_schema
        .as_ref()
        .or(config.scoring.global_schema_path.as_ref())
    {
        install_global_schema(&pool, path).await?;
    }

    let shutdown = CancellationToken::new();

    let store = SqliteStore::new(pool).with_claim_ttl(config.idempotency.ttl());
    let store_arc = Arc::new(store.clone());

    let sweeper = spawn_claim_sweeper(
        store_arc.clone() as Arc<dyn ClaimStore>,
        config.idempotency.cleanup_interval(),
        shutdown.child_token(),
    );

    let pipeline = Arc::new(Pipeline::new(
        store_arc.clone(),
        store_arc.clone(),
        store_arc,
        PipelineConfig::from(&config.scoring),
    ));
    let dispatcher = Arc::new(RunDispatcher::new(
        pipeline,
        config.scoring.worker_count,
        shutdown.child_token(),
    ));
    info!(
        workers = config.scoring.worker_count,
        max_retries = config.scoring.max_retries,
        "Run dispatcher initialized"
    );

    let state = AppState::new(store, dispatcher.clone(), &config.scoring.model_version);
    let app = siteiq_scoring::build_router(state);

    let bind = args.bind.unwrap_or(config.server.bind_address);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining scoring runs");
    dispatcher.shutdown().await;
    shutdown.cancel();
    sweeper.await.ok();

    Ok(())
}

/// Validate and install a global schema document from disk
async fn install_global_schema(pool: &sqlx::SqlitePool, path: &std::path::Path) -> Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read global schema {}", path.display()))?;
    let document: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in global schema {}", path.display()))?;

    schema::resolve_json(&document, None)?;

    let installed =
        db::schema_configs::install(pool, None, &document, Some("installed at startup")).await?;
    info!(
        version = installed.version,
        path = %path.display(),
        "Global schema config installed"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
