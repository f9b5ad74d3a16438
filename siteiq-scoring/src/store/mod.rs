//! Collaborator interfaces of the run pipeline
//!
//! The pipeline only talks to storage through these traits. Production wires
//! them to [`SqliteStore`]; tests wrap it to inject failures.

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::models::{
    Claim, SchemaConfig, SchemaConfigSnapshot, ScoredResult, ScoringRun, SiteRecord, StatusUpdate,
};
use async_trait::async_trait;
use siteiq_common::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Input records and result sets
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record of an upload, in input order
    async fn get_input_records(&self, upload_id: Uuid) -> Result<Vec<SiteRecord>>;

    /// Replace the run's results in one all-or-nothing write
    async fn bulk_insert_results(
        &self,
        run_id: Uuid,
        results: &[ScoredResult],
        batch_size: usize,
    ) -> Result<()>;
}

/// Schema configurations and snapshots
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_active_global_config(&self) -> Result<Option<SchemaConfig>>;

    async fn get_active_tenant_config(&self, tenant_id: &str) -> Result<Option<SchemaConfig>>;

    async fn create_snapshot(&self, snapshot: &SchemaConfigSnapshot) -> Result<()>;

    async fn get_snapshot(&self, snapshot_id: Uuid) -> Result<Option<SchemaConfigSnapshot>>;
}

/// Scoring run records
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(&self, run: &ScoringRun) -> Result<()>;

    async fn get_run(&self, tenant_id: &str, run_id: Uuid) -> Result<Option<ScoringRun>>;

    async fn update_run_status(&self, run_id: Uuid, update: &StatusUpdate) -> Result<()>;

    /// Returns the new attempt count
    async fn increment_attempt(&self, run_id: Uuid) -> Result<i64>;

    async fn set_snapshot_id(&self, run_id: Uuid, snapshot_id: Uuid) -> Result<()>;
}

/// Atomic idempotency claims
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Insert-if-absent, else read the existing claim
    async fn claim(
        &self,
        tenant_id: &str,
        key: &str,
        resource_type: &str,
        candidate_id: &str,
    ) -> Result<Claim>;

    /// Give up a won claim whose resource was never stored
    async fn release(
        &self,
        tenant_id: &str,
        key: &str,
        resource_type: &str,
        candidate_id: &str,
    ) -> Result<bool>;

    /// Remove expired claims, returning how many were deleted
    async fn clean_expired(&self) -> Result<u64>;
}

/// Periodically delete expired claims until `shutdown` fires
pub fn spawn_claim_sweeper(
    claims: Arc<dyn ClaimStore>,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("Idempotency claim sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match claims.clean_expired().await {
                        Ok(0) => {}
                        Ok(removed) => tracing::info!(removed, "Removed expired idempotency claims"),
                        Err(e) => tracing::warn!(error = %e, "Failed to clean expired idempotency claims"),
                    }
                }
            }
        }
    })
}
