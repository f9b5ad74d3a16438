//! SQLite-backed implementation of every store trait

use super::{ClaimStore, ConfigStore, RecordStore, RunStore};
use crate::db::{self, lock_retry::DEFAULT_MAX_LOCK_WAIT_MS, retry_on_lock};
use crate::models::{
    Claim, SchemaConfig, SchemaConfigSnapshot, ScoredResult, ScoringRun, SiteRecord, StatusUpdate,
};
use async_trait::async_trait;
use siteiq_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Store over one shared SQLite pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    claim_ttl: chrono::Duration,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            claim_ttl: chrono::Duration::hours(24),
        }
    }

    pub fn with_claim_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.claim_ttl = ttl;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn get_input_records(&self, upload_id: Uuid) -> Result<Vec<SiteRecord>> {
        db::site_records::get_input_records(&self.pool, upload_id).await
    }

    async fn bulk_insert_results(
        &self,
        run_id: Uuid,
        results: &[ScoredResult],
        batch_size: usize,
    ) -> Result<()> {
        retry_on_lock("bulk_insert_results", DEFAULT_MAX_LOCK_WAIT_MS, || {
            db::recommendations::replace_for_run(&self.pool, run_id, results, batch_size)
        })
        .await
    }
}

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn get_active_global_config(&self) -> Result<Option<SchemaConfig>> {
        db::schema_configs::get_active(&self.pool, None).await
    }

    async fn get_active_tenant_config(&self, tenant_id: &str) -> Result<Option<SchemaConfig>> {
        db::schema_configs::get_active(&self.pool, Some(tenant_id)).await
    }

    async fn create_snapshot(&self, snapshot: &SchemaConfigSnapshot) -> Result<()> {
        db::schema_configs::insert_snapshot(&self.pool, snapshot).await
    }

    async fn get_snapshot(&self, snapshot_id: Uuid) -> Result<Option<SchemaConfigSnapshot>> {
        db::schema_configs::get_snapshot(&self.pool, snapshot_id).await
    }
}

#[async_trait]
impl RunStore for SqliteStore {
    async fn create_run(&self, run: &ScoringRun) -> Result<()> {
        db::runs::insert_run(&self.pool, run).await
    }

    async fn get_run(&self, tenant_id: &str, run_id: Uuid) -> Result<Option<ScoringRun>> {
        db::runs::get_run(&self.pool, tenant_id, run_id).await
    }

    async fn update_run_status(&self, run_id: Uuid, update: &StatusUpdate) -> Result<()> {
        retry_on_lock("update_run_status", DEFAULT_MAX_LOCK_WAIT_MS, || {
            db::runs::update_status(&self.pool, run_id, update)
        })
        .await
    }

    async fn increment_attempt(&self, run_id: Uuid) -> Result<i64> {
        db::runs::increment_attempt(&self.pool, run_id).await
    }

    async fn set_snapshot_id(&self, run_id: Uuid, snapshot_id: Uuid) -> Result<()> {
        db::runs::set_snapshot_id(&self.pool, run_id, snapshot_id).await
    }
}

#[async_trait]
impl ClaimStore for SqliteStore {
    async fn claim(
        &self,
        tenant_id: &str,
        key: &str,
        resource_type: &str,
        candidate_id: &str,
    ) -> Result<Claim> {
        let now = chrono::Utc::now();
        retry_on_lock("claim_idempotency_key", DEFAULT_MAX_LOCK_WAIT_MS, || {
            db::idempotency::claim(
                &self.pool,
                tenant_id,
                key,
                resource_type,
                candidate_id,
                now,
                self.claim_ttl,
            )
        })
        .await
    }

    async fn release(
        &self,
        tenant_id: &str,
        key: &str,
        resource_type: &str,
        candidate_id: &str,
    ) -> Result<bool> {
        retry_on_lock("release_idempotency_key", DEFAULT_MAX_LOCK_WAIT_MS, || {
            db::idempotency::release(&self.pool, tenant_id, key, resource_type, candidate_id)
        })
        .await
    }

    async fn clean_expired(&self) -> Result<u64> {
        db::idempotency::clean_expired(&self.pool, chrono::Utc::now()).await
    }
}
