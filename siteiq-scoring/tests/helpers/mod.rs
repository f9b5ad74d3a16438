//! Test Helper Utilities
//!
//! Shared setup for siteiq-scoring integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use siteiq_common::{Error, Result};
use siteiq_scoring::db;
use siteiq_scoring::ingest::{self, IngestOutcome, IngestRequest};
use siteiq_scoring::models::{
    SchemaConfig, SchemaConfigSnapshot, ScoredResult, ScoringRun, SiteRecord, StatusUpdate, Upload,
};
use siteiq_scoring::pipeline::{Pipeline, PipelineConfig};
use siteiq_scoring::store::{ConfigStore, RecordStore, RunStore, SqliteStore};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use uuid::Uuid;

pub const TENANT: &str = "tenant-a";
pub const OTHER_TENANT: &str = "tenant-b";

/// Create a temporary, fully initialized database
///
/// Returns (TempDir, SqlitePool); the TempDir must outlive the pool
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let pool = siteiq_common::db::init_database(&temp_dir.path().join("test_siteiq.db"))
        .await
        .unwrap();
    (temp_dir, pool)
}

/// Global schema used across tests
pub fn global_schema() -> Value {
    json!({
        "site_id_column": "site_id",
        "fields": {
            "site_id": {"type": "identifier", "required": true},
            "city": {"type": "text"},
            "unemployment_rate": {
                "type": "percentage", "min": 0, "max": 100,
                "weight": 1.0, "direction": "maximize"
            },
            "crime_index": {
                "type": "numeric", "min": 0, "max": 10,
                "weight": 1.0, "direction": "minimize"
            }
        }
    })
}

pub async fn install_global(pool: &SqlitePool) -> SchemaConfig {
    db::schema_configs::install(pool, None, &global_schema(), Some("test global"))
        .await
        .unwrap()
}

pub async fn install_tenant_weights(pool: &SqlitePool, tenant: &str, weights: Value) -> SchemaConfig {
    db::schema_configs::install(pool, Some(tenant), &json!({ "weights": weights }), None)
        .await
        .unwrap()
}

pub fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Ingest rows and return the stored upload
pub async fn seed_upload(pool: &SqlitePool, tenant: &str, rows: Vec<BTreeMap<String, String>>) -> Upload {
    let request = IngestRequest {
        filename: "sites.csv".to_string(),
        headers: Some(vec![
            "site_id".to_string(),
            "city".to_string(),
            "unemployment_rate".to_string(),
            "crime_index".to_string(),
        ]),
        rows,
    };

    match ingest::ingest(pool, tenant, Uuid::new_v4(), &request, None).await.unwrap() {
        IngestOutcome::Stored(upload) => upload,
        IngestOutcome::Duplicate(upload) => panic!("unexpected duplicate upload {}", upload.id),
    }
}

/// Three valid sites with distinct scores
pub fn three_sites() -> Vec<BTreeMap<String, String>> {
    vec![
        row(&[("site_id", "S-1"), ("city", "Austin"), ("unemployment_rate", "25"), ("crime_index", "5")]),
        row(&[("site_id", "S-2"), ("city", "Boise"), ("unemployment_rate", "80"), ("crime_index", "1")]),
        row(&[("site_id", "S-3"), ("city", "Tulsa"), ("unemployment_rate", "10"), ("crime_index", "9")]),
    ]
}

/// Create a queued run over `upload` in the database
pub async fn queued_run(store: &SqliteStore, upload: &Upload) -> ScoringRun {
    let run = ScoringRun::new(&upload.tenant_id, upload.id, "test-model", upload.row_count);
    store.create_run(&run).await.unwrap();
    run
}

/// Millisecond backoff so retry tests finish quickly
pub fn fast_config(max_retries: u32) -> PipelineConfig {
    PipelineConfig {
        max_retries,
        retry_base: Duration::from_millis(1),
        batch_size: 2,
    }
}

pub fn pipeline_over(store: Arc<FlakyStore>, config: PipelineConfig) -> Pipeline {
    Pipeline::new(store.clone(), store.clone(), store, config)
}

/// Store wrapper that fails selected operations a set number of times
///
/// With a gate, record fetches wait for a gate permit, which holds an
/// attempt mid-pipeline until the test releases it.
pub struct FlakyStore {
    pub inner: SqliteStore,
    bulk_insert_failures: AtomicU32,
    fetch_failures: AtomicU32,
    pub bulk_insert_calls: AtomicU32,
    fetch_gate: Option<Arc<Semaphore>>,
    /// Fetches currently inside the store
    pub active_fetches: AtomicU32,
    /// Highest `active_fetches` observed
    pub max_active_fetches: AtomicU32,
}

impl FlakyStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            bulk_insert_failures: AtomicU32::new(0),
            fetch_failures: AtomicU32::new(0),
            bulk_insert_calls: AtomicU32::new(0),
            fetch_gate: None,
            active_fetches: AtomicU32::new(0),
            max_active_fetches: AtomicU32::new(0),
        }
    }

    pub fn gate_fetch(mut self, gate: Arc<Semaphore>) -> Self {
        self.fetch_gate = Some(gate);
        self
    }

    pub fn fail_bulk_insert(self, times: u32) -> Self {
        self.bulk_insert_failures.store(times, Ordering::SeqCst);
        self
    }

    pub fn fail_fetch(self, times: u32) -> Self {
        self.fetch_failures.store(times, Ordering::SeqCst);
        self
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn get_input_records(&self, upload_id: Uuid) -> Result<Vec<SiteRecord>> {
        if Self::take(&self.fetch_failures) {
            return Err(Error::Store("injected fetch failure".to_string()));
        }

        let active = self.active_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_fetches.fetch_max(active, Ordering::SeqCst);
        if let Some(gate) = &self.fetch_gate {
            let _permit = gate.acquire().await.unwrap();
        }
        let records = self.inner.get_input_records(upload_id).await;
        self.active_fetches.fetch_sub(1, Ordering::SeqCst);
        records
    }

    async fn bulk_insert_results(
        &self,
        run_id: Uuid,
        results: &[ScoredResult],
        batch_size: usize,
    ) -> Result<()> {
        self.bulk_insert_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take(&self.bulk_insert_failures) {
            return Err(Error::Store("injected bulk insert failure".to_string()));
        }
        self.inner.bulk_insert_results(run_id, results, batch_size).await
    }
}

#[async_trait]
impl ConfigStore for FlakyStore {
    async fn get_active_global_config(&self) -> Result<Option<SchemaConfig>> {
        self.inner.get_active_global_config().await
    }

    async fn get_active_tenant_config(&self, tenant_id: &str) -> Result<Option<SchemaConfig>> {
        self.inner.get_active_tenant_config(tenant_id).await
    }

    async fn create_snapshot(&self, snapshot: &SchemaConfigSnapshot) -> Result<()> {
        self.inner.create_snapshot(snapshot).await
    }

    async fn get_snapshot(&self, snapshot_id: Uuid) -> Result<Option<SchemaConfigSnapshot>> {
        self.inner.get_snapshot(snapshot_id).await
    }
}

#[async_trait]
impl RunStore for FlakyStore {
    async fn create_run(&self, run: &ScoringRun) -> Result<()> {
        self.inner.create_run(run).await
    }

    async fn get_run(&self, tenant_id: &str, run_id: Uuid) -> Result<Option<ScoringRun>> {
        self.inner.get_run(tenant_id, run_id).await
    }

    async fn update_run_status(&self, run_id: Uuid, update: &StatusUpdate) -> Result<()> {
        self.inner.update_run_status(run_id, update).await
    }

    async fn increment_attempt(&self, run_id: Uuid) -> Result<i64> {
        self.inner.increment_attempt(run_id).await
    }

    async fn set_snapshot_id(&self, run_id: Uuid, snapshot_id: Uuid) -> Result<()> {
        self.inner.set_snapshot_id(run_id, snapshot_id).await
    }
}
