//! Run pipeline
//!
//! One attempt drives a run QUEUED → RUNNING → SUCCEEDED | FAILED:
//!
//! 1. mark running
//! 2. resolve the schema (global + tenant)
//! 3. persist an immutable snapshot and link it to the run
//! 4. fetch the input records
//! 5. empty input: succeed with zero results
//! 6. score each record, skipping records that cannot be parsed or scored
//! 7. rank
//! 8. replace the run's result set
//! 9. mark succeeded
//!
//! A failure in a step marks the attempt failed and returns the error; the
//! retry wrapper in [`retry`] decides whether to go again.

pub mod dispatcher;
pub mod ranking;
pub mod retry;

pub use dispatcher::RunDispatcher;
pub use retry::{backoff_delay, RetryOutcome};

use crate::models::{
    RecordSkip, SchemaConfig, SchemaConfigSnapshot, ScoredResult, ScoringRun, SiteRecord,
    StatusUpdate,
};
use crate::schema::{self, ResolvedSchema};
use crate::scoring;
use crate::store::{ConfigStore, RecordStore, RunStore};
use serde_json::{json, Value};
use siteiq_common::config::ScoringConfig;
use siteiq_common::{Error, Result};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

/// Retry and batching parameters, fixed at construction
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub retry_base: Duration,
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&ScoringConfig::default())
    }
}

impl From<&ScoringConfig> for PipelineConfig {
    fn from(config: &ScoringConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_base: config.retry_base(),
            batch_size: config.batch_size,
        }
    }
}

/// What one successful attempt produced
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptReport {
    pub input_count: usize,
    pub scored_count: usize,
    pub skipped: Vec<RecordSkip>,
    pub snapshot_id: Uuid,
    pub duration_ms: i64,
}

/// Stored configurations one attempt resolved from
struct ConfigSources {
    global: SchemaConfig,
    tenant: Option<SchemaConfig>,
}

/// Scoring pipeline over the collaborator stores
pub struct Pipeline {
    runs: Arc<dyn RunStore>,
    records: Arc<dyn RecordStore>,
    configs: Arc<dyn ConfigStore>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        runs: Arc<dyn RunStore>,
        records: Arc<dyn RecordStore>,
        configs: Arc<dyn ConfigStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            runs,
            records,
            configs,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one attempt
    pub async fn execute(&self, run: &ScoringRun) -> Result<AttemptReport> {
        let span = tracing::info_span!(
            "scoring_run",
            run_id = %run.id,
            tenant_id = %run.tenant_id,
            upload_id = %run.upload_id,
        );
        self.execute_attempt(run).instrument(span).await
    }

    async fn execute_attempt(&self, run: &ScoringRun) -> Result<AttemptReport> {
        let started = Instant::now();

        self.step(run, "update_status_running", async {
            self.runs.update_run_status(run.id, &StatusUpdate::running()).await
        })
        .await?;

        let (sources, resolved) = self
            .step(run, "resolve_schema_config", self.resolve_schema(run))
            .await?;

        let snapshot_id = self
            .step(run, "create_snapshot", self.create_snapshot(run, &sources, &resolved))
            .await?;

        let records = self
            .step(run, "fetch_records", async {
                let records = self.records.get_input_records(run.upload_id).await?;
                tracing::info!(count = records.len(), "Input records fetched");
                Ok(records)
            })
            .await?;

        let input_count = records.len();

        let (results, skipped) = if records.is_empty() {
            tracing::info!("Input set is empty, nothing to score");
            (Vec::new(), Vec::new())
        } else {
            let (mut results, skipped) = tracing::info_span!("step", step = "score_records")
                .in_scope(|| score_records(run, &records, &resolved));
            ranking::assign_ranks(&mut results);

            tracing::info!(
                scored_count = results.len(),
                skipped_count = skipped.len(),
                total_count = input_count,
                "Records scored"
            );

            self.step(run, "bulk_insert_results", async {
                self.records
                    .bulk_insert_results(run.id, &results, self.config.batch_size)
                    .await
            })
            .await?;

            (results, skipped)
        };

        let duration_ms = started.elapsed().as_millis() as i64;
        let scored_count = results.len();

        self.step(run, "update_status_succeeded", async {
            self.runs
                .update_run_status(
                    run.id,
                    &StatusUpdate::succeeded(scored_count as i64, duration_ms),
                )
                .await
        })
        .await?;

        tracing::info!(duration_ms, scored_count, "Scoring attempt completed");

        Ok(AttemptReport {
            input_count,
            scored_count,
            skipped,
            snapshot_id,
            duration_ms,
        })
    }

    async fn resolve_schema(&self, run: &ScoringRun) -> Result<(ConfigSources, ResolvedSchema)> {
        let global = self
            .configs
            .get_active_global_config()
            .await?
            .ok_or_else(|| {
                Error::Config("no active global schema configuration found".to_string())
            })?;

        let tenant = self.configs.get_active_tenant_config(&run.tenant_id).await?;

        let resolved = schema::resolve_json(&global.config, tenant.as_ref().map(|t| &t.config))?;

        tracing::info!(
            field_count = resolved.fields().len(),
            tenant_override = tenant.is_some(),
            "Schema resolved"
        );

        Ok((ConfigSources { global, tenant }, resolved))
    }

    async fn create_snapshot(
        &self,
        run: &ScoringRun,
        sources: &ConfigSources,
        resolved: &ResolvedSchema,
    ) -> Result<Uuid> {
        let snapshot = SchemaConfigSnapshot {
            id: Uuid::new_v4(),
            run_id: run.id,
            schema_config_id: sources.global.id,
            tenant_schema_config_id: sources.tenant.as_ref().map(|t| t.id),
            upload_id: run.upload_id,
            config: sources.global.config.clone(),
            snapshot_data: serde_json::to_value(resolved)?,
            created_at: chrono::Utc::now(),
        };

        self.configs.create_snapshot(&snapshot).await?;
        self.runs.set_snapshot_id(run.id, snapshot.id).await?;

        tracing::info!(snapshot_id = %snapshot.id, "Schema snapshot created");

        Ok(snapshot.id)
    }

    /// Run one step inside its span; on failure mark the attempt failed
    async fn step<T, F>(&self, run: &ScoringRun, name: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match fut.instrument(tracing::info_span!("step", step = name)).await {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::error!(step = name, error = %e, "Pipeline step failed");
                self.mark_failed(run, &e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Best effort: a failing status write is logged, never escalated
    async fn mark_failed(&self, run: &ScoringRun, message: &str) {
        if let Err(e) = self
            .runs
            .update_run_status(run.id, &StatusUpdate::failed(message))
            .await
        {
            tracing::error!(
                run_id = %run.id,
                error = %e,
                "Failed to update run status to failed"
            );
        }
    }
}

/// Score every record, collecting results and skips
///
/// A record whose data is not a JSON object, that fails to score, or that
/// repeats an identifier already seen is skipped, never fatal.
fn score_records(
    run: &ScoringRun,
    records: &[SiteRecord],
    schema: &ResolvedSchema,
) -> (Vec<ScoredResult>, Vec<RecordSkip>) {
    let mut results = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();
    let mut seen = HashSet::with_capacity(records.len());

    for record in records {
        let skip = |reason: String| {
            tracing::warn!(site_id = %record.site_id, reason = %reason, "Skipping record");
            RecordSkip {
                site_id: record.site_id.clone(),
                reason,
            }
        };

        if !seen.insert(record.site_id.as_str()) {
            skipped.push(skip("duplicate record identifier".to_string()));
            continue;
        }

        let data = match serde_json::from_str::<Value>(&record.data) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                skipped.push(skip("record data is not a JSON object".to_string()));
                continue;
            }
            Err(e) => {
                skipped.push(skip(format!("failed to parse record data: {}", e)));
                continue;
            }
        };

        let outcome = match scoring::score(&data, schema) {
            Ok(outcome) => outcome,
            Err(e) => {
                skipped.push(skip(format!("failed to score record: {}", e)));
                continue;
            }
        };

        results.push(ScoredResult {
            id: Uuid::new_v4(),
            run_id: run.id,
            tenant_id: run.tenant_id.clone(),
            site_id: record.site_id.clone(),
            site_name: record.site_name.clone(),
            ranking: 0,
            final_score: outcome.final_score,
            raw_score: outcome.raw_score,
            explanation: outcome.explanation,
            metadata: json!({
                "raw_score": outcome.raw_score,
                "model_version": run.model_version,
            }),
            created_at: chrono::Utc::now(),
        });
    }

    (results, skipped)
}
