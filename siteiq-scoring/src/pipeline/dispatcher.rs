//! Bounded run dispatch
//!
//! Submitting a run returns at once with its id. The attempt loop runs on a
//! tracked task that first waits for one of `worker_count` permits.

use super::{Pipeline, RetryOutcome};
use crate::models::ScoringRun;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;
use uuid::Uuid;

pub struct RunDispatcher {
    pipeline: Arc<Pipeline>,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl RunDispatcher {
    pub fn new(pipeline: Arc<Pipeline>, worker_count: usize, shutdown: CancellationToken) -> Self {
        Self {
            pipeline,
            permits: Arc::new(Semaphore::new(worker_count.max(1))),
            shutdown,
            tracker: TaskTracker::new(),
        }
    }

    /// Start the retry loop for `run` in the background
    pub fn submit(&self, run: ScoringRun) -> Uuid {
        let run_id = run.id;
        let pipeline = Arc::clone(&self.pipeline);
        let permits = Arc::clone(&self.permits);
        let cancel = self.shutdown.child_token();

        let span = tracing::info_span!("dispatch", run_id = %run_id);

        self.tracker.spawn(
            async move {
                let _permit = tokio::select! {
                    permit = permits.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => {
                            tracing::warn!("Worker pool closed, run not started");
                            return;
                        }
                    },
                    _ = cancel.cancelled() => {
                        tracing::info!("Shutdown before run started");
                        return;
                    }
                };

                match pipeline.execute_with_retry(&run, &cancel).await {
                    Ok(RetryOutcome::Succeeded { report, attempts }) => tracing::info!(
                        attempts,
                        scored_count = report.scored_count,
                        skipped_count = report.skipped.len(),
                        "Run finished"
                    ),
                    Ok(RetryOutcome::Cancelled { attempts }) => {
                        tracing::info!(attempts, "Run retries cancelled")
                    }
                    Err(e) => tracing::error!(error = %e, "Run failed"),
                }
            }
            .instrument(span),
        );

        tracing::debug!(run_id = %run_id, "Run submitted");
        run_id
    }

    /// Number of runs submitted and not yet finished
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every submitted run to finish; new submissions stay possible
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Cancel pending backoffs and wait for running attempts to finish
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("Run dispatcher stopped");
    }
}
