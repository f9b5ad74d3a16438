//! Bounded retry with exponential backoff and jitter
//!
//! `delay = min(base * 2^attempt + uniform(0, base * 2^attempt / 10), 5 min)`
//!
//! The backoff sleep is the only point where cancellation is observed.
//! Cancelling stops further attempts and leaves the run in whatever status
//! the last attempt wrote.

use super::{AttemptReport, Pipeline};
use crate::models::{ScoringRun, StatusUpdate};
use rand::Rng;
use siteiq_common::{Error, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Backoff ceiling
pub const MAX_BACKOFF: Duration = Duration::from_secs(5 * 60);

/// How a retried run ended without error
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    Succeeded {
        report: AttemptReport,
        attempts: u32,
    },
    /// Stopped by the cancellation token before a further attempt
    Cancelled { attempts: u32 },
}

/// Delay before the retry that follows zero-based `attempt`
pub fn backoff_delay<R: Rng + ?Sized>(base: Duration, attempt: u32, rng: &mut R) -> Duration {
    let max_ms = MAX_BACKOFF.as_millis() as u64;
    let base_ms = base.as_millis().min(u128::from(max_ms)) as u64;

    let exponential_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    let jitter_ms = rng.gen_range(0..=exponential_ms / 10);

    Duration::from_millis(exponential_ms.saturating_add(jitter_ms).min(max_ms))
}

impl Pipeline {
    /// Run attempts until success, exhaustion, a non-retryable error or cancellation
    ///
    /// On exhaustion (or a non-retryable error) the run is marked failed with a
    /// composite message, which is also returned as the error.
    pub async fn execute_with_retry(
        &self,
        run: &ScoringRun,
        cancel: &CancellationToken,
    ) -> Result<RetryOutcome> {
        let max_retries = self.config.max_retries;
        let mut attempts = 0u32;
        let mut last_error: Option<Error> = None;

        for attempt in 0..=max_retries {
            if cancel.is_cancelled() {
                tracing::info!(run_id = %run.id, attempts, "Run cancelled before next attempt");
                return Ok(RetryOutcome::Cancelled { attempts });
            }

            attempts = attempt + 1;
            tracing::info!(
                run_id = %run.id,
                attempt = attempts,
                max_retries,
                "Executing scoring pipeline"
            );

            if let Err(e) = self.runs.increment_attempt(run.id).await {
                tracing::error!(run_id = %run.id, error = %e, "Failed to increment attempt counter");
            }

            let error = match self.execute(run).await {
                Ok(report) => {
                    tracing::info!(run_id = %run.id, attempts, "Scoring pipeline succeeded");
                    return Ok(RetryOutcome::Succeeded { report, attempts });
                }
                Err(e) => e,
            };

            tracing::warn!(run_id = %run.id, attempt = attempts, error = %error, "Scoring attempt failed");

            if !error.is_retryable() {
                tracing::warn!(run_id = %run.id, error = %error, "Error is not retryable, giving up");
                last_error = Some(error);
                break;
            }
            last_error = Some(error);

            if attempt == max_retries {
                break;
            }

            let delay = backoff_delay(self.config.retry_base, attempt, &mut rand::thread_rng());
            tracing::info!(
                run_id = %run.id,
                backoff_ms = delay.as_millis() as u64,
                next_attempt = attempts + 1,
                "Retrying after backoff"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    tracing::info!(run_id = %run.id, attempts, "Run cancelled during backoff");
                    return Ok(RetryOutcome::Cancelled { attempts });
                }
            }
        }

        let message = format!(
            "scoring pipeline failed after {} attempts: {}",
            attempts,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string())
        );
        tracing::error!(run_id = %run.id, error = %message, "All retry attempts exhausted");

        if let Err(e) = self
            .runs
            .update_run_status(run.id, &StatusUpdate::failed(message.clone()))
            .await
        {
            tracing::error!(run_id = %run.id, error = %e, "Failed to record final failure");
        }

        Err(Error::Internal(message))
    }
}
