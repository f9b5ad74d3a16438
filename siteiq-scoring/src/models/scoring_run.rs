//! Scoring run lifecycle
//!
//! QUEUED → RUNNING → SUCCEEDED | FAILED
//!
//! Within one attempt status only moves forward. A retry takes a failed
//! attempt back through RUNNING.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use siteiq_common::Error;
use std::str::FromStr;
use uuid::Uuid;

/// Run status as stored in `scoring_runs.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created by the request layer, not yet picked up
    Queued,
    /// An attempt is executing
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(RunStatus::Queued),
            "running" => Ok(RunStatus::Running),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" => Ok(RunStatus::Failed),
            other => Err(Error::Internal(format!("Unknown run status: {}", other))),
        }
    }
}

/// One scoring execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRun {
    #[serde(rename = "run_id")]
    pub id: Uuid,
    pub upload_id: Uuid,
    pub tenant_id: String,
    pub status: RunStatus,
    pub model_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring_config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_config_snapshot_id: Option<Uuid>,
    pub row_count: i64,
    pub scored_count: i64,
    /// Attempts started so far
    pub attempt: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScoringRun {
    /// New queued run over an upload
    pub fn new(
        tenant_id: impl Into<String>,
        upload_id: Uuid,
        model_version: impl Into<String>,
        row_count: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            upload_id,
            tenant_id: tenant_id.into(),
            status: RunStatus::Queued,
            model_version: model_version.into(),
            scoring_config: None,
            schema_config_snapshot_id: None,
            row_count,
            scored_count: 0,
            attempt: 0,
            last_error: None,
            idempotency_key: None,
            duration_ms: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }

    pub fn with_scoring_config(mut self, config: Option<Value>) -> Self {
        self.scoring_config = config;
        self
    }
}

/// Status write; `None` fields keep their stored value
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: RunStatus,
    pub scored_count: Option<i64>,
    pub last_error: Option<String>,
    pub duration_ms: Option<i64>,
}

impl StatusUpdate {
    pub fn running() -> Self {
        Self {
            status: RunStatus::Running,
            scored_count: None,
            last_error: None,
            duration_ms: None,
        }
    }

    pub fn succeeded(scored_count: i64, duration_ms: i64) -> Self {
        Self {
            status: RunStatus::Succeeded,
            scored_count: Some(scored_count),
            last_error: None,
            duration_ms: Some(duration_ms),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            scored_count: None,
            last_error: Some(message.into()),
            duration_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_run_is_queued() {
        let run = ScoringRun::new("tenant-a", Uuid::new_v4(), "v1", 10);
        assert_eq!(run.status, RunStatus::Queued);
        assert_eq!(run.attempt, 0);
        assert!(run.schema_config_snapshot_id.is_none());
    }

    #[test]
    fn test_status_round_trip_through_str() {
        for status in [
            RunStatus::Queued,
            RunStatus::Running,
            RunStatus::Succeeded,
            RunStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
        }
        assert!("paused".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(!RunStatus::Queued.is_terminal());
    }

    #[test]
    fn test_run_serializes_id_as_run_id() {
        let run = ScoringRun::new("t", Uuid::new_v4(), "v1", 0);
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["run_id"], run.id.to_string());
        assert_eq!(json["status"], "queued");
    }
}
