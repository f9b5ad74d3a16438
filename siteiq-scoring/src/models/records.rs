//! Uploads, input records and scored results

use crate::scoring::Explanation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Outcome of validating an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Invalid,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Valid => "valid",
            ValidationStatus::Invalid => "invalid",
        }
    }

    pub fn parse(s: &str) -> Self {
        if s == "valid" {
            ValidationStatus::Valid
        } else {
            ValidationStatus::Invalid
        }
    }
}

/// One ingested upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    #[serde(rename = "upload_id")]
    pub id: Uuid,
    pub tenant_id: String,
    pub filename: String,
    pub status: String,
    pub validation_status: ValidationStatus,
    pub row_count: i64,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One stored input row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteRecord {
    pub id: Uuid,
    pub upload_id: Uuid,
    pub tenant_id: String,
    pub site_id: String,
    pub site_name: Option<String>,
    /// JSON object text as stored; parsed by the pipeline
    pub data: String,
    pub row_index: i64,
    pub created_at: DateTime<Utc>,
}

/// One record's scoring outcome (a recommendation once persisted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredResult {
    pub id: Uuid,
    pub run_id: Uuid,
    pub tenant_id: String,
    pub site_id: String,
    pub site_name: Option<String>,
    /// 1-based, dense, unique within the run; 0 until ranked
    pub ranking: i64,
    pub final_score: f64,
    pub raw_score: f64,
    pub explanation: Explanation,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// A record the pipeline could not score
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSkip {
    pub site_id: String,
    pub reason: String,
}
