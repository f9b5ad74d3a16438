//! Data models for the scoring service

pub mod claim;
pub mod records;
pub mod schema_config;
pub mod scoring_run;

pub use claim::Claim;
pub use records::{RecordSkip, ScoredResult, SiteRecord, Upload, ValidationStatus};
pub use schema_config::{SchemaConfig, SchemaConfigSnapshot};
pub use scoring_run::{RunStatus, ScoringRun, StatusUpdate};
