//! Stored schema configuration documents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Global (`tenant_id` = None) or tenant schema configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub version: i64,
    pub config: Value,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SchemaConfig {
    pub fn new(tenant_id: Option<String>, config: Value, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            version: 1,
            config,
            description,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Point-in-time copy of the schema one run used; never updated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfigSnapshot {
    pub id: Uuid,
    pub run_id: Uuid,
    /// Global configuration the run resolved against
    pub schema_config_id: Uuid,
    /// Tenant override merged on top, if the tenant had one
    pub tenant_schema_config_id: Option<Uuid>,
    pub upload_id: Uuid,
    /// Raw global configuration document
    pub config: Value,
    /// Serialized resolved schema
    pub snapshot_data: Value,
    pub created_at: DateTime<Utc>,
}
