//! Record ingest
//!
//! Takes already-tokenized rows, validates them against the tenant's
//! resolved schema and stores one `site_records` row per input row. Identical
//! content from the same tenant is detected by SHA-256 hash and not stored
//! twice. An upload that fails validation is stored without records so it
//! can be inspected, but runs cannot be created against it.

use crate::db;
use crate::models::{SiteRecord, Upload, ValidationStatus};
use crate::schema::{self, FieldType, ResolvedSchema, ValidationReport};
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use sha2::{Digest, Sha256};
use siteiq_common::Result;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::Uuid;

/// Rows to ingest
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub filename: String,
    /// Column order as uploaded; derived from the rows when absent
    #[serde(default)]
    pub headers: Option<Vec<String>>,
    pub rows: Vec<BTreeMap<String, String>>,
}

impl IngestRequest {
    pub fn headers(&self) -> Vec<String> {
        match &self.headers {
            Some(headers) => headers.clone(),
            None => self
                .rows
                .iter()
                .flat_map(|row| row.keys().cloned())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        }
    }
}

/// Result of an ingest call
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Stored(Upload),
    /// Same tenant already uploaded identical content
    Duplicate(Upload),
}

/// SHA-256 over headers and rows
pub fn content_hash(headers: &[String], rows: &[BTreeMap<String, String>]) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(&(headers, rows))?);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Schema used when no global configuration is installed
fn fallback_schema() -> Result<ResolvedSchema> {
    schema::resolve_json(
        &json!({
            "site_id_column": "site_id",
            "fields": {"site_id": {"type": "identifier", "required": true}}
        }),
        None,
    )
}

/// Resolve the schema ingest validates against
pub async fn resolve_for_tenant(pool: &SqlitePool, tenant_id: &str) -> Result<ResolvedSchema> {
    let global = match db::schema_configs::get_active(pool, None).await? {
        Some(global) => global,
        None => {
            tracing::warn!("No active global schema config, validating against default schema");
            return fallback_schema();
        }
    };
    let tenant = db::schema_configs::get_active(pool, Some(tenant_id)).await?;

    schema::resolve_json(&global.config, tenant.as_ref().map(|t| &t.config))
}

/// Validate and store an upload under `upload_id`
pub async fn ingest(
    pool: &SqlitePool,
    tenant_id: &str,
    upload_id: Uuid,
    request: &IngestRequest,
    idempotency_key: Option<String>,
) -> Result<IngestOutcome> {
    let headers = request.headers();
    let hash = content_hash(&headers, &request.rows)?;

    if let Some(existing) = db::uploads::find_by_content_hash(pool, tenant_id, &hash).await? {
        tracing::info!(
            upload_id = %existing.id,
            tenant_id,
            "Duplicate upload content, returning existing upload"
        );
        return Ok(IngestOutcome::Duplicate(existing));
    }

    let schema = resolve_for_tenant(pool, tenant_id).await?;
    let report = validate(&headers, &request.rows, &schema);

    let now = chrono::Utc::now();
    let valid = report.is_valid();
    let records = if valid {
        build_records(tenant_id, upload_id, &request.rows, &schema, now)
    } else {
        Vec::new()
    };

    let upload = Upload {
        id: upload_id,
        tenant_id: tenant_id.to_string(),
        filename: request.filename.clone(),
        status: if valid { "completed" } else { "failed" }.to_string(),
        validation_status: if valid {
            ValidationStatus::Valid
        } else {
            ValidationStatus::Invalid
        },
        row_count: records.len() as i64,
        warnings: report.warnings,
        errors: report.errors,
        idempotency_key,
        content_hash: hash,
        created_at: now,
        updated_at: now,
    };

    db::uploads::insert_upload(pool, &upload, &records).await?;

    tracing::info!(
        upload_id = %upload.id,
        tenant_id,
        row_count = upload.row_count,
        validation_status = upload.validation_status.as_str(),
        error_count = upload.errors.len(),
        "Upload ingested"
    );

    Ok(IngestOutcome::Stored(upload))
}

/// Header, row and identifier-uniqueness checks
pub fn validate(
    headers: &[String],
    rows: &[BTreeMap<String, String>],
    schema: &ResolvedSchema,
) -> ValidationReport {
    let mut report = schema::validate_headers(headers, schema);
    let mut seen = HashSet::new();

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + 1;
        report.merge(schema::validate_row(row, schema, row_number));

        let site_id = record_identifier(row, schema, row_number);
        if !seen.insert(site_id.clone()) {
            report
                .errors
                .push(format!("row {}: duplicate site id '{}'", row_number, site_id));
        }
    }

    report
}

fn build_records(
    tenant_id: &str,
    upload_id: Uuid,
    rows: &[BTreeMap<String, String>],
    schema: &ResolvedSchema,
    now: chrono::DateTime<chrono::Utc>,
) -> Vec<SiteRecord> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let site_id = record_identifier(row, schema, index + 1);
            let site_name = row
                .get("city")
                .or_else(|| row.get("site_name"))
                .cloned()
                .unwrap_or_else(|| site_id.clone());

            SiteRecord {
                id: Uuid::new_v4(),
                upload_id,
                tenant_id: tenant_id.to_string(),
                site_id,
                site_name: Some(site_name),
                data: Value::Object(typed_values(row, schema)).to_string(),
                row_index: index as i64,
                created_at: now,
            }
        })
        .collect()
}

/// Identifier column value, or `row_<n>` when absent or blank
fn record_identifier(row: &BTreeMap<String, String>, schema: &ResolvedSchema, row_number: usize) -> String {
    row.get(schema.identifier_column())
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| format!("row_{}", row_number))
}

/// Convert values of numerically typed columns into JSON numbers
fn typed_values(row: &BTreeMap<String, String>, schema: &ResolvedSchema) -> Map<String, Value> {
    row.iter()
        .map(|(key, raw)| {
            let value = match schema.field(key).map(|f| f.field_type) {
                Some(FieldType::Integer) => raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(schema::as_i64)
                    .map(|n| Value::Number(Number::from(n))),
                Some(t) if t.is_numeric() => raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number),
                _ => None,
            };
            (key.clone(), value.unwrap_or_else(|| Value::String(raw.clone())))
        })
        .collect()
}
