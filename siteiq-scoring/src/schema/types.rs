//! Schema data types
//!
//! Raw configuration documents (`GlobalSchemaConfig`, `TenantSchemaOverride`)
//! deserialize straight from the JSON stored in `schema_configs`. A
//! `ResolvedSchema` is only produced by the resolver and cannot be mutated
//! afterwards.

use serde::{Deserialize, Serialize};
use siteiq_common::{Error, Result};
use std::collections::BTreeMap;

/// Data type of one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Percentage,
    Index,
    Integer,
    Numeric,
    Population,
    Text,
    Identifier,
}

impl FieldType {
    /// Ordinal types take part in scoring; text and identifier never do
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Percentage
                | FieldType::Index
                | FieldType::Integer
                | FieldType::Numeric
                | FieldType::Population
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Percentage => "percentage",
            FieldType::Index => "index",
            FieldType::Integer => "integer",
            FieldType::Numeric => "numeric",
            FieldType::Population => "population",
            FieldType::Text => "text",
            FieldType::Identifier => "identifier",
        }
    }
}

/// Whether larger or smaller values score better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Maximize,
    Minimize,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Maximize => "maximize",
            Direction::Minimize => "minimize",
        }
    }
}

/// One field's contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub description: String,
}

/// Global schema document (`schema_configs` row with no tenant)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSchemaConfig {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDef>,
    #[serde(default, rename = "site_id_column", alias = "identifier_column")]
    pub identifier_column: String,
}

/// Tenant override document; every section is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantSchemaOverride {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldDef>,
    #[serde(
        default,
        rename = "site_id_column",
        alias = "identifier_column",
        skip_serializing_if = "Option::is_none"
    )]
    pub identifier_column: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub weights: BTreeMap<String, f64>,
}

/// Merged, run-ready schema
///
/// Fields are private: the only ways to obtain one are the resolver and
/// deserializing a stored snapshot, and both go through [`ResolvedSchema::new`]
/// so the weight-key invariant always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawResolvedSchema")]
pub struct ResolvedSchema {
    fields: BTreeMap<String, FieldDef>,
    #[serde(rename = "site_id_column")]
    identifier_column: String,
    weights: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
struct RawResolvedSchema {
    fields: BTreeMap<String, FieldDef>,
    #[serde(rename = "site_id_column", alias = "identifier_column")]
    identifier_column: String,
    #[serde(default)]
    weights: BTreeMap<String, f64>,
}

impl TryFrom<RawResolvedSchema> for ResolvedSchema {
    type Error = Error;

    fn try_from(raw: RawResolvedSchema) -> Result<Self> {
        ResolvedSchema::new(raw.fields, raw.identifier_column, raw.weights)
    }
}

impl ResolvedSchema {
    /// Build a schema, rejecting weights for undeclared fields
    pub fn new(
        fields: BTreeMap<String, FieldDef>,
        identifier_column: String,
        weights: BTreeMap<String, f64>,
    ) -> Result<Self> {
        if let Some(name) = weights.keys().find(|name| !fields.contains_key(*name)) {
            return Err(Error::Config(format!(
                "cannot override weight for non-existent field: {}",
                name
            )));
        }

        Ok(Self {
            fields,
            identifier_column,
            weights,
        })
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldDef> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn identifier_column(&self) -> &str {
        &self.identifier_column
    }

    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    /// Weight used for scoring: explicit weight entry, else the field's own
    pub fn effective_weight(&self, name: &str) -> Option<f64> {
        self.weights
            .get(name)
            .copied()
            .or_else(|| self.fields.get(name).map(|f| f.weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_def_defaults() {
        let def: FieldDef = serde_json::from_value(json!({"type": "percentage"})).unwrap();
        assert_eq!(def.field_type, FieldType::Percentage);
        assert!(!def.required);
        assert_eq!(def.min, None);
        assert_eq!(def.weight, 0.0);
        assert_eq!(def.direction, Direction::Maximize);
    }

    #[test]
    fn test_unknown_field_type_rejected() {
        let result: std::result::Result<FieldDef, _> =
            serde_json::from_value(json!({"type": "currency"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_numeric_types() {
        assert!(FieldType::Population.is_numeric());
        assert!(FieldType::Index.is_numeric());
        assert!(!FieldType::Text.is_numeric());
        assert!(!FieldType::Identifier.is_numeric());
    }

    #[test]
    fn test_snapshot_deserialization_enforces_weight_keys() {
        let result: std::result::Result<ResolvedSchema, _> = serde_json::from_value(json!({
            "fields": {"a": {"type": "numeric", "weight": 1.0}},
            "site_id_column": "site_id",
            "weights": {"b": 2.0}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_effective_weight_falls_back_to_field() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "a".to_string(),
            serde_json::from_value(json!({"type": "numeric", "weight": 1.5})).unwrap(),
        );
        let schema = ResolvedSchema::new(fields, "site_id".to_string(), BTreeMap::new()).unwrap();

        assert_eq!(schema.effective_weight("a"), Some(1.5));
        assert_eq!(schema.effective_weight("missing"), None);
    }
}
