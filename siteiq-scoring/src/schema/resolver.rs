//! Hierarchical schema resolution
//!
//! Weight precedence, highest first:
//! 1. tenant `weights` entry
//! 2. weight embedded in a tenant field definition
//! 3. weight embedded in the global field definition
//!
//! Resolution is a pure function of its inputs and holds no state, so any
//! number of runs may resolve concurrently.

use super::types::{GlobalSchemaConfig, ResolvedSchema, TenantSchemaOverride};
use serde_json::Value;
use siteiq_common::{Error, Result};
use std::collections::BTreeMap;

/// Merge the global config with an optional tenant override
pub fn resolve(
    global: &GlobalSchemaConfig,
    tenant: Option<&TenantSchemaOverride>,
) -> Result<ResolvedSchema> {
    if global.identifier_column.trim().is_empty() {
        return Err(Error::Config(
            "global schema config must specify site_id_column".to_string(),
        ));
    }
    if global.fields.is_empty() {
        return Err(Error::Config(
            "global schema config must specify at least one field".to_string(),
        ));
    }

    let mut fields = global.fields.clone();
    let mut weights: BTreeMap<String, f64> = global
        .fields
        .iter()
        .map(|(name, def)| (name.clone(), def.weight))
        .collect();
    let mut identifier_column = global.identifier_column.clone();

    if let Some(tenant) = tenant {
        if let Some(column) = &tenant.identifier_column {
            if column.trim().is_empty() {
                return Err(Error::Config(
                    "tenant site_id_column override cannot be empty".to_string(),
                ));
            }
            identifier_column = column.clone();
        }

        // A tenant field replaces the global definition wholesale, weight included
        for (name, def) in &tenant.fields {
            fields.insert(name.clone(), def.clone());
            weights.insert(name.clone(), def.weight);
        }

        for (name, weight) in &tenant.weights {
            if !fields.contains_key(name) {
                return Err(Error::Config(format!(
                    "cannot override weight for non-existent field: {}",
                    name
                )));
            }
            weights.insert(name.clone(), *weight);
        }
    }

    ResolvedSchema::new(fields, identifier_column, weights)
}

/// Resolve from stored JSON documents
///
/// A JSON `null` tenant document is the same as no override.
pub fn resolve_json(global: &Value, tenant: Option<&Value>) -> Result<ResolvedSchema> {
    let global: GlobalSchemaConfig = serde_json::from_value(global.clone())
        .map_err(|e| Error::Config(format!("failed to parse global schema config: {}", e)))?;

    let tenant = match tenant {
        None | Some(Value::Null) => None,
        Some(raw) => Some(
            serde_json::from_value::<TenantSchemaOverride>(raw.clone()).map_err(|e| {
                Error::Config(format!("failed to parse tenant schema override: {}", e))
            })?,
        ),
    };

    resolve(&global, tenant.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{Direction, FieldType};
    use serde_json::json;

    fn global_config() -> Value {
        json!({
            "site_id_column": "site_id",
            "fields": {
                "site_id": {"type": "identifier", "required": true},
                "unemployment_rate": {
                    "type": "percentage", "min": 0, "max": 100,
                    "weight": 1.0, "direction": "maximize"
                },
                "median_wage": {
                    "type": "numeric", "min": 20000, "max": 120000,
                    "weight": 0.5, "direction": "minimize"
                }
            }
        })
    }

    #[test]
    fn test_global_only() {
        let schema = resolve_json(&global_config(), None).unwrap();

        assert_eq!(schema.identifier_column(), "site_id");
        assert_eq!(schema.fields().len(), 3);
        assert_eq!(schema.weights().get("unemployment_rate"), Some(&1.0));
        assert_eq!(schema.weights().get("median_wage"), Some(&0.5));
    }

    #[test]
    fn test_null_tenant_is_noop() {
        let with_null = resolve_json(&global_config(), Some(&Value::Null)).unwrap();
        let without = resolve_json(&global_config(), None).unwrap();
        assert_eq!(with_null, without);
    }

    #[test]
    fn test_missing_identifier_column() {
        let mut global = global_config();
        global.as_object_mut().unwrap().remove("site_id_column");

        let err = resolve_json(&global, None).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("site_id_column")));
    }

    #[test]
    fn test_zero_fields() {
        let err = resolve_json(&json!({"site_id_column": "id", "fields": {}}), None).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("at least one field")));
    }

    #[test]
    fn test_tenant_field_replaces_global_definition() {
        let tenant = json!({
            "fields": {
                "median_wage": {"type": "numeric", "weight": 3.0, "direction": "maximize"}
            }
        });
        let schema = resolve_json(&global_config(), Some(&tenant)).unwrap();

        let def = schema.field("median_wage").unwrap();
        assert_eq!(def.direction, Direction::Maximize);
        assert_eq!(def.min, None);
        assert_eq!(schema.weights().get("median_wage"), Some(&3.0));
    }

    #[test]
    fn test_tenant_adds_new_field() {
        let tenant = json!({"fields": {"labor_force": {"type": "population", "weight": 0.2}}});
        let schema = resolve_json(&global_config(), Some(&tenant)).unwrap();

        assert_eq!(
            schema.field("labor_force").map(|f| f.field_type),
            Some(FieldType::Population)
        );
        assert_eq!(schema.effective_weight("labor_force"), Some(0.2));
    }

    #[test]
    fn test_standalone_weight_beats_tenant_field_weight() {
        let tenant = json!({
            "fields": {"unemployment_rate": {"type": "percentage", "weight": 5.0}},
            "weights": {"unemployment_rate": 2.0}
        });
        let schema = resolve_json(&global_config(), Some(&tenant)).unwrap();

        assert_eq!(schema.weights().get("unemployment_rate"), Some(&2.0));
    }

    #[test]
    fn test_weight_for_unknown_field_fails_closed() {
        let tenant = json!({"weights": {"crime_rate": 1.0}});
        let err = resolve_json(&global_config(), Some(&tenant)).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Configuration error: cannot override weight for non-existent field: crime_rate"
        );
    }

    #[test]
    fn test_weight_for_field_added_by_same_override() {
        let tenant = json!({
            "fields": {"crime_rate": {"type": "percentage", "weight": 1.0}},
            "weights": {"crime_rate": 4.0}
        });
        let schema = resolve_json(&global_config(), Some(&tenant)).unwrap();
        assert_eq!(schema.effective_weight("crime_rate"), Some(4.0));
    }

    #[test]
    fn test_identifier_column_override() {
        let tenant = json!({"site_id_column": "location_code"});
        let schema = resolve_json(&global_config(), Some(&tenant)).unwrap();
        assert_eq!(schema.identifier_column(), "location_code");
    }

    #[test]
    fn test_malformed_tenant_document() {
        let err = resolve_json(&global_config(), Some(&json!({"weights": "heavy"}))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let tenant = json!({"weights": {"median_wage": 0.9}});
        let a = serde_json::to_string(&resolve_json(&global_config(), Some(&tenant)).unwrap()).unwrap();
        let b = serde_json::to_string(&resolve_json(&global_config(), Some(&tenant)).unwrap()).unwrap();
        assert_eq!(a, b);
    }
}
