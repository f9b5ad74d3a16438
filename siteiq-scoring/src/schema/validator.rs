//! Upload validation against a resolved schema

use super::types::{FieldDef, FieldType, ResolvedSchema};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Collected validation messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }
}

/// Check that required columns and the identifier column are present
///
/// Columns not declared in the schema are kept in record data and only
/// produce a warning.
pub fn validate_headers(headers: &[String], schema: &ResolvedSchema) -> ValidationReport {
    let present: HashSet<&str> = headers.iter().map(String::as_str).collect();
    let mut report = ValidationReport::default();

    for (name, def) in schema.fields() {
        if def.required && !present.contains(name.as_str()) {
            report
                .errors
                .push(format!("required field '{}' not found in headers", name));
        }
    }

    if !present.contains(schema.identifier_column()) {
        report.errors.push(format!(
            "site_id_column '{}' not found in headers",
            schema.identifier_column()
        ));
    }

    for header in headers {
        if header == schema.identifier_column() || schema.field(header).is_some() {
            continue;
        }
        report.warnings.push(format!(
            "unexpected column '{}' found in upload; will be included in record data but not validated",
            header
        ));
    }

    report
}

/// Type and range checks for one row (`row_number` is 1-based)
pub fn validate_row(
    row: &BTreeMap<String, String>,
    schema: &ResolvedSchema,
    row_number: usize,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (name, def) in schema.fields() {
        let value = match row.get(name) {
            Some(value) => value,
            None if def.required => {
                report
                    .errors
                    .push(format!("row {}: required field '{}' is missing", row_number, name));
                continue;
            }
            None => continue,
        };

        if value.is_empty() && !def.required {
            continue;
        }

        if let Err(message) = check_value(name, value, def) {
            report.errors.push(format!("row {}: {}", row_number, message));
        }
    }

    report
}

fn check_value(name: &str, value: &str, def: &FieldDef) -> std::result::Result<(), String> {
    match def.field_type {
        FieldType::Text => Ok(()),
        FieldType::Identifier => {
            if value.trim().is_empty() {
                Err(format!("field '{}' (identifier) cannot be empty", name))
            } else {
                Ok(())
            }
        }
        FieldType::Percentage => {
            let number = parse_number(name, value)?;
            if !(0.0..=100.0).contains(&number) {
                return Err(format!(
                    "field '{}' must be between 0 and 100, got {}",
                    name, number
                ));
            }
            Ok(())
        }
        FieldType::Index | FieldType::Numeric => {
            let number = parse_number(name, value)?;
            check_bounds(name, number, def)
        }
        FieldType::Integer => {
            let number = parse_number(name, value)?;
            check_whole(name, number)?;
            if as_i64(number).is_none() {
                return Err(format!(
                    "field '{}' is outside the 64-bit integer range, got {}",
                    name, value
                ));
            }
            check_bounds(name, number, def)
        }
        FieldType::Population => {
            let number = parse_number(name, value)?;
            check_whole(name, number)?;
            if number < 0.0 {
                return Err(format!("field '{}' must be non-negative, got {}", name, number));
            }
            Ok(())
        }
    }
}

fn parse_number(name: &str, value: &str) -> std::result::Result<f64, String> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| format!("field '{}' must be a valid number, got '{}'", name, value))
}

fn check_whole(name: &str, number: f64) -> std::result::Result<(), String> {
    if number.fract() != 0.0 {
        return Err(format!("field '{}' must be a whole number, got {}", name, number));
    }
    Ok(())
}

/// Whole number that converts to `i64` without saturating
pub fn as_i64(number: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range
    let in_range = number >= i64::MIN as f64 && number < i64::MAX as f64;
    (number.fract() == 0.0 && in_range).then_some(number as i64)
}

fn check_bounds(name: &str, number: f64, def: &FieldDef) -> std::result::Result<(), String> {
    if let Some(min) = def.min {
        if number < min {
            return Err(format!("field '{}' must be >= {}, got {}", name, min, number));
        }
    }
    if let Some(max) = def.max {
        if number > max {
            return Err(format!("field '{}' must be <= {}, got {}", name, max, number));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::resolve_json;
    use serde_json::json;

    fn schema() -> ResolvedSchema {
        resolve_json(
            &json!({
                "site_id_column": "site_id",
                "fields": {
                    "site_id": {"type": "identifier", "required": true},
                    "city": {"type": "text"},
                    "unemployment_rate": {"type": "percentage", "required": true, "weight": 1.0},
                    "labor_force": {"type": "population", "weight": 0.5},
                    "store_count": {"type": "integer", "min": 0, "max": 50, "weight": 0.1},
                    "cost_index": {"type": "index", "min": 50, "max": 150, "weight": 0.3}
                }
            }),
            None,
        )
        .unwrap()
    }

    fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_headers_missing_required_and_identifier() {
        let headers = vec!["city".to_string()];
        let report = validate_headers(&headers, &schema());

        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| e.contains("'unemployment_rate'")));
        assert!(report.errors.iter().any(|e| e.contains("site_id_column 'site_id'")));
    }

    #[test]
    fn test_headers_unknown_column_is_warning() {
        let headers = vec![
            "site_id".to_string(),
            "unemployment_rate".to_string(),
            "notes".to_string(),
        ];
        let report = validate_headers(&headers, &schema());

        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("'notes'"));
    }

    #[test]
    fn test_valid_row() {
        let report = validate_row(
            &row(&[
                ("site_id", "S1"),
                ("unemployment_rate", "4.5"),
                ("labor_force", "120000"),
                ("store_count", "12"),
                ("cost_index", "101.5"),
            ]),
            &schema(),
            1,
        );
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn test_integer_beyond_i64_is_rejected() {
        let report = validate_row(
            &row(&[
                ("site_id", "S1"),
                ("unemployment_rate", "4"),
                ("store_count", "1e19"),
            ]),
            &schema(),
            2,
        );
        assert_eq!(
            report.errors,
            vec!["row 2: field 'store_count' is outside the 64-bit integer range, got 1e19"]
        );
    }

    #[test]
    fn test_as_i64_does_not_saturate() {
        assert_eq!(as_i64(42.0), Some(42));
        assert_eq!(as_i64(-9.0e18), Some(-9_000_000_000_000_000_000));
        assert_eq!(as_i64(i64::MIN as f64), Some(i64::MIN));
        assert_eq!(as_i64(9.3e18), None);
        assert_eq!(as_i64(-9.3e18), None);
        assert_eq!(as_i64(2.5), None);
    }

    #[test]
    fn test_percentage_out_of_range() {
        let report = validate_row(
            &row(&[("site_id", "S1"), ("unemployment_rate", "140")]),
            &schema(),
            3,
        );
        assert_eq!(
            report.errors,
            vec!["row 3: field 'unemployment_rate' must be between 0 and 100, got 140"]
        );
    }

    #[test]
    fn test_integer_must_be_whole_and_bounded() {
        let s = schema();
        let fractional = validate_row(
            &row(&[("site_id", "S1"), ("unemployment_rate", "1"), ("store_count", "2.5")]),
            &s,
            1,
        );
        assert!(fractional.errors[0].contains("whole number"));

        let too_many = validate_row(
            &row(&[("site_id", "S1"), ("unemployment_rate", "1"), ("store_count", "51")]),
            &s,
            1,
        );
        assert!(too_many.errors[0].contains("must be <= 50"));
    }

    #[test]
    fn test_population_non_negative() {
        let report = validate_row(
            &row(&[("site_id", "S1"), ("unemployment_rate", "1"), ("labor_force", "-5")]),
            &schema(),
            2,
        );
        assert!(report.errors[0].contains("non-negative"));
    }

    #[test]
    fn test_empty_optional_value_skipped() {
        let report = validate_row(
            &row(&[("site_id", "S1"), ("unemployment_rate", "1"), ("cost_index", "")]),
            &schema(),
            1,
        );
        assert!(report.is_valid());
    }

    #[test]
    fn test_blank_identifier_rejected() {
        let report = validate_row(
            &row(&[("site_id", "  "), ("unemployment_rate", "1")]),
            &schema(),
            7,
        );
        assert_eq!(
            report.errors,
            vec!["row 7: field 'site_id' (identifier) cannot be empty"]
        );
    }

    #[test]
    fn test_non_numeric_value() {
        let report = validate_row(
            &row(&[("site_id", "S1"), ("unemployment_rate", "n/a")]),
            &schema(),
            1,
        );
        assert!(report.errors[0].contains("must be a valid number, got 'n/a'"));
    }
}
