//! Scoring engine
//!
//! Each numeric field with a non-zero effective weight is normalized to the
//! unit interval and weighted. Fields that are absent from the record or do
//! not coerce to a finite number are skipped without error: partially
//! populated records are expected.

use super::explanation::{self, Explanation, ExplanationFactor};
use crate::schema::{Direction, FieldDef, ResolvedSchema};
use serde_json::{Map, Value};
use siteiq_common::{Error, Result};

/// Scores for one record
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    /// Sum of weighted contributions
    pub raw_score: f64,
    /// `raw_score` as a percentage of the maximum possible, in [0, 100]
    pub final_score: f64,
    pub explanation: Explanation,
}

/// Score one record against a resolved schema
///
/// Fails only when `record` is empty.
pub fn score(record: &Map<String, Value>, schema: &ResolvedSchema) -> Result<ScoreOutcome> {
    if record.is_empty() {
        return Err(Error::InvalidInput("site data cannot be empty".to_string()));
    }

    let mut factors = Vec::new();
    let mut total_contribution = 0.0;
    let mut max_possible = 0.0;

    for (name, def) in schema.fields() {
        if !def.field_type.is_numeric() {
            continue;
        }

        let weight = match schema.effective_weight(name) {
            Some(w) if w != 0.0 && w.is_finite() => w,
            _ => continue,
        };

        let Some(value) = record.get(name).and_then(coerce) else {
            continue;
        };

        let normalized = normalize(value, def);
        let contribution = normalized * weight;
        total_contribution += contribution;
        max_possible += weight;

        factors.push(ExplanationFactor {
            name: name.clone(),
            value,
            weight,
            contribution,
            direction: def.direction.as_str().to_string(),
            reason: explanation::reason(name, value, normalized, def.direction),
        });
    }

    let final_score = if max_possible > 0.0 {
        (total_contribution / max_possible * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    // Stable: equal contributions keep field-name order
    factors.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));

    let summary = explanation::summary(&factors, final_score);

    Ok(ScoreOutcome {
        raw_score: total_contribution,
        final_score,
        explanation: Explanation { factors, summary },
    })
}

/// Map a raw value to [0, 1] for its field
///
/// Without both bounds the value is read on a 0..100 reference scale.
/// Equal bounds carry no information and normalize to the midpoint.
pub fn normalize(value: f64, def: &FieldDef) -> f64 {
    let normalized = match (def.min, def.max) {
        (Some(min), Some(max)) if min == max => return 0.5,
        (Some(min), Some(max)) => ((value - min) / (max - min)).clamp(0.0, 1.0),
        _ => (value / 100.0).clamp(0.0, 1.0),
    };

    match def.direction {
        Direction::Maximize => normalized,
        Direction::Minimize => 1.0 - normalized,
    }
}

/// Numbers pass through; strings must parse as a finite number
fn coerce(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}
