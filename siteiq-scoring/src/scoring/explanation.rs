//! Explanation text for scored records

use crate::schema::Direction;
use serde::{Deserialize, Serialize};

/// Number of positive factors named in a summary
const SUMMARY_FACTOR_LIMIT: usize = 3;

/// One field's part in a record's score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationFactor {
    pub name: String,
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
    pub direction: String,
    pub reason: String,
}

/// Factor list (largest absolute contribution first) plus a summary sentence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub factors: Vec<ExplanationFactor>,
    pub summary: String,
}

/// Grade of a normalized value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Quality {
    pub fn from_normalized(normalized: f64) -> Self {
        if normalized >= 0.75 {
            Quality::Excellent
        } else if normalized >= 0.5 {
            Quality::Good
        } else if normalized >= 0.25 {
            Quality::Fair
        } else {
            Quality::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Excellent => "excellent",
            Quality::Good => "good",
            Quality::Fair => "fair",
            Quality::Poor => "poor",
        }
    }
}

/// e.g. "Unemployment Rate value is 25.00, which is fair for this metric (higher is better)"
pub fn reason(field_name: &str, value: f64, normalized: f64, direction: Direction) -> String {
    let preference = match direction {
        Direction::Maximize => "higher is better",
        Direction::Minimize => "lower is better",
    };

    format!(
        "{} value is {:.2}, which is {} for this metric ({})",
        title_case(&readable(field_name)),
        value,
        Quality::from_normalized(normalized).as_str(),
        preference
    )
}

/// Summary over factors already sorted by descending absolute contribution
pub fn summary(factors: &[ExplanationFactor], final_score: f64) -> String {
    let top: Vec<String> = factors
        .iter()
        .filter(|f| f.contribution > 0.0)
        .take(SUMMARY_FACTOR_LIMIT)
        .map(|f| readable(&f.name))
        .collect();

    match top.as_slice() {
        [] if factors.is_empty() => format!(
            "Final score is {:.1} based on weighted factor analysis. No scoring factors contributed to this site's score.",
            final_score
        ),
        [] => format!(
            "Final score is {:.1} based on weighted factor analysis.",
            final_score
        ),
        [only] => format!(
            "Final score is {:.1}. The primary contributing factor is {}.",
            final_score, only
        ),
        [first, second] => format!(
            "Final score is {:.1}. Top contributing factors are {} and {}.",
            final_score, first, second
        ),
        [rest @ .., last] => format!(
            "Final score is {:.1}. Top contributing factors are {}, and {}.",
            final_score,
            rest.join(", "),
            last
        ),
    }
}

fn readable(field_name: &str) -> String {
    field_name.replace('_', " ")
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
