//! Weighted normalization scoring with per-factor explanations

pub mod engine;
pub mod explanation;

pub use engine::{normalize, score, ScoreOutcome};
pub use explanation::{Explanation, ExplanationFactor, Quality};
