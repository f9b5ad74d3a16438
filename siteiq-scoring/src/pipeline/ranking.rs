//! Result ranking
//!
//! Order: final score descending, then record identifier ascending, then
//! input order (the sort is stable). Ranks are dense and 1-based.

use crate::models::ScoredResult;
use std::cmp::Ordering;

/// Sort `results` into rank order and assign `ranking`
pub fn assign_ranks(results: &mut [ScoredResult]) {
    results.sort_by(compare);
    for (index, result) in results.iter_mut().enumerate() {
        result.ranking = index as i64 + 1;
    }
}

fn compare(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| a.site_id.cmp(&b.site_id))
}
