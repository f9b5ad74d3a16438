//! Recommendation API handlers
//!
//! GET /api/v1/runs/:run_id/recommendations,
//! GET /api/v1/runs/:run_id/recommendations/:site_id/explain

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{parse_id, TenantId};
use crate::{
    db,
    error::{ApiError, ApiResult},
    models::{RunStatus, SchemaConfigSnapshot, ScoringRun},
    scoring::{Explanation, ExplanationFactor},
    store::{ConfigStore, RunStore},
    AppState,
};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Query string; unparsable or out-of-range values fall back to defaults
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub min_score: Option<String>,
}

impl ListParams {
    fn page(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|p| p.parse::<i64>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1)
    }

    fn page_size(&self) -> i64 {
        self.page_size
            .as_deref()
            .and_then(|p| p.parse::<i64>().ok())
            .filter(|p| (1..=MAX_PAGE_SIZE).contains(p))
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    fn min_score(&self) -> Option<f64> {
        self.min_score
            .as_deref()
            .and_then(|m| m.parse::<f64>().ok())
            .filter(|m| m.is_finite() && *m >= 0.0)
    }
}

#[derive(Debug, Serialize)]
pub struct RecommendationItem {
    pub rank: i64,
    pub site_id: String,
    pub site_name: Option<String>,
    pub final_score: f64,
    pub raw_score: f64,
    pub explanation: Explanation,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    pub total_results: i64,
    pub total_pages: i64,
}

/// GET /api/v1/runs/:run_id/recommendations response
#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub recommendations: Vec<RecommendationItem>,
    pub pagination: Pagination,
}

/// Weights recorded in the run's schema snapshot
#[derive(Debug, Serialize)]
pub struct WeightsApplied {
    /// "tenant_override" when the snapshot carries explicit weights
    pub source: String,
    pub schema_config_snapshot_id: Uuid,
    pub weight_set: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct ExplanationDetail {
    pub factors: Vec<ExplanationFactor>,
    pub summary: String,
    pub model_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scored_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights_applied: Option<WeightsApplied>,
}

/// GET /api/v1/runs/:run_id/recommendations/:site_id/explain response
#[derive(Debug, Serialize)]
pub struct ExplainResponse {
    pub run_id: Uuid,
    pub site_id: String,
    pub site_name: Option<String>,
    pub rank: i64,
    pub final_score: f64,
    pub raw_score: f64,
    pub explanation: ExplanationDetail,
}

async fn load_run(state: &AppState, tenant: &TenantId, run_id: &str) -> ApiResult<ScoringRun> {
    let run_id = parse_id(run_id, "run_id")?;
    state
        .store
        .get_run(tenant.as_str(), run_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("run not found".to_string()))
}

/// GET /api/v1/runs/:run_id/recommendations
pub async fn list_recommendations(
    State(state): State<AppState>,
    tenant: TenantId,
    Path(run_id): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<RecommendationsResponse>> {
    let run = load_run(&state, &tenant, &run_id).await?;

    let page = params.page();
    let page_size = params.page_size();
    let offset = (page - 1).saturating_mul(page_size);

    let (results, total) = db::recommendations::list_for_run(
        &state.db,
        tenant.as_str(),
        run.id,
        params.min_score(),
        page_size,
        offset,
    )
    .await?;

    let recommendations = results
        .into_iter()
        .map(|r| RecommendationItem {
            rank: r.ranking,
            site_id: r.site_id,
            site_name: r.site_name,
            final_score: r.final_score,
            raw_score: r.raw_score,
            explanation: r.explanation,
        })
        .collect();

    Ok(Json(RecommendationsResponse {
        run_id: run.id,
        status: run.status,
        recommendations,
        pagination: pagination(page, page_size, total),
    }))
}

/// Weight provenance follows the configs the run resolved, not the weight map
fn weights_source(snapshot: &SchemaConfigSnapshot) -> &'static str {
    if snapshot.tenant_schema_config_id.is_some() {
        "tenant_override"
    } else {
        "global_defaults"
    }
}

/// GET /api/v1/runs/:run_id/recommendations/:site_id/explain
pub async fn explain_recommendation(
    State(state): State<AppState>,
    tenant: TenantId,
    Path((run_id, site_id)): Path<(String, String)>,
) -> ApiResult<Json<ExplainResponse>> {
    let run = load_run(&state, &tenant, &run_id).await?;

    let result = db::recommendations::get_for_site(&state.db, tenant.as_str(), run.id, &site_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("recommendation not found".to_string()))?;

    let weights_applied = match run.schema_config_snapshot_id {
        Some(snapshot_id) => state
            .store
            .get_snapshot(snapshot_id)
            .await?
            .map(|snapshot| {
                let weight_set = snapshot
                    .snapshot_data
                    .get("weights")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                WeightsApplied {
                    source: weights_source(&snapshot).to_string(),
                    schema_config_snapshot_id: snapshot.id,
                    weight_set,
                }
            }),
        None => None,
    };

    Ok(Json(ExplainResponse {
        run_id: run.id,
        site_id: result.site_id,
        site_name: result.site_name,
        rank: result.ranking,
        final_score: result.final_score,
        raw_score: result.raw_score,
        explanation: ExplanationDetail {
            factors: result.explanation.factors,
            summary: result.explanation.summary,
            model_version: run.model_version,
            scored_at: run.completed_at,
            weights_applied,
        },
    }))
}

fn pagination(page: i64, page_size: i64, total: i64) -> Pagination {
    Pagination {
        page,
        page_size,
        total_results: total,
        total_pages: (total + page_size - 1) / page_size,
    }
}

/// Build recommendation routes
pub fn recommendation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/runs/:run_id/recommendations",
            get(list_recommendations),
        )
        .route(
            "/api/v1/runs/:run_id/recommendations/:site_id/explain",
            get(explain_recommendation),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: &str, page_size: &str, min_score: &str) -> ListParams {
        ListParams {
            page: Some(page.to_string()),
            page_size: Some(page_size.to_string()),
            min_score: Some(min_score.to_string()),
        }
    }

    #[test]
    fn test_defaults_when_absent() {
        let p = ListParams::default();
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(p.min_score(), None);
    }

    #[test]
    fn test_out_of_range_values_fall_back() {
        let p = params("0", "500", "-3");
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(p.min_score(), None);

        let p = params("abc", "0", "nan");
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(p.min_score(), None);
    }

    #[test]
    fn test_valid_values_used() {
        let p = params("3", "100", "42.5");
        assert_eq!(p.page(), 3);
        assert_eq!(p.page_size(), 100);
        assert_eq!(p.min_score(), Some(42.5));
    }

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(pagination(1, 20, 0).total_pages, 0);
        assert_eq!(pagination(1, 20, 20).total_pages, 1);
        assert_eq!(pagination(1, 20, 21).total_pages, 2);
    }
}
