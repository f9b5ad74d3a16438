//! Scored result (recommendation) persistence

use super::{parse_json, parse_uuid};
use crate::models::ScoredResult;
use siteiq_common::time::{from_db, to_db};
use siteiq_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

const RECOMMENDATION_COLUMNS: &str = r#"
    id, run_id, tenant_id, site_id, site_name, ranking,
    final_score, raw_score, component_scores, metadata, created_at
"#;

/// Row values prepared before the transaction opens
struct PreparedRow {
    id: String,
    tenant_id: String,
    site_id: String,
    site_name: Option<String>,
    ranking: i64,
    final_score: f64,
    raw_score: f64,
    component_scores: String,
    metadata: String,
    created_at: String,
}

/// Replace the result set of a run
///
/// One transaction: stale rows from an earlier aborted attempt are deleted,
/// then rows are inserted `batch_size` at a time. A failure rolls back
/// everything, so a run never has a partial result set.
pub async fn replace_for_run(
    pool: &SqlitePool,
    run_id: Uuid,
    results: &[ScoredResult],
    batch_size: usize,
) -> Result<()> {
    let run_id_str = run_id.to_string();
    let prepared = results
        .iter()
        .map(|r| {
            Ok(PreparedRow {
                id: r.id.to_string(),
                tenant_id: r.tenant_id.clone(),
                site_id: r.site_id.clone(),
                site_name: r.site_name.clone(),
                ranking: r.ranking,
                final_score: r.final_score,
                raw_score: r.raw_score,
                component_scores: serde_json::to_string(&r.explanation)?,
                metadata: serde_json::to_string(&r.metadata)?,
                created_at: to_db(&r.created_at),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM recommendations WHERE run_id = ?")
        .bind(&run_id_str)
        .execute(&mut *tx)
        .await?;

    for chunk in prepared.chunks(batch_size.max(1)) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO recommendations (id, run_id, tenant_id, site_id, site_name, ranking, \
             final_score, raw_score, component_scores, metadata, created_at) ",
        );
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(&row.id)
                .push_bind(&run_id_str)
                .push_bind(&row.tenant_id)
                .push_bind(&row.site_id)
                .push_bind(&row.site_name)
                .push_bind(row.ranking)
                .push_bind(row.final_score)
                .push_bind(row.raw_score)
                .push_bind(&row.component_scores)
                .push_bind(&row.metadata)
                .push_bind(&row.created_at);
        });
        builder.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;

    Ok(())
}

/// One page of a run's results in rank order, plus the filtered total
pub async fn list_for_run(
    pool: &SqlitePool,
    tenant_id: &str,
    run_id: Uuid,
    min_score: Option<f64>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ScoredResult>, i64)> {
    let min_score = min_score.unwrap_or(f64::MIN);

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM recommendations WHERE run_id = ? AND tenant_id = ? AND final_score >= ?",
    )
    .bind(run_id.to_string())
    .bind(tenant_id)
    .bind(min_score)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        "SELECT {} FROM recommendations \
         WHERE run_id = ? AND tenant_id = ? AND final_score >= ? \
         ORDER BY ranking LIMIT ? OFFSET ?",
        RECOMMENDATION_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(run_id.to_string())
        .bind(tenant_id)
        .bind(min_score)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let results = rows
        .iter()
        .map(result_from_row)
        .collect::<Result<Vec<_>>>()?;

    Ok((results, total))
}

/// The result for one record of a run
pub async fn get_for_site(
    pool: &SqlitePool,
    tenant_id: &str,
    run_id: Uuid,
    site_id: &str,
) -> Result<Option<ScoredResult>> {
    let sql = format!(
        "SELECT {} FROM recommendations WHERE run_id = ? AND tenant_id = ? AND site_id = ?",
        RECOMMENDATION_COLUMNS
    );

    let row = sqlx::query(&sql)
        .bind(run_id.to_string())
        .bind(tenant_id)
        .bind(site_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(result_from_row).transpose()
}

fn result_from_row(row: &SqliteRow) -> Result<ScoredResult> {
    Ok(ScoredResult {
        id: parse_uuid(&row.get::<String, _>("id"), "id")?,
        run_id: parse_uuid(&row.get::<String, _>("run_id"), "run_id")?,
        tenant_id: row.get("tenant_id"),
        site_id: row.get("site_id"),
        site_name: row.get("site_name"),
        ranking: row.get("ranking"),
        final_score: row.get("final_score"),
        raw_score: row.get("raw_score"),
        explanation: parse_json(&row.get::<String, _>("component_scores"), "component_scores")?,
        metadata: parse_json(&row.get::<String, _>("metadata"), "metadata")?,
        created_at: from_db(&row.get::<String, _>("created_at"))?,
    })
}
