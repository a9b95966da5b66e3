use anyhow::Context;
use sqlx::{Row, SqlitePool};

use crate::models::EvaluationRecord;

/// Most recent evaluations first, optionally limited to one workflow type.
/// Rows without a `created_at` sort after every dated row.
pub async fn fetch_evaluations(
    pool: &SqlitePool,
    workflow_type: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<EvaluationRecord>> {
    let mut query = String::from(
        "SELECT evaluation_id, session_id, workflow_type, evaluation_score, \
         evaluation_rubric, created_at \
         FROM evaluations",
    );

    if workflow_type.is_some() {
        query.push_str(" WHERE workflow_type = ?");
    }
    query.push_str(" ORDER BY created_at IS NULL, created_at DESC, evaluation_id DESC LIMIT ?");

    let mut rows = sqlx::query(&query);

    if let Some(value) = workflow_type {
        rows = rows.bind(value);
    }
    rows = rows.bind(limit);

    let records = rows
        .fetch_all(pool)
        .await
        .context("failed to read evaluation history")?;
    let mut evaluations = Vec::new();

    for row in records {
        evaluations.push(EvaluationRecord {
            evaluation_id: row.try_get("evaluation_id")?,
            session_id: row.try_get("session_id")?,
            workflow_type: row.try_get("workflow_type")?,
            score: row.try_get("evaluation_score")?,
            rubric_json: row.try_get("evaluation_rubric")?,
            created_at: row.try_get("created_at")?,
        });
    }

    Ok(evaluations)
}
