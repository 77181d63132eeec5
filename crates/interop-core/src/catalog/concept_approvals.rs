//! Job Catalog storage for human-approved concept normalizations
//! (spec.md §3 ConceptApproval, §4.11 Approvals).

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::ServerResult;

/// Records/overwrites an operator's `sourceValue -> concept_id` decision.
/// `job_id = None` stores a global fallback approval.
pub async fn upsert(
    pool: &SqlitePool,
    job_id: Option<Uuid>,
    field: &str,
    source_value: &str,
    concept_id: i64,
) -> ServerResult<()> {
    sqlx::query(
        "INSERT INTO concept_approvals (job_id, field, source_value, concept_id) VALUES (?, ?, ?, ?) \
         ON CONFLICT (job_id, field, source_value) DO UPDATE SET concept_id = excluded.concept_id",
    )
    .bind(job_id.map(|id| id.to_string()))
    .bind(field)
    .bind(source_value)
    .bind(concept_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Looks up an approval, preferring a job-scoped one over the global fallback
/// (spec.md §4.11: "cached and consulted ... per-job first, then global fallback").
pub async fn lookup(pool: &SqlitePool, job_id: Option<Uuid>, field: &str, source_value: &str) -> ServerResult<Option<i64>> {
    if let Some(job_id) = job_id {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT concept_id FROM concept_approvals WHERE job_id = ? AND field = ? AND source_value = ?",
        )
        .bind(job_id.to_string())
        .bind(field)
        .bind(source_value)
        .fetch_optional(pool)
        .await?;

        if let Some((concept_id,)) = row {
            return Ok(Some(concept_id));
        }
    }

    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT concept_id FROM concept_approvals WHERE job_id IS NULL AND field = ? AND source_value = ?",
    )
    .bind(field)
    .bind(source_value)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(id,)| id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.expect("pool");
        sqlx::query(crate::catalog::schema::CREATE_TABLES).execute(&pool).await.expect("schema");
        pool
    }

    #[tokio::test]
    async fn job_scoped_approval_wins_over_global() {
        let pool = test_pool().await;
        let job_id = Uuid::new_v4();
        upsert(&pool, None, "diagnosis_code", "E11.9", 1).await.expect("global");
        upsert(&pool, Some(job_id), "diagnosis_code", "E11.9", 2).await.expect("job-scoped");

        let found = lookup(&pool, Some(job_id), "diagnosis_code", "E11.9").await.expect("lookup");
        assert_eq!(found, Some(2));
    }

    #[tokio::test]
    async fn falls_back_to_global_when_no_job_scoped_approval() {
        let pool = test_pool().await;
        let job_id = Uuid::new_v4();
        upsert(&pool, None, "diagnosis_code", "I10", 3).await.expect("global");

        let found = lookup(&pool, Some(job_id), "diagnosis_code", "I10").await.expect("lookup");
        assert_eq!(found, Some(3));
    }
}
