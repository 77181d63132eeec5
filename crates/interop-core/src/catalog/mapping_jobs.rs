//! Job Catalog CRUD for `MappingJob` (spec.md §4.2).

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::domain::{MappingJob, MappingStatus};
use crate::error::{AppError, ServerResult};

#[derive(FromRow)]
struct MappingJobRow {
    job_id: String,
    user_id: String,
    name: String,
    source_schema: String,
    target_schema: String,
    ai_mappings: String,
    approved_mappings: String,
    status: String,
    target_resource_type: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MappingJobRow {
    fn into_domain(self) -> ServerResult<MappingJob> {
        Ok(MappingJob {
            job_id: Uuid::parse_str(&self.job_id)
                .map_err(|e| AppError::Internal(format!("corrupt job_id in catalog: {e}")))?,
            user_id: self.user_id,
            name: self.name,
            source_schema: serde_json::from_str(&self.source_schema)?,
            target_schema: serde_json::from_str(&self.target_schema)?,
            ai_mappings: serde_json::from_str(&self.ai_mappings)?,
            approved_mappings: serde_json::from_str(&self.approved_mappings)?,
            status: self
                .status
                .parse::<MappingStatus>()
                .map_err(AppError::Internal)?,
            target_resource_type: self.target_resource_type,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Inserts a brand-new DRAFT mapping job.
pub async fn create(pool: &SqlitePool, job: &MappingJob) -> ServerResult<()> {
    sqlx::query(
        r#"
        INSERT INTO mapping_jobs
            (job_id, user_id, name, source_schema, target_schema,
             ai_mappings, approved_mappings, status, target_resource_type, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(job.job_id.to_string())
    .bind(&job.user_id)
    .bind(&job.name)
    .bind(serde_json::to_string(&job.source_schema)?)
    .bind(serde_json::to_string(&job.target_schema)?)
    .bind(serde_json::to_string(&job.ai_mappings)?)
    .bind(serde_json::to_string(&job.approved_mappings)?)
    .bind(job.status.to_string())
    .bind(&job.target_resource_type)
    .bind(job.created_at)
    .bind(job.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persists the whole aggregate, overwriting the stored row. Used after
/// `analyze`, `addManualMapping`, and `approveMappings` mutate the job.
pub async fn update(pool: &SqlitePool, job: &MappingJob) -> ServerResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE mapping_jobs SET
            ai_mappings = ?, approved_mappings = ?, status = ?, target_resource_type = ?, updated_at = ?
        WHERE job_id = ?
        "#,
    )
    .bind(serde_json::to_string(&job.ai_mappings)?)
    .bind(serde_json::to_string(&job.approved_mappings)?)
    .bind(job.status.to_string())
    .bind(&job.target_resource_type)
    .bind(job.updated_at)
    .bind(job.job_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("mapping job {} not found", job.job_id)));
    }

    Ok(())
}

pub async fn get(pool: &SqlitePool, job_id: Uuid) -> ServerResult<MappingJob> {
    let row = sqlx::query_as::<_, MappingJobRow>(
        "SELECT job_id, user_id, name, source_schema, target_schema, ai_mappings, \
         approved_mappings, status, target_resource_type, created_at, updated_at FROM mapping_jobs WHERE job_id = ?",
    )
    .bind(job_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("mapping job {job_id} not found")))?;

    row.into_domain()
}

pub async fn list(pool: &SqlitePool, user_id: Option<&str>, limit: i64, offset: i64) -> ServerResult<Vec<MappingJob>> {
    let rows = if let Some(user_id) = user_id {
        sqlx::query_as::<_, MappingJobRow>(
            "SELECT job_id, user_id, name, source_schema, target_schema, ai_mappings, \
             approved_mappings, status, target_resource_type, created_at, updated_at FROM mapping_jobs \
             WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, MappingJobRow>(
            "SELECT job_id, user_id, name, source_schema, target_schema, ai_mappings, \
             approved_mappings, status, target_resource_type, created_at, updated_at FROM mapping_jobs \
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?
    };

    rows.into_iter().map(MappingJobRow::into_domain).collect()
}
