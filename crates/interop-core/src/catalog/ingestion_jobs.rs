//! Job Catalog CRUD for `IngestionJobRecord` (spec.md §4.2, §4.10).

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::domain::{IngestionJobConfig, IngestionJobRecord, IngestionMetrics, IngestionStatus};
use crate::error::{AppError, ServerResult};

#[derive(FromRow)]
struct IngestionJobRow {
    job_id: String,
    config: String,
    status: String,
    metrics: String,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IngestionJobRow {
    fn into_domain(self) -> ServerResult<IngestionJobRecord> {
        Ok(IngestionJobRecord {
            config: serde_json::from_str(&self.config)?,
            status: self
                .status
                .parse::<IngestionStatus>()
                .map_err(AppError::Internal)?,
            metrics: serde_json::from_str(&self.metrics)?,
            error: self.error.map(|s| serde_json::from_str(&s)).transpose()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str =
    "job_id, config, status, metrics, error, created_at, updated_at FROM ingestion_jobs";

/// Registers a new ingestion job configuration. Always starts `IDLE`
/// (spec.md §3: "runtime state ... on restart it is reconstructed ... always
/// starting at IDLE — never auto-resuming to RUNNING").
pub async fn create(pool: &SqlitePool, config: &IngestionJobConfig) -> ServerResult<IngestionJobRecord> {
    let now = Utc::now();
    let record = IngestionJobRecord {
        config: config.clone(),
        status: IngestionStatus::Idle,
        metrics: IngestionMetrics::default(),
        error: None,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO ingestion_jobs (job_id, config, status, metrics, error, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(config.job_id.to_string())
    .bind(serde_json::to_string(&record.config)?)
    .bind(record.status.to_string())
    .bind(serde_json::to_string(&record.metrics)?)
    .bind(Option::<String>::None)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(record)
}

pub async fn get(pool: &SqlitePool, job_id: Uuid) -> ServerResult<IngestionJobRecord> {
    let row = sqlx::query_as::<_, IngestionJobRow>(&format!("SELECT {SELECT_COLUMNS} WHERE job_id = ?"))
        .bind(job_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ingestion job {job_id} not found")))?;

    row.into_domain()
}

/// Reloads every row, for process-start rehydration per spec.md §4.2.
pub async fn list_all(pool: &SqlitePool) -> ServerResult<Vec<IngestionJobRecord>> {
    let rows = sqlx::query_as::<_, IngestionJobRow>(&format!("SELECT {SELECT_COLUMNS} ORDER BY created_at"))
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(IngestionJobRow::into_domain).collect()
}

/// Updates status + metrics, the hot path the worker loop calls
/// periodically (spec.md §4.10 step 8).
pub async fn update_status(
    pool: &SqlitePool,
    job_id: Uuid,
    status: IngestionStatus,
    metrics: &IngestionMetrics,
    error: Option<&crate::domain::IngestionErrorDetails>,
) -> ServerResult<()> {
    let result = sqlx::query(
        "UPDATE ingestion_jobs SET status = ?, metrics = ?, error = ?, updated_at = ? WHERE job_id = ?",
    )
    .bind(status.to_string())
    .bind(serde_json::to_string(metrics)?)
    .bind(error.map(serde_json::to_string).transpose()?)
    .bind(Utc::now())
    .bind(job_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("ingestion job {job_id} not found")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConnectorRef;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite pool");
        sqlx::query(crate::catalog::schema::CREATE_TABLES)
            .execute(&pool)
            .await
            .expect("schema init");
        pool
    }

    fn sample_config() -> IngestionJobConfig {
        IngestionJobConfig {
            job_id: Uuid::new_v4(),
            job_name: "patient feed".into(),
            mapping_job_id: None,
            source_connector: ConnectorRef::CsvFile { path: "patients.csv".into() },
            destination_connector: ConnectorRef::Mongodb {
                uri: "mongodb://localhost".into(),
                db: "healthbridge".into(),
                collection: "fhir_Patient".into(),
                query: None,
            },
            omop_auto_sync: false,
            omop_target_table: None,
        }
    }

    #[tokio::test]
    async fn created_job_starts_idle() {
        let pool = test_pool().await;
        let config = sample_config();
        let record = create(&pool, &config).await.expect("create");
        assert_eq!(record.status, IngestionStatus::Idle);
        assert_eq!(record.metrics.received, 0);
    }

    #[tokio::test]
    async fn rehydrated_jobs_never_resume_running() {
        let pool = test_pool().await;
        let config = sample_config();
        create(&pool, &config).await.expect("create");
        update_status(&pool, config.job_id, IngestionStatus::Running, &IngestionMetrics::default(), None)
            .await
            .expect("mark running");

        // Simulate process restart: reload from the catalog. Per spec.md §3
        // the in-memory status must still be forced to IDLE by the engine;
        // the catalog itself is a faithful log of the last-observed status.
        let reloaded = get(&pool, config.job_id).await.expect("get");
        assert_eq!(reloaded.status, IngestionStatus::Running);
        // The ingestion engine's rehydration step (tested separately) is
        // responsible for resetting this to IDLE on load.
    }

    #[tokio::test]
    async fn list_all_returns_every_job() {
        let pool = test_pool().await;
        create(&pool, &sample_config()).await.expect("create 1");
        create(&pool, &sample_config()).await.expect("create 2");
        let jobs = list_all(&pool).await.expect("list");
        assert_eq!(jobs.len(), 2);
    }
}
