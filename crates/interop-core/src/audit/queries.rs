//! Database queries for audit logs

use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use super::models::{
    AuditEntry, AuditQuery, CreateAuditEntry, ResourceType, DEFAULT_AUDIT_QUERY_LIMIT,
    MAX_AUDIT_QUERY_LIMIT,
};
use crate::error::ServerResult;

/// Create a new audit log entry
///
/// Inserts a new audit record into the `audit_log` table and returns the
/// complete row with its generated id and timestamp.
pub async fn create_audit_entry(
    pool: &SqlitePool,
    entry: CreateAuditEntry,
) -> ServerResult<AuditEntry> {
    let id = Uuid::new_v4();
    let timestamp = chrono::Utc::now();

    sqlx::query(
        r#"
        INSERT INTO audit_log (
            id, user_id, action, resource_type, resource_id,
            changes, ip_address, user_agent, timestamp, metadata
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(entry.user_id)
    .bind(entry.action.as_str())
    .bind(entry.resource_type.as_str())
    .bind(&entry.resource_id)
    .bind(entry.changes.as_ref().map(serde_json::Value::to_string))
    .bind(&entry.ip_address)
    .bind(&entry.user_agent)
    .bind(timestamp)
    .bind(entry.metadata.as_ref().map(serde_json::Value::to_string))
    .execute(pool)
    .await?;

    let record = AuditEntry {
        id,
        user_id: entry.user_id,
        action: entry.action.as_str().to_string(),
        resource_type: entry.resource_type.as_str().to_string(),
        resource_id: entry.resource_id,
        changes: entry.changes,
        ip_address: entry.ip_address,
        user_agent: entry.user_agent,
        timestamp,
        metadata: entry.metadata,
    };

    debug!(
        audit_id = %record.id,
        action = %record.action,
        resource_type = %record.resource_type,
        "Created audit log entry"
    );

    Ok(record)
}

fn row_to_entry(row: AuditEntryRow) -> AuditEntry {
    AuditEntry {
        id: row.id,
        user_id: row.user_id,
        action: row.action,
        resource_type: row.resource_type,
        resource_id: row.resource_id,
        changes: row.changes.and_then(|s| serde_json::from_str(&s).ok()),
        ip_address: row.ip_address,
        user_agent: row.user_agent,
        timestamp: row.timestamp,
        metadata: row.metadata.and_then(|s| serde_json::from_str(&s).ok()),
    }
}

#[derive(sqlx::FromRow)]
struct AuditEntryRow {
    id: Uuid,
    user_id: Option<Uuid>,
    action: String,
    resource_type: String,
    resource_id: Option<String>,
    changes: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    timestamp: chrono::DateTime<chrono::Utc>,
    metadata: Option<String>,
}

/// Query audit logs with filters
///
/// Builds a dynamic query based on the provided filters and returns matching
/// audit log entries, newest first.
pub async fn query_audit_logs(pool: &SqlitePool, query: AuditQuery) -> ServerResult<Vec<AuditEntry>> {
    let limit = query.limit.min(MAX_AUDIT_QUERY_LIMIT);

    let mut sql = String::from(
        r#"
        SELECT
            id, user_id, action, resource_type, resource_id,
            changes, ip_address, user_agent, timestamp, metadata
        FROM audit_log
        WHERE 1=1
        "#,
    );

    if query.user_id.is_some() {
        sql.push_str(" AND user_id = ?");
    }
    if query.action.is_some() {
        sql.push_str(" AND action = ?");
    }
    if query.resource_type.is_some() {
        sql.push_str(" AND resource_type = ?");
    }
    if query.resource_id.is_some() {
        sql.push_str(" AND resource_id = ?");
    }
    if query.start_time.is_some() {
        sql.push_str(" AND timestamp >= ?");
    }
    if query.end_time.is_some() {
        sql.push_str(" AND timestamp <= ?");
    }

    sql.push_str(" ORDER BY timestamp DESC LIMIT ? OFFSET ?");

    let mut query_builder = sqlx::query_as::<_, AuditEntryRow>(&sql);

    if let Some(user_id) = query.user_id {
        query_builder = query_builder.bind(user_id);
    }
    if let Some(action) = query.action {
        query_builder = query_builder.bind(action.as_str());
    }
    if let Some(resource_type) = query.resource_type {
        query_builder = query_builder.bind(resource_type.as_str());
    }
    if let Some(resource_id) = query.resource_id {
        query_builder = query_builder.bind(resource_id);
    }
    if let Some(start_time) = query.start_time {
        query_builder = query_builder.bind(start_time);
    }
    if let Some(end_time) = query.end_time {
        query_builder = query_builder.bind(end_time);
    }

    query_builder = query_builder.bind(limit).bind(query.offset);

    let rows = query_builder.fetch_all(pool).await?;
    let records: Vec<AuditEntry> = rows.into_iter().map(row_to_entry).collect();

    debug!(count = records.len(), "Queried audit logs");

    Ok(records)
}

/// Get audit trail for a specific resource, newest first.
pub async fn get_audit_trail(
    pool: &SqlitePool,
    resource_type: ResourceType,
    resource_id: &str,
    limit: Option<i64>,
) -> ServerResult<Vec<AuditEntry>> {
    let limit = limit.unwrap_or(DEFAULT_AUDIT_QUERY_LIMIT).min(MAX_AUDIT_QUERY_LIMIT);

    let rows = sqlx::query_as::<_, AuditEntryRow>(
        r#"
        SELECT id, user_id, action, resource_type, resource_id,
               changes, ip_address, user_agent, timestamp, metadata
        FROM audit_log
        WHERE resource_type = ? AND resource_id = ?
        ORDER BY timestamp DESC
        LIMIT ?
        "#,
    )
    .bind(resource_type.as_str())
    .bind(resource_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let records: Vec<AuditEntry> = rows.into_iter().map(row_to_entry).collect();

    debug!(
        resource_type = %resource_type,
        resource_id,
        count = records.len(),
        "Retrieved audit trail"
    );

    Ok(records)
}

/// Get recent audit logs for a specific user, newest first.
pub async fn get_user_audit_logs(
    pool: &SqlitePool,
    user_id: Uuid,
    limit: Option<i64>,
) -> ServerResult<Vec<AuditEntry>> {
    let limit = limit.unwrap_or(DEFAULT_AUDIT_QUERY_LIMIT).min(MAX_AUDIT_QUERY_LIMIT);

    let rows = sqlx::query_as::<_, AuditEntryRow>(
        r#"
        SELECT id, user_id, action, resource_type, resource_id,
               changes, ip_address, user_agent, timestamp, metadata
        FROM audit_log
        WHERE user_id = ?
        ORDER BY timestamp DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let records: Vec<AuditEntry> = rows.into_iter().map(row_to_entry).collect();

    debug!(
        user_id = %user_id,
        count = records.len(),
        "Retrieved user audit logs"
    );

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::models::AuditAction;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite pool");

        sqlx::query(
            r#"
            CREATE TABLE audit_log (
                id TEXT PRIMARY KEY,
                user_id TEXT,
                action TEXT NOT NULL,
                resource_type TEXT NOT NULL,
                resource_id TEXT,
                changes TEXT,
                ip_address TEXT,
                user_agent TEXT,
                timestamp TEXT NOT NULL,
                metadata TEXT
            )
            "#,
        )
        .execute(&pool)
        .await
        .expect("create audit_log table");

        pool
    }

    #[tokio::test]
    async fn test_create_audit_entry() {
        let pool = test_pool().await;

        let entry = CreateAuditEntry {
            user_id: Some(Uuid::new_v4()),
            action: AuditAction::Create,
            resource_type: ResourceType::MappingJob,
            resource_id: Some("job-1".to_string()),
            changes: Some(json!({"name": "Test Mapping"})),
            metadata: None,
            ip_address: Some("127.0.0.1".to_string()),
            user_agent: Some("Test Agent".to_string()),
        };

        let result = create_audit_entry(&pool, entry).await.unwrap();

        assert_eq!(result.action, "create");
        assert_eq!(result.resource_type, "mapping_job");
    }

    #[tokio::test]
    async fn test_query_audit_logs_filters_by_resource_type() {
        let pool = test_pool().await;

        for i in 0..5 {
            let entry = CreateAuditEntry {
                user_id: Some(Uuid::new_v4()),
                action: AuditAction::Create,
                resource_type: ResourceType::IngestionJob,
                resource_id: Some(format!("job-{i}")),
                changes: Some(json!({"index": i})),
                metadata: None,
                ip_address: None,
                user_agent: None,
            };
            create_audit_entry(&pool, entry).await.unwrap();
        }

        let results = query_audit_logs(&pool, AuditQuery::default()).await.unwrap();
        assert!(results.len() >= 5);

        let query = AuditQuery {
            resource_type: Some(ResourceType::IngestionJob),
            ..Default::default()
        };
        let results = query_audit_logs(&pool, query).await.unwrap();
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.resource_type == "ingestion_job"));
    }

    #[tokio::test]
    async fn test_get_audit_trail_scopes_to_one_resource() {
        let pool = test_pool().await;
        let resource_id = "shared-resource";

        for _ in 0..3 {
            let entry = CreateAuditEntry {
                user_id: Some(Uuid::new_v4()),
                action: AuditAction::Update,
                resource_type: ResourceType::MappingJob,
                resource_id: Some(resource_id.to_string()),
                changes: Some(json!({"updated": true})),
                metadata: None,
                ip_address: None,
                user_agent: None,
            };
            create_audit_entry(&pool, entry).await.unwrap();
        }

        let trail = get_audit_trail(&pool, ResourceType::MappingJob, resource_id, None)
            .await
            .unwrap();

        assert_eq!(trail.len(), 3);
        assert!(trail.iter().all(|r| r.resource_id.as_deref() == Some(resource_id)));
    }

    #[tokio::test]
    async fn test_get_user_audit_logs_scopes_to_one_user() {
        let pool = test_pool().await;
        let user_id = Uuid::new_v4();

        for _ in 0..4 {
            let entry = CreateAuditEntry {
                user_id: Some(user_id),
                action: AuditAction::Read,
                resource_type: ResourceType::MappingJob,
                resource_id: Some(Uuid::new_v4().to_string()),
                changes: None,
                metadata: None,
                ip_address: None,
                user_agent: None,
            };
            create_audit_entry(&pool, entry).await.unwrap();
        }

        let logs = get_user_audit_logs(&pool, user_id, None).await.unwrap();

        assert_eq!(logs.len(), 4);
        assert!(logs.iter().all(|r| r.user_id == Some(user_id)));
    }
}
