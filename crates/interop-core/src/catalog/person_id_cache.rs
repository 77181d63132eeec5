//! Persistent key->id cache backing the Deterministic ID Service (spec.md §4.4).

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::ServerResult;

/// Looks up a cached id for a normalized natural key within a namespace
/// (`"person"` or `"visit"`), refreshing `last_seen` on hit.
pub async fn lookup(pool: &SqlitePool, namespace: &str, natural_key: &str) -> ServerResult<Option<i64>> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT id FROM person_id_cache WHERE namespace = ? AND natural_key = ?",
    )
    .bind(namespace)
    .bind(natural_key)
    .fetch_optional(pool)
    .await?;

    let Some((id_str,)) = row else { return Ok(None) };

    sqlx::query("UPDATE person_id_cache SET last_seen = ? WHERE namespace = ? AND natural_key = ?")
        .bind(Utc::now())
        .bind(namespace)
        .bind(natural_key)
        .execute(pool)
        .await?;

    Ok(id_str.parse::<i64>().ok())
}

/// Inserts a freshly-derived id. Idempotent: a concurrent insert of the same
/// key is ignored so the first writer wins (matches "total, deterministic"
/// per spec.md §4.4 — any racing writer would compute the same `id` anyway).
pub async fn insert(pool: &SqlitePool, namespace: &str, natural_key: &str, id: i64) -> ServerResult<()> {
    let now = Utc::now();
    sqlx::query(
        "INSERT OR IGNORE INTO person_id_cache (namespace, natural_key, id, created_at, last_seen) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(namespace)
    .bind(natural_key)
    .bind(id.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
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
    async fn insert_then_lookup_round_trips() {
        let pool = test_pool().await;
        insert(&pool, "person", "mrn:123", 100000000000001).await.expect("insert");
        let found = lookup(&pool, "person", "mrn:123").await.expect("lookup");
        assert_eq!(found, Some(100000000000001));
    }

    #[tokio::test]
    async fn lookup_miss_returns_none() {
        let pool = test_pool().await;
        assert_eq!(lookup(&pool, "person", "mrn:nope").await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn person_and_visit_namespaces_are_isolated() {
        let pool = test_pool().await;
        insert(&pool, "person", "k", 1).await.expect("insert person");
        insert(&pool, "visit", "k", 2).await.expect("insert visit");
        assert_eq!(lookup(&pool, "person", "k").await.expect("lookup"), Some(1));
        assert_eq!(lookup(&pool, "visit", "k").await.expect("lookup"), Some(2));
    }
}
