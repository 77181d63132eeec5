//! Job Catalog (C2): durable store of mapping-job and ingestion-job state,
//! surviving process restarts (spec.md §4.2).
//!
//! Backed by a single embedded sqlite file rather than a server-mode
//! database — the catalog's durable state (job definitions, config,
//! metrics, caches) is small enough that a server round-trip would be pure
//! overhead.

pub mod concept_approvals;
pub mod ingestion_jobs;
pub mod mapping_jobs;
pub mod person_id_cache;
pub mod schema;

use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::config::CatalogConfig;
use crate::error::ServerResult;

/// Thin handle around the sqlite pool. Cloned freely (an `Arc` internally
/// via `sqlx::Pool`), shared across the RPC surface and the Ingestion
/// Engine's workers.
#[derive(Clone)]
pub struct JobCatalog {
    pool: SqlitePool,
}

impl JobCatalog {
    /// Opens (creating if absent) the catalog database at `config.path` and
    /// ensures the schema exists.
    pub async fn connect(config: &CatalogConfig) -> ServerResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect_with(options)
            .await?;

        sqlx::query(schema::CREATE_TABLES).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Builds a catalog over an arbitrary pool (used by tests and by the
    /// in-memory `sqlite::memory:` DSN).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
