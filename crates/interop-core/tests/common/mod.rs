//! Test container helpers for `interop-core` integration tests.
//!
//! Mirrors the teacher's `TestPostgres`/`TestEnvironment` wrappers: a small
//! typed handle around a `testcontainers` container plus a ready-to-use
//! client, so a test can start its own isolated backing service without
//! reaching into process-wide state.

use anyhow::{Context, Result};
use interop_core::catalog::schema::CREATE_TABLES;
use interop_core::config::RecordStoreConfig;
use interop_core::record_store::RecordStore;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::mongo::Mongo;

/// A MongoDB test container wired up for the Record Store.
///
/// # Example
///
/// ```no_run
/// mod common;
/// use common::TestMongo;
///
/// #[tokio::test]
/// async fn test_with_record_store() {
///     let mongo = TestMongo::start().await.unwrap();
///     let store = mongo.record_store().await.unwrap();
/// }
/// ```
pub struct TestMongo {
    _container: ContainerAsync<Mongo>,
    host: String,
    port: u16,
}

impl TestMongo {
    pub async fn start() -> Result<Self> {
        let container = Mongo::default().start().await.context("failed to start MongoDB container")?;
        let host = container.get_host().await.context("failed to get MongoDB host")?;
        let port = container.get_host_port_ipv4(27017.tcp()).await.context("failed to get MongoDB port")?;
        Ok(Self { _container: container, host: host.to_string(), port })
    }

    pub async fn record_store(&self) -> Result<RecordStore> {
        let config = RecordStoreConfig { host: self.host.clone(), port: self.port, database: "healthbridge_test".to_string() };
        RecordStore::connect(&config).await.context("failed to connect Record Store to test MongoDB")
    }

    /// `mongodb://` URI pointing at this container's mapped port, for a
    /// connector config that needs to validate reachability itself.
    pub async fn uri(&self) -> String {
        format!("mongodb://{}:{}", self.host, self.port)
    }
}

/// An in-memory sqlite pool with the Job Catalog schema already applied.
pub async fn test_catalog() -> SqlitePool {
    let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.expect("in-memory sqlite pool");
    sqlx::query(CREATE_TABLES).execute(&pool).await.expect("schema init");
    pool
}

/// Writes a CSV fixture under `dir` and returns its path.
pub fn write_csv(dir: &std::path::Path, name: &str, body: &str) -> String {
    use std::io::Write;
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("create csv fixture");
    file.write_all(body.as_bytes()).expect("write csv fixture");
    path.to_string_lossy().to_string()
}
