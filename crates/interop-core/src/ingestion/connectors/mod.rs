//! Source/destination connector traits and the `ConnectorRef` factory
//! (spec.md §6's source-/destination-connector contracts).

pub mod csv;
pub mod mongodb;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::ConnectorRef;
use crate::error::{AppError, ServerResult};

/// Yields a lazy, finite, non-restartable sequence of records (spec.md §6).
#[async_trait]
pub trait SourceConnector: Send {
    /// Pre-flight reachability/readability check, called once before a job
    /// transitions to RUNNING.
    async fn validate(&self) -> ServerResult<()>;

    /// Pulls the next record, or `None` at end of stream.
    async fn next_record(&mut self) -> ServerResult<Option<Value>>;
}

/// Destination reachability contract. Writes themselves always go through
/// the shared Record Store's `upsert*` methods (spec.md §4.10 step 4,
/// §6: "must tolerate repeated ingest ids idempotently via Record Store's
/// upsert* semantics") — this trait exists purely so `start()` can validate
/// the configured destination before a worker starts consuming records.
#[async_trait]
pub trait DestinationConnector: Send + Sync {
    async fn validate(&self) -> ServerResult<()>;
}

/// Builds a `SourceConnector` for the configured connector kind.
pub fn build_source(connector: &ConnectorRef) -> ServerResult<Box<dyn SourceConnector>> {
    match connector {
        ConnectorRef::CsvFile { path } => Ok(Box::new(csv::CsvSourceConnector::new(path))),
        ConnectorRef::Mongodb { uri, db, collection, query } => {
            Ok(Box::new(mongodb::MongoSourceConnector::new(uri, db, collection, query.clone())))
        },
        other => Err(AppError::Validation(format!("unsupported source connector kind: {}", other.kind()))),
    }
}

/// Builds a `DestinationConnector` for the configured connector kind. Only
/// `mongodb` is a valid ingestion destination (spec.md §6).
pub fn build_destination(connector: &ConnectorRef) -> ServerResult<Box<dyn DestinationConnector>> {
    match connector {
        ConnectorRef::Mongodb { uri, db, .. } => Ok(Box::new(mongodb::MongoDestinationConnector::new(uri, db))),
        other => Err(AppError::Validation(format!("unsupported destination connector kind: {}", other.kind()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_source_rejects_unsupported_kind() {
        let connector = ConnectorRef::JsonApi { url: "https://example.test/feed".into() };
        assert!(build_source(&connector).is_err());
    }

    #[test]
    fn build_destination_rejects_non_mongo_kind() {
        let connector = ConnectorRef::CsvFile { path: "out.csv".into() };
        assert!(build_destination(&connector).is_err());
    }
}
