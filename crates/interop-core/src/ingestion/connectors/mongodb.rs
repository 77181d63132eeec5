//! MongoDB source/destination connectors (spec.md §6): source yields by a
//! stable cursor over matching documents; destination is validated for
//! reachability only (writes route through the Record Store, see
//! `DestinationConnector`'s doc comment).

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Cursor};
use serde_json::Value;
use std::time::Duration;

use crate::error::{AppError, ServerResult};

use super::{DestinationConnector, SourceConnector};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MongoSourceConnector {
    uri: String,
    db: String,
    collection: String,
    query: Document,
    cursor: Option<Cursor<Document>>,
}

impl MongoSourceConnector {
    pub fn new(uri: &str, db: &str, collection: &str, query: Option<Value>) -> Self {
        let query = query
            .and_then(|v| mongodb::bson::to_document(&v).ok())
            .unwrap_or_default();
        Self { uri: uri.to_string(), db: db.to_string(), collection: collection.to_string(), query, cursor: None }
    }

    async fn connect(&self) -> ServerResult<Client> {
        let mut options = ClientOptions::parse(&self.uri).await.map_err(|e| AppError::SourceRead(e.to_string()))?;
        options.connect_timeout = Some(CONNECT_TIMEOUT);
        options.server_selection_timeout = Some(CONNECT_TIMEOUT);
        Client::with_options(options).map_err(|e| AppError::SourceRead(e.to_string()))
    }
}

#[async_trait]
impl SourceConnector for MongoSourceConnector {
    async fn validate(&self) -> ServerResult<()> {
        let client = self.connect().await?;
        tokio::time::timeout(CONNECT_TIMEOUT, client.database(&self.db).list_collection_names())
            .await
            .map_err(|_| AppError::Timeout("mongodb source validation timed out".to_string()))?
            .map_err(|e| AppError::SourceRead(e.to_string()))?;
        Ok(())
    }

    async fn next_record(&mut self) -> ServerResult<Option<Value>> {
        if self.cursor.is_none() {
            let client = self.connect().await?;
            let collection = client.database(&self.db).collection::<Document>(&self.collection);
            let cursor = collection
                .find(self.query.clone())
                .await
                .map_err(|e| AppError::SourceRead(e.to_string()))?;
            self.cursor = Some(cursor);
        }

        use futures::TryStreamExt;
        let cursor = self.cursor.as_mut().expect("just initialized");
        match cursor.try_next().await.map_err(|e| AppError::SourceRead(e.to_string()))? {
            Some(doc) => {
                // The cursor itself is healthy; a single document failing to
                // convert to JSON is a per-record parse failure, not a
                // source-level read failure (spec.md §4.10 step 6).
                let value = mongodb::bson::from_document(doc).map_err(|e| AppError::ParseRecord(e.to_string()))?;
                Ok(Some(value))
            },
            None => Ok(None),
        }
    }
}

pub struct MongoDestinationConnector {
    uri: String,
    db: String,
}

impl MongoDestinationConnector {
    pub fn new(uri: &str, db: &str) -> Self {
        Self { uri: uri.to_string(), db: db.to_string() }
    }
}

#[async_trait]
impl DestinationConnector for MongoDestinationConnector {
    async fn validate(&self) -> ServerResult<()> {
        let mut options = ClientOptions::parse(&self.uri).await.map_err(|e| AppError::DestinationWrite(e.to_string()))?;
        options.connect_timeout = Some(CONNECT_TIMEOUT);
        options.server_selection_timeout = Some(CONNECT_TIMEOUT);
        let client = Client::with_options(options).map_err(|e| AppError::DestinationWrite(e.to_string()))?;

        tokio::time::timeout(CONNECT_TIMEOUT, client.database(&self.db).list_collection_names())
            .await
            .map_err(|_| AppError::Timeout("mongodb destination validation timed out".to_string()))?
            .map_err(|e| AppError::DestinationWrite(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_source_with_empty_query_by_default() {
        let connector = MongoSourceConnector::new("mongodb://localhost", "healthbridge", "staging", None);
        assert_eq!(connector.query, Document::new());
    }

    #[test]
    fn constructs_source_with_provided_query() {
        let query = serde_json::json!({"status": "active"});
        let connector = MongoSourceConnector::new("mongodb://localhost", "healthbridge", "staging", Some(query));
        assert_eq!(connector.query, doc! { "status": "active" });
    }
}
