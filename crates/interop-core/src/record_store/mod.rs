//! Record Store (C1): staging, DLQ, FHIR, and OMOP document collections
//! (spec.md §4.1).
//!
//! Backed by the official `mongodb` driver, the way `bdp-server`'s
//! `storage` module wraps `aws-sdk-s3` behind a small typed API — here the
//! wrapper is a document store instead of a blob store, but the shape
//! (config struct, typed methods, bounded timeouts) is the same.

use std::time::Duration;

use futures::TryStreamExt;
use mongodb::bson::{self, doc, Document};
use mongodb::options::{ClientOptions, FindOptions, ReplaceOptions};
use mongodb::{Client, Database};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::config::RecordStoreConfig;
use crate::domain::{DlqRecord, FhirResource, OmopRow, StagingRecord};
use crate::error::{AppError, ServerResult};

/// Per-operation timeout enforced on every Record Store call (spec.md §4.1:
/// "10 s operation").
const OPERATION_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct RecordStore {
    db: Database,
}

impl RecordStore {
    pub async fn connect(config: &RecordStoreConfig) -> ServerResult<Self> {
        let mut options = ClientOptions::parse(config.connection_uri()).await?;
        options.connect_timeout = Some(CONNECT_TIMEOUT);
        options.server_selection_timeout = Some(CONNECT_TIMEOUT);

        let client = Client::with_options(options)?;
        let db = client.database(&config.database);

        Ok(Self { db })
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    async fn timed<T>(fut: impl std::future::Future<Output = mongodb::error::Result<T>>) -> ServerResult<T> {
        match tokio::time::timeout(OPERATION_TIMEOUT, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AppError::Timeout("record store operation exceeded 10s".into())),
        }
    }

    /// Upserts a raw accepted row into `staging`.
    pub async fn upsert_staging(&self, record: &StagingRecord) -> ServerResult<()> {
        let filter = doc! {
            "job_id": record.job_id.to_string(),
            "payload": bson::to_bson(&record.payload).map_err(|e| AppError::Internal(e.to_string()))?,
        };
        self.upsert_one("staging", filter, record).await
    }

    /// Appends a failed record to the append-only staging DLQ.
    pub async fn upsert_dlq(&self, record: &DlqRecord) -> ServerResult<()> {
        let collection = self.db.collection::<Document>("staging_dlq");
        let doc = bson::to_document(record).map_err(|e| AppError::Internal(e.to_string()))?;
        Self::timed(collection.insert_one(doc)).await?;
        Ok(())
    }

    /// Idempotent upsert on the FHIR resource's deterministic `id`
    /// (spec.md §3 FHIRResource invariant; §8 round-trip law).
    pub async fn upsert_fhir(&self, resource: &FhirResource) -> ServerResult<()> {
        let collection_name = format!("fhir_{}", resource.resource_type);
        let filter = doc! { "id": &resource.id };
        self.upsert_one(&collection_name, filter, resource).await
    }

    /// Idempotent upsert for an OMOP row, keyed by `(_table, person_id)` for
    /// PERSON and `(_table, person_id, source_value, start_date)` for event
    /// tables (spec.md §4.11 Persistence).
    pub async fn upsert_omop(&self, row: &OmopRow, event_key: Option<(&str, &str)>) -> ServerResult<()> {
        let collection_name = format!("omop_{}", row.table);
        let mut filter = doc! { "_table": &row.table, "person_id": row.person_id };
        if let Some((source_value, start_date)) = event_key {
            filter.insert("fields.source_value", source_value);
            filter.insert("fields.start_date", start_date);
        }
        self.upsert_one(&collection_name, filter, row).await
    }

    async fn upsert_one<T: Serialize>(&self, collection_name: &str, filter: Document, value: &T) -> ServerResult<()> {
        let collection = self.db.collection::<Document>(collection_name);
        let doc = bson::to_document(value).map_err(|e| AppError::Internal(e.to_string()))?;
        let options = ReplaceOptions::builder().upsert(true).build();
        Self::timed(collection.replace_one(filter, doc).with_options(options)).await?;
        Ok(())
    }

    pub async fn count_by_job(&self, collection: &str, job_id: Uuid) -> ServerResult<u64> {
        let collection = self.db.collection::<Document>(collection);
        let count = Self::timed(collection.count_documents(doc! { "job_id": job_id.to_string() })).await?;
        Ok(count)
    }

    pub async fn list_by_job<T: DeserializeOwned + Unpin + Send + Sync>(
        &self,
        collection: &str,
        job_id: Uuid,
        limit: i64,
        skip: u64,
    ) -> ServerResult<Vec<T>> {
        let collection = self.db.collection::<Document>(collection);
        let options = FindOptions::builder().limit(limit).skip(skip).build();
        let mut cursor = Self::timed(collection.find(doc! { "job_id": job_id.to_string() }).with_options(options)).await?;

        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            let item: T = bson::from_document(doc).map_err(|e| AppError::Internal(e.to_string()))?;
            out.push(item);
        }
        Ok(out)
    }

    /// Lists the distinct `fhir_<ResourceType>` collections currently in use.
    pub async fn list_resource_types(&self) -> ServerResult<Vec<String>> {
        let names = Self::timed(self.db.list_collection_names()).await?;
        Ok(names
            .into_iter()
            .filter_map(|name| name.strip_prefix("fhir_").map(str::to_string))
            .collect())
    }

    /// Fetches the single most-recently-persisted FHIR document of a given
    /// resource type across all jobs, used by OMOP normalization's
    /// data-source priority fallback (spec.md §4.11).
    pub async fn most_recent_fhir(&self, resource_type: &str) -> ServerResult<Option<FhirResource>> {
        let collection = self.db.collection::<Document>(format!("fhir_{resource_type}"));
        let options = FindOptions::builder()
            .sort(doc! { "persisted_at": -1 })
            .limit(1)
            .build();
        let mut cursor = Self::timed(collection.find(doc! {}).with_options(options)).await?;
        match cursor.try_next().await? {
            Some(doc) => Ok(Some(bson::from_document(doc).map_err(|e| AppError::Internal(e.to_string()))?)),
            None => Ok(None),
        }
    }

    pub async fn list_fhir_by_job(&self, resource_type: &str, job_id: Uuid, limit: i64) -> ServerResult<Vec<FhirResource>> {
        self.list_by_job(&format!("fhir_{resource_type}"), job_id, limit, 0).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_timeout_matches_spec_bound() {
        assert_eq!(OPERATION_TIMEOUT, Duration::from_secs(10));
        assert_eq!(CONNECT_TIMEOUT, Duration::from_secs(5));
    }
}
