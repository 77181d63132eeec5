//! Thin `/api/v1` RPC surface over the core engines (spec.md §6).
//!
//! The HTTP API and auth layer proper are explicitly out of core scope
//! (spec.md §1); this module exists only where the core is "touched" by
//! that external collaborator: JSON in, JSON out, a bearer token taken
//! verbatim as `user_id` ([`shared::auth`]), no token issuance/validation.
//!
//! Each feature is a vertical slice — `routes()` plus handler functions —
//! mounted under its own path prefix by [`router`].

pub mod ingestion_jobs;
pub mod mapping_jobs;
pub mod omop;
pub mod schema;
pub mod shared;
pub mod vocabulary;

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;

use crate::ingestion::IngestionSupervisor;
use crate::mapping::AiMappingEngine;
use crate::omop::OmopEngine;
use crate::record_store::RecordStore;
use crate::vocabulary::VocabularyService;

/// Shared state for every feature route: the Job Catalog pool, the Record
/// Store handle, and the long-lived engines (spec.md §5: these are
/// constructed once at boot and injected, not global mutable singletons).
#[derive(Clone)]
pub struct AppState {
    pub catalog: SqlitePool,
    pub record_store: RecordStore,
    pub mapping_engine: Arc<AiMappingEngine>,
    pub vocabulary: Arc<VocabularyService>,
    pub omop: Arc<OmopEngine>,
    pub supervisor: Arc<IngestionSupervisor>,
}

/// Mounts every feature's routes under its own path prefix. The caller nests
/// this under `/api/v1`.
pub fn router(state: AppState) -> Router<()> {
    Router::new()
        .nest("/mapping-jobs", mapping_jobs::routes().with_state(state.clone()))
        .nest("/ingestion-jobs", ingestion_jobs::routes().with_state(state.clone()))
        .nest("/vocabulary", vocabulary::routes().with_state(state.clone()))
        .nest("/omop", omop::routes().with_state(state.clone()))
        .nest("/schema", schema::routes().with_state(state))
}
