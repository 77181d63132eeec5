//! healthbridge interop-core
#![recursion_limit = "256"]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::manual_div_ceil)]
#![allow(clippy::redundant_closure)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::unnecessary_map_or)]
#![allow(clippy::useless_format)]
#![allow(clippy::should_implement_trait)]
#![allow(clippy::new_without_default)]
#![allow(clippy::impl_trait_in_params)]
#![allow(clippy::unnecessary_lazy_evaluations)]
#![allow(clippy::redundant_field_names)]
#![allow(clippy::needless_borrow)]
#![allow(clippy::manual_clamp)]
#![allow(clippy::map_clone)]
#![allow(clippy::option_map_or_none)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::get_first)]
#![allow(clippy::host_endian_bytes)]
#![allow(clippy::io_other_error)]
#![allow(clippy::type_complexity)]
//!
//! Core engine for a healthcare data interoperability pipeline: ingest
//! tabular/HL7-derived rows, map them to FHIR R4 under human-reviewed field
//! mappings, and project approved FHIR resources into the OMOP Common Data
//! Model with terminology normalization.
//!
//! # Architecture
//!
//! Three cooperating subsystems, plus the storage/catalog layers they share:
//!
//! - **Mapping Engine**: schema inference ([`schema_inferencer`]),
//!   AI-assisted field mapping and resource-type prediction ([`mapping`]),
//!   and the human-in-the-loop [`mapping::workflow`] state machine.
//! - **Ingestion Engine** ([`ingestion`]): a job supervisor driving
//!   source -> [`transform`] -> destination pipelines concurrently, with a
//!   dead-letter queue and durable per-job metrics.
//! - **OMOP Engine** ([`omop`]): deterministic FHIR -> OMOP row generation
//!   with pluggable concept normalization against the [`vocabulary`] service.
//!
//! Durable state lives in the [`catalog`] (sqlite: mapping jobs, ingestion
//! jobs, concept approvals, audit log) and the [`record_store`] (MongoDB:
//! staging, FHIR, and OMOP documents). [`id_service`] derives stable
//! `person_id` / `visit_occurrence_id` values from natural keys. [`domain`]
//! holds the shared aggregate and value types; [`features`] exposes the
//! engine over a thin `/api/v1` RPC surface (spec.md §6 — the full HTTP API
//! and auth layer are an external collaborator, specified only where the
//! core touches them).

pub mod audit;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod features;
pub mod id_service;
pub mod ingestion;
pub mod mapping;
pub mod middleware;
pub mod omop;
pub mod record_store;
pub mod schema_inferencer;
pub mod transform;
pub mod vocabulary;

// Re-export commonly used types
pub use error::{AppError, ErrorKind, ServerResult};
