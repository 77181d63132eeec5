//! Audit middleware re-exports
//!
//! This module re-exports the audit middleware from the audit module.
//! The actual implementation is in `crate::audit::middleware`.
//!
//! # Usage
//!
//! ```no_run
//! use interop_core::middleware::audit::AuditLayer;
//! use sqlx::SqlitePool;
//!
//! # async fn example(pool: SqlitePool) {
//! let audit_layer = AuditLayer::new(pool);
//! # }
//! ```

pub use crate::audit::AuditLayer;
