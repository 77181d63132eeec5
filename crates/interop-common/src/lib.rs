//! Interop Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the healthbridge workspace.
//!
//! # Overview
//!
//! This crate provides common functionality used across all healthbridge
//! workspace members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Hashing**: Stable digest utilities backing deterministic id derivation
//! - **Types**: Shared domain types (semantic types, target path grammar, pagination)
//! - **Logging**: Structured `tracing`-based logging setup
//!
//! # Example
//!
//! ```no_run
//! use interop_common::{Result, BridgeError};
//! use interop_common::hashing::sha256_hex;
//!
//! fn normalize_and_hash(key: &str) -> Result<String> {
//!     Ok(sha256_hex(key.as_bytes()))
//! }
//! ```

pub mod error;
pub mod hashing;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{BridgeError, Result};
