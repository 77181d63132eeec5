//! Shared validation utilities
//!
//! Provides common validation functions for input data across commands and queries.
//!
//! # Examples
//!
//! ```rust,ignore
//! use interop_core::features::shared::validation::{validate_name, validate_url};
//!
//! // Validate a name
//! validate_name("Patient Ingestion Feed", 256)?;
//!
//! // Validate a URL
//! if let Some(uri) = &connector_uri {
//!     validate_url(uri, "source_uri")?;
//! }
//! ```

use thiserror::Error;

/// Errors that can occur during name validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameValidationError {
    #[error("Name is required and cannot be empty")]
    Required,

    #[error("Name must be between 1 and {max_length} characters")]
    TooLong { max_length: usize },
}

/// Errors that can occur during URL validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlValidationError {
    #[error("{field_name} URL is invalid: must start with http:// or https://")]
    InvalidFormat { field_name: String },
}

/// Validate a name field
///
/// # Rules
/// - Must not be empty (after trimming whitespace)
/// - Must not exceed max_length characters
pub fn validate_name(name: &str, max_length: usize) -> Result<(), NameValidationError> {
    if name.trim().is_empty() {
        return Err(NameValidationError::Required);
    }

    if name.len() > max_length {
        return Err(NameValidationError::TooLong { max_length });
    }

    Ok(())
}

/// Validate a URL field
///
/// # Rules
/// - Must start with http:// or https://
/// - Empty strings are considered valid (use Option<String> and check for Some)
pub fn validate_url(url: &str, field_name: &str) -> Result<(), UrlValidationError> {
    if url.is_empty() {
        return Ok(());
    }

    if !is_valid_url(url) {
        return Err(UrlValidationError::InvalidFormat {
            field_name: field_name.to_string(),
        });
    }

    Ok(())
}

/// Check if a URL is valid (starts with http:// or https://)
///
/// This is a basic validation. For more thorough validation, consider using
/// a dedicated URL parsing library.
#[inline]
pub fn is_valid_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Validate an optional URL field
///
/// Convenience function that handles Option<String> directly.
pub fn validate_optional_url(
    url: Option<&str>,
    field_name: &str,
) -> Result<(), UrlValidationError> {
    if let Some(url) = url {
        validate_url(url, field_name)?;
    }
    Ok(())
}
