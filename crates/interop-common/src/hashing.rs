//! Stable hashing utilities.
//!
//! The Deterministic ID Service builds `person_id`/`visit_occurrence_id` by
//! hashing a normalized natural key the same way file-integrity checksums
//! hash a stream: read bytes, feed a `Digest`, hex-encode.

use sha2::{Digest, Sha256};
use std::io::Read;

/// Hex-encoded SHA-256 digest of an in-memory byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_digest(data))
}

/// Raw SHA-256 digest of an in-memory byte slice.
pub fn sha256_digest(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 digest of any readable stream, buffered in 8KB chunks.
pub fn sha256_reader<R: Read>(reader: &mut R) -> crate::error::Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hasher.finalize().into())
}
