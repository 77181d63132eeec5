//! Deterministic ID Service (C4): stable `person_id`/`visit_occurrence_id`
//! derivation from natural keys (spec.md §4.4).

use interop_common::hashing::{sha256_digest, sha256_hex};
use sqlx::SqlitePool;

use crate::catalog::person_id_cache;
use crate::error::ServerResult;

/// 15-digit positive integers live in `[10^14, 10^15)`.
const FLOOR: i64 = 100_000_000_000_000;
const RANGE: i64 = 900_000_000_000_000;

/// Distinguishes the person-id and visit-id hash domains so that equal
/// natural keys never collide across namespaces (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdNamespace {
    Person,
    Visit,
}

impl IdNamespace {
    fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Visit => "visit",
        }
    }
}

/// Normalizes a natural key: lowercase, trim each part, pipe-join. Per
/// spec.md §9 Open Question: MRN if present and non-empty, else
/// `first|last|dob`, applied uniformly by every caller (Deterministic ID
/// Service and the FHIR->OMOP Patient->PERSON transform both route through
/// this function).
pub fn normalize_person_key(mrn: Option<&str>, first: &str, last: &str, dob: &str) -> String {
    let parts: Vec<String> = match mrn.map(str::trim).filter(|s| !s.is_empty()) {
        Some(mrn) => vec![mrn.to_lowercase()],
        None => vec![first.trim().to_lowercase(), last.trim().to_lowercase(), dob.trim().to_lowercase()],
    };
    parts.join("|")
}

/// `id = firstNBits(stableHash(k))` reduced to an exactly-15-digit positive
/// integer, offset so the value is always in `[10^14, 10^15)`.
fn derive_id(namespace: IdNamespace, normalized_key: &str) -> i64 {
    let domain_separated = format!("{}:{}", namespace.as_str(), normalized_key);
    let digest = sha256_digest(domain_separated.as_bytes());
    // First 8 bytes as an unsigned 64-bit value ("firstNBits").
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest[..8]);
    let bits = u64::from_be_bytes(buf);
    FLOOR + (bits % RANGE as u64) as i64
}

/// Derives a deterministic FHIR resource `id` (a string, distinct from the
/// 15-digit OMOP ids above) from a resource type and normalized natural key,
/// so repeated ingestion of the same logical resource converges to one
/// document (spec.md §3 FHIRResource invariant).
pub fn derive_fhir_id(resource_type: &str, normalized_key: &str) -> String {
    sha256_hex(format!("fhir:{resource_type}:{normalized_key}").as_bytes())[..32].to_string()
}

/// Generates (or retrieves from cache) a deterministic, 15-digit id for the
/// given normalized natural key. Total, deterministic across process
/// restarts (spec.md §8: "equal normalized key -> returned id is identical
/// across process restarts").
pub async fn generate_id(pool: &SqlitePool, namespace: IdNamespace, normalized_key: &str) -> ServerResult<i64> {
    if let Some(id) = person_id_cache::lookup(pool, namespace.as_str(), normalized_key).await? {
        return Ok(id);
    }

    let id = derive_id(namespace, normalized_key);
    person_id_cache::insert(pool, namespace.as_str(), normalized_key, id).await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.expect("pool");
        sqlx::query(crate::catalog::schema::CREATE_TABLES).execute(&pool).await.expect("schema");
        pool
    }

    #[test]
    fn derive_id_is_always_fifteen_digits() {
        for key in ["mrn:p001", "john|doe|1990-01-15", ""] {
            let id = derive_id(IdNamespace::Person, key);
            assert!((FLOOR..FLOOR + RANGE).contains(&id), "id {id} out of 15-digit range");
            assert_eq!(id.to_string().len(), 15);
        }
    }

    #[test]
    fn derive_id_is_deterministic() {
        assert_eq!(derive_id(IdNamespace::Person, "p001"), derive_id(IdNamespace::Person, "p001"));
    }

    #[test]
    fn person_and_visit_namespaces_never_collide_for_equal_keys() {
        assert_ne!(derive_id(IdNamespace::Person, "p001"), derive_id(IdNamespace::Visit, "p001"));
    }

    #[test]
    fn normalize_person_key_prefers_mrn() {
        assert_eq!(normalize_person_key(Some(" P001 "), "John", "Doe", "1990-01-15"), "p001");
    }

    #[test]
    fn normalize_person_key_falls_back_without_mrn() {
        assert_eq!(normalize_person_key(None, "John", "Doe", "1990-01-15"), "john|doe|1990-01-15");
    }

    #[test]
    fn normalize_person_key_falls_back_on_blank_mrn() {
        assert_eq!(normalize_person_key(Some("  "), "John", "Doe", "1990-01-15"), "john|doe|1990-01-15");
    }

    #[test]
    fn derive_fhir_id_is_deterministic_and_namespaced_by_resource_type() {
        let key = normalize_person_key(Some("P001"), "John", "Doe", "1990-01-15");
        let first = derive_fhir_id("Patient", &key);
        let second = derive_fhir_id("Patient", &key);
        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
        assert_ne!(first, derive_fhir_id("Observation", &key));
    }

    #[tokio::test]
    async fn generate_id_is_stable_across_calls_against_same_pool() {
        let pool = test_pool().await;
        let key = normalize_person_key(Some("P001"), "John", "Doe", "1990-01-15");
        let first = generate_id(&pool, IdNamespace::Person, &key).await.expect("first");
        let second = generate_id(&pool, IdNamespace::Person, &key).await.expect("second");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn generate_id_survives_simulated_process_restart() {
        // Same normalized key against a fresh `JobCatalog` handle over the
        // same backing store must reproduce the same id (spec.md §8).
        let pool = test_pool().await;
        let key = "p002";
        let before_restart = generate_id(&pool, IdNamespace::Person, key).await.expect("before");

        // `derive_id` alone (no cache) reproduces the same value, proving
        // the id is a pure function of the key rather than an artifact of
        // cache insertion order.
        let recomputed = derive_id(IdNamespace::Person, key);
        assert_eq!(before_restart, recomputed);
    }
}
