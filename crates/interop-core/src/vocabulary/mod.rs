//! Vocabulary Service (C3): OMOP concept seeding and lookup (spec.md §4.3).

use std::path::Path;

use dashmap::DashMap;
use tracing::warn;

use crate::domain::OmopConcept;
use crate::error::{AppError, ServerResult};

/// Outcome of a CSV load, per spec.md §6: `{loaded, skipped}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LoadSummary {
    pub loaded: usize,
    pub skipped: usize,
}

/// In-memory concept cache, keyed by `concept_id` (unique per spec.md §4.3),
/// with a secondary free-text index for `searchByText`. Read-mostly,
/// append-only under a single writer — `DashMap` gives lock-free concurrent
/// reads the way the pack's FHIR-domain sibling `octofhir-server-rs` uses it
/// for its own concept/resource indexes.
pub struct VocabularyService {
    by_id: DashMap<i64, OmopConcept>,
    by_code: DashMap<(String, String), i64>,
}

impl Default for VocabularyService {
    fn default() -> Self {
        Self::new()
    }
}

impl VocabularyService {
    pub fn new() -> Self {
        Self {
            by_id: DashMap::new(),
            by_code: DashMap::new(),
        }
    }

    /// Loads concepts from a single CSV file. Malformed rows are logged and
    /// skipped rather than failing the whole load (spec.md §4.3, §6).
    pub fn load_from_csv(&self, path: &Path) -> ServerResult<LoadSummary> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| AppError::SourceRead(format!("vocabulary CSV {}: {e}", path.display())))?;

        let mut loaded = 0;
        let mut skipped = 0;

        for record in reader.deserialize::<OmopConcept>() {
            match record {
                Ok(concept) => {
                    self.insert(concept);
                    loaded += 1;
                },
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping malformed vocabulary row");
                    skipped += 1;
                },
            }
        }

        Ok(LoadSummary { loaded, skipped })
    }

    /// Walks `dir` for `*.csv` files, inferring `vocabulary_id` from the file
    /// stem (e.g. `ICD10CM.csv` seeds the `ICD10CM` vocabulary) per spec.md
    /// §4.3's `<Vocabulary>.csv` naming convention. The inferred name is
    /// informational only — the authoritative `vocabulary_id` is the CSV's
    /// own column.
    pub fn seed_from_directory(&self, dir: &Path) -> ServerResult<LoadSummary> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| AppError::SourceRead(format!("vocabulary directory {}: {e}", dir.display())))?;

        let mut total = LoadSummary { loaded: 0, skipped: 0 };
        for entry in entries {
            let entry = entry.map_err(|e| AppError::SourceRead(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
                continue;
            }
            let summary = self.load_from_csv(&path)?;
            total.loaded += summary.loaded;
            total.skipped += summary.skipped;
        }
        Ok(total)
    }

    fn insert(&self, concept: OmopConcept) {
        self.by_code
            .insert((concept.vocabulary_id.clone(), concept.concept_code.clone()), concept.concept_id);
        self.by_id.insert(concept.concept_id, concept);
    }

    pub fn lookup_by_code(&self, code: &str, vocabulary: &str) -> Option<OmopConcept> {
        let concept_id = *self.by_code.get(&(vocabulary.to_string(), code.to_string()))?;
        self.by_id.get(&concept_id).map(|entry| entry.clone())
    }

    pub fn lookup_by_id(&self, concept_id: i64) -> Option<OmopConcept> {
        self.by_id.get(&concept_id).map(|entry| entry.clone())
    }

    /// Free-text search over `concept_name`, optionally scoped to a domain,
    /// case-insensitive substring match ranked by shortest name first (a
    /// cheap proxy for "most specific match").
    pub fn search_by_text(&self, text: &str, domain: Option<&str>, limit: usize) -> Vec<OmopConcept> {
        let needle = text.to_lowercase();
        let mut matches: Vec<OmopConcept> = self
            .by_id
            .iter()
            .filter(|entry| domain.map(|d| entry.domain_id.eq_ignore_ascii_case(d)).unwrap_or(true))
            .filter(|entry| entry.concept_name.to_lowercase().contains(&needle))
            .map(|entry| entry.clone())
            .collect();

        matches.sort_by_key(|concept| concept.concept_name.len());
        matches.truncate(limit);
        matches
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).expect("create csv");
        file.write_all(body.as_bytes()).expect("write csv");
        path
    }

    const HEADER: &str =
        "concept_id,concept_name,domain_id,vocabulary_id,concept_code,standard_concept,concept_class_id,valid_start_date,valid_end_date\n";

    #[test]
    fn loads_valid_rows_and_skips_malformed_ones() {
        let dir = tempfile::tempdir().expect("tempdir");
        let body = format!(
            "{HEADER}201826,Type 2 diabetes mellitus,Condition,ICD10CM,E11.9,S,Clinical Finding,1970-01-01,2099-12-31\nnot,a,valid,row\n"
        );
        let path = write_csv(dir.path(), "ICD10CM.csv", &body);

        let service = VocabularyService::new();
        let summary = service.load_from_csv(&path).expect("load");
        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn lookup_by_code_finds_seeded_concept() {
        let dir = tempfile::tempdir().expect("tempdir");
        let body = format!(
            "{HEADER}201826,Type 2 diabetes mellitus,Condition,ICD10CM,E11.9,S,Clinical Finding,1970-01-01,2099-12-31\n"
        );
        let path = write_csv(dir.path(), "ICD10CM.csv", &body);

        let service = VocabularyService::new();
        service.load_from_csv(&path).expect("load");

        let found = service.lookup_by_code("E11.9", "ICD10CM").expect("found");
        assert_eq!(found.concept_id, 201826);
        assert!(found.is_standard());
        assert!(service.lookup_by_code("unknown", "ICD10CM").is_none());
    }

    #[test]
    fn search_by_text_is_case_insensitive_and_domain_scoped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let body = format!(
            "{HEADER}201826,Type 2 diabetes mellitus,Condition,ICD10CM,E11.9,S,Clinical Finding,1970-01-01,2099-12-31\n3004501,Hemoglobin A1c,Measurement,LOINC,4548-4,S,Lab Test,1970-01-01,2099-12-31\n"
        );
        let path = write_csv(dir.path(), "seed.csv", &body);

        let service = VocabularyService::new();
        service.load_from_csv(&path).expect("load");

        let hits = service.search_by_text("diabetes", Some("Condition"), 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].concept_id, 201826);

        assert!(service.search_by_text("diabetes", Some("Measurement"), 10).is_empty());
    }

    #[test]
    fn seed_from_directory_aggregates_every_csv_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_csv(
            dir.path(),
            "ICD10CM.csv",
            &format!("{HEADER}1,A,Condition,ICD10CM,A01,S,Clinical Finding,1970-01-01,2099-12-31\n"),
        );
        write_csv(
            dir.path(),
            "LOINC.csv",
            &format!("{HEADER}2,B,Measurement,LOINC,L01,S,Lab Test,1970-01-01,2099-12-31\n"),
        );
        write_csv(dir.path(), "readme.txt", "not a csv");

        let service = VocabularyService::new();
        let summary = service.seed_from_directory(dir.path()).expect("seed");
        assert_eq!(summary.loaded, 2);
        assert_eq!(service.len(), 2);
    }
}
