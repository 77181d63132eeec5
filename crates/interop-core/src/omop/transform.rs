//! FHIR resource -> OMOP CDM row builders (part of C11, spec.md §4.11).
//!
//! Each builder tolerates absent or malformed fields, dropping a record only
//! when a `person_id` cannot be derived at all — per spec.md §4.11's "rows
//! with missing optional fields are still persisted; only person_id is
//! load-bearing."

use chrono::Utc;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use super::concept_matcher::ConceptMatcher;
use super::OmopTable;
use crate::domain::{FhirResource, OmopRow};
use crate::error::ServerResult;
use crate::id_service::{self, IdNamespace};

fn split_birth_date(birth_date: &str) -> (Option<i32>, Option<i32>, Option<i32>) {
    let parts: Vec<&str> = birth_date.splitn(3, '-').collect();
    match parts.as_slice() {
        [year, month, day] => (year.parse().ok(), month.parse().ok(), day.parse().ok()),
        _ => (None, None, None),
    }
}

fn gender_concept_id(gender: &str) -> i64 {
    match gender {
        "male" => 8507,
        "female" => 8532,
        _ => 0,
    }
}

/// Resolves the `person_id` an event-table row should carry. There is no
/// live dereference of the `subject` reference against a persisted Patient
/// in scope here, so the reference string itself (stable within a job's
/// ingest run) is hashed the same way a natural key is — deterministic, and
/// consistent with a Patient ingested under the same reference later.
async fn resolve_person_id(catalog: &SqlitePool, body: &Value, subject_reference: Option<&str>) -> ServerResult<Option<i64>> {
    if let Some(embedded) = body.get("patient").or_else(|| body.get("subject")) {
        let given = embedded.pointer("/name/0/given/0").and_then(Value::as_str).unwrap_or("");
        let family = embedded.pointer("/name/0/family").and_then(Value::as_str).unwrap_or("");
        let dob = embedded.get("birthDate").and_then(Value::as_str).unwrap_or("");
        if !(given.is_empty() && family.is_empty() && dob.is_empty()) {
            let key = id_service::normalize_person_key(None, given, family, dob);
            return Ok(Some(id_service::generate_id(catalog, IdNamespace::Person, &key).await?));
        }
    }

    match subject_reference.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reference) => Ok(Some(id_service::generate_id(catalog, IdNamespace::Person, reference).await?)),
        None => Ok(None),
    }
}

/// Patient -> PERSON (spec.md §4.11).
pub async fn person_from_patient(catalog: &SqlitePool, resource: &FhirResource) -> ServerResult<Option<OmopRow>> {
    let body = &resource.resource;
    let given = body.pointer("/name/0/given/0").and_then(Value::as_str).unwrap_or("");
    let family = body.pointer("/name/0/family").and_then(Value::as_str).unwrap_or("");
    let birth_date = body.get("birthDate").and_then(Value::as_str).unwrap_or("");
    let mrn = body.pointer("/identifier/0/value").and_then(Value::as_str);

    if given.is_empty() && family.is_empty() && birth_date.is_empty() && mrn.is_none() {
        return Ok(None);
    }

    let normalized_key = id_service::normalize_person_key(mrn, given, family, birth_date);
    let person_id = id_service::generate_id(catalog, IdNamespace::Person, &normalized_key).await?;

    let gender = body.get("gender").and_then(Value::as_str).unwrap_or("");
    let (year, month, day) = split_birth_date(birth_date);

    let fields = json!({
        "gender_concept_id": gender_concept_id(gender),
        "year_of_birth": year,
        "month_of_birth": month,
        "day_of_birth": day,
        "person_source_value": mrn,
    });

    Ok(Some(OmopRow {
        table: OmopTable::Person.to_string(),
        person_id,
        job_id: Some(resource.job_id),
        persisted_at: Utc::now(),
        synced_from_fhir: true,
        fields,
    }))
}

/// Observation -> MEASUREMENT (spec.md §4.11).
pub async fn measurement_from_observation(catalog: &SqlitePool, matcher: &ConceptMatcher, resource: &FhirResource) -> ServerResult<Option<OmopRow>> {
    let body = &resource.resource;
    let subject_reference = body.pointer("/subject/reference").and_then(Value::as_str);
    let person_id = match resolve_person_id(catalog, body, subject_reference).await? {
        Some(id) => id,
        None => return Ok(None),
    };

    let code_text = body
        .pointer("/code/text")
        .and_then(Value::as_str)
        .or_else(|| body.pointer("/code/coding/0/display").and_then(Value::as_str))
        .unwrap_or("");
    let suggestion = matcher.match_one(code_text, "Measurement").await;

    let effective_date = body.get("effectiveDateTime").and_then(Value::as_str).unwrap_or("");
    let value = body.pointer("/valueQuantity/value").and_then(Value::as_f64);

    let fields = json!({
        "measurement_concept_id": suggestion.concept_id,
        "measurement_date": effective_date,
        "value_as_number": value,
        "source_value": code_text,
        "start_date": effective_date,
    });

    Ok(Some(OmopRow {
        table: OmopTable::Measurement.to_string(),
        person_id,
        job_id: Some(resource.job_id),
        persisted_at: Utc::now(),
        synced_from_fhir: true,
        fields,
    }))
}

/// DiagnosticReport -> MEASUREMENT, one row per `result` entry (spec.md §4.11).
pub async fn measurements_from_diagnostic_report(catalog: &SqlitePool, matcher: &ConceptMatcher, resource: &FhirResource) -> ServerResult<Vec<OmopRow>> {
    let body = &resource.resource;
    let subject_reference = body.pointer("/subject/reference").and_then(Value::as_str);
    let person_id = match resolve_person_id(catalog, body, subject_reference).await? {
        Some(id) => id,
        None => return Ok(Vec::new()),
    };

    let issued = body.get("issued").and_then(Value::as_str).unwrap_or("");
    let results = body.get("result").and_then(Value::as_array).cloned().unwrap_or_default();

    let mut rows = Vec::with_capacity(results.len());
    for result in &results {
        let display = result
            .pointer("/display")
            .and_then(Value::as_str)
            .or_else(|| result.get("reference").and_then(Value::as_str))
            .unwrap_or("");
        let suggestion = matcher.match_one(display, "Measurement").await;

        let fields = json!({
            "measurement_concept_id": suggestion.concept_id,
            "measurement_date": issued,
            "source_value": display,
            "start_date": issued,
        });

        rows.push(OmopRow {
            table: OmopTable::Measurement.to_string(),
            person_id,
            job_id: Some(resource.job_id),
            persisted_at: Utc::now(),
            synced_from_fhir: true,
            fields,
        });
    }

    Ok(rows)
}

/// Condition -> CONDITION_OCCURRENCE (spec.md §4.11).
pub async fn condition_occurrence_from_condition(catalog: &SqlitePool, matcher: &ConceptMatcher, resource: &FhirResource) -> ServerResult<Option<OmopRow>> {
    let body = &resource.resource;
    let subject_reference = body.pointer("/subject/reference").and_then(Value::as_str);
    let person_id = match resolve_person_id(catalog, body, subject_reference).await? {
        Some(id) => id,
        None => return Ok(None),
    };

    let code_text = body
        .pointer("/code/text")
        .and_then(Value::as_str)
        .or_else(|| body.pointer("/code/coding/0/display").and_then(Value::as_str))
        .unwrap_or("");
    let suggestion = matcher.match_one(code_text, "Condition").await;

    let start_date = body
        .get("onsetDateTime")
        .and_then(Value::as_str)
        .or_else(|| body.get("recordedDate").and_then(Value::as_str))
        .unwrap_or("");

    let fields = json!({
        "condition_concept_id": suggestion.concept_id,
        "condition_start_date": start_date,
        "source_value": code_text,
        "start_date": start_date,
    });

    Ok(Some(OmopRow {
        table: OmopTable::ConditionOccurrence.to_string(),
        person_id,
        job_id: Some(resource.job_id),
        persisted_at: Utc::now(),
        synced_from_fhir: true,
        fields,
    }))
}

/// MedicationRequest -> DRUG_EXPOSURE (spec.md §4.11).
pub async fn drug_exposure_from_medication_request(catalog: &SqlitePool, matcher: &ConceptMatcher, resource: &FhirResource) -> ServerResult<Option<OmopRow>> {
    let body = &resource.resource;
    let subject_reference = body.pointer("/subject/reference").and_then(Value::as_str);
    let person_id = match resolve_person_id(catalog, body, subject_reference).await? {
        Some(id) => id,
        None => return Ok(None),
    };

    let code_text = body
        .pointer("/medicationCodeableConcept/text")
        .and_then(Value::as_str)
        .or_else(|| body.pointer("/medicationCodeableConcept/coding/0/display").and_then(Value::as_str))
        .unwrap_or("");
    let suggestion = matcher.match_one(code_text, "Drug").await;

    let start_date = body.get("authoredOn").and_then(Value::as_str).unwrap_or("");

    let fields = json!({
        "drug_concept_id": suggestion.concept_id,
        "drug_exposure_start_date": start_date,
        "source_value": code_text,
        "start_date": start_date,
    });

    Ok(Some(OmopRow {
        table: OmopTable::DrugExposure.to_string(),
        person_id,
        job_id: Some(resource.job_id),
        synced_from_fhir: true,
        persisted_at: Utc::now(),
        fields,
    }))
}
