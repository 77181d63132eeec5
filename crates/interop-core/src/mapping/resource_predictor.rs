//! Resource Predictor (C7): classifies a tabular schema to a single best
//! FHIR resource type via weighted indicator scoring (spec.md §4.7).

use std::sync::OnceLock;

use crate::domain::{FhirResourceType, Schema};

use super::indicator_scorer::{margin_confidence, Indicator, IndicatorScorer};

pub struct ResourcePrediction {
    pub resource_type: FhirResourceType,
    pub confidence: f64,
    pub key_indicators: Vec<String>,
    pub manual_review_recommended: bool,
}

fn scorer() -> &'static IndicatorScorer<FhirResourceType> {
    static SCORER: OnceLock<IndicatorScorer<FhirResourceType>> = OnceLock::new();
    SCORER.get_or_init(|| {
        IndicatorScorer::new(
            vec![
                // Primary indicators (spec.md §4.7): score 5 per match.
                Indicator { patterns: &["diagnosis_code", "icd"], target: FhirResourceType::Condition, weight: 5.0 },
                Indicator { patterns: &["lab_code", "loinc", "result_value"], target: FhirResourceType::Observation, weight: 5.0 },
                Indicator { patterns: &["medication_code", "rxnorm", "ndc"], target: FhirResourceType::MedicationRequest, weight: 5.0 },
                Indicator { patterns: &["procedure_code", "cpt", "snomed_procedure"], target: FhirResourceType::Procedure, weight: 5.0 },
                Indicator { patterns: &["encounter_id", "visit_id", "admission_date", "discharge_date"], target: FhirResourceType::Encounter, weight: 5.0 },
                Indicator { patterns: &["report_code", "panel_code", "lab_report"], target: FhirResourceType::DiagnosticReport, weight: 5.0 },
                // Patient demographic identifiers contribute 1-3 (spec.md
                // §4.7); weighted at the top of that range since they are
                // strong signals when present together.
                Indicator { patterns: &["first_name", "last_name", "date_of_birth", "dob", "gender", "mrn", "patient_id"], target: FhirResourceType::Patient, weight: 3.0 },
                // Secondary indicators: score 2 per match.
                Indicator { patterns: &["onset", "severity"], target: FhirResourceType::Condition, weight: 2.0 },
                Indicator { patterns: &["unit", "reference_range"], target: FhirResourceType::Observation, weight: 2.0 },
                Indicator { patterns: &["dose", "frequency", "route"], target: FhirResourceType::MedicationRequest, weight: 2.0 },
                Indicator { patterns: &["location", "provider", "department"], target: FhirResourceType::Encounter, weight: 2.0 },
                Indicator { patterns: &["performed_date", "body_site"], target: FhirResourceType::Procedure, weight: 2.0 },
                Indicator { patterns: &["conclusion", "panel_name"], target: FhirResourceType::DiagnosticReport, weight: 2.0 },
            ],
            FhirResourceType::Patient,
        )
    })
}

/// Predicts the single best FHIR resource type for a source schema.
pub fn predict(source_schema: &Schema) -> ResourcePrediction {
    let field_names: Vec<String> = source_schema.keys().cloned().collect();
    let score = scorer().score(&field_names);
    let confidence = margin_confidence(score.winner_score, score.runner_up_score);

    ResourcePrediction {
        resource_type: score.winner,
        confidence,
        key_indicators: score.key_indicators,
        manual_review_recommended: confidence < 0.70,
    }
}
