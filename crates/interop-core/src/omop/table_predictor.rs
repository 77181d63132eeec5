//! OMOP table prediction: mirrors the Resource Predictor (C7) but targets
//! CDM tables instead of FHIR resource types (spec.md §4.11), reusing the
//! same generic `IndicatorScorer`.

use std::sync::OnceLock;

use crate::domain::Schema;
use crate::mapping::indicator_scorer::{margin_confidence, Indicator, IndicatorScorer};

use super::OmopTable;

pub struct TablePrediction {
    pub table: OmopTable,
    pub confidence: f64,
    pub top3: Vec<(OmopTable, f64)>,
    pub manual_review_recommended: bool,
}

fn scorer() -> &'static IndicatorScorer<OmopTable> {
    static SCORER: OnceLock<IndicatorScorer<OmopTable>> = OnceLock::new();
    SCORER.get_or_init(|| {
        IndicatorScorer::new(
            vec![
                Indicator { patterns: &["first_name", "last_name", "date_of_birth", "dob", "gender", "mrn", "patient_id"], target: OmopTable::Person, weight: 3.0 },
                Indicator { patterns: &["encounter_id", "visit_id", "admission_date", "discharge_date"], target: OmopTable::VisitOccurrence, weight: 5.0 },
                Indicator { patterns: &["location", "provider", "department"], target: OmopTable::VisitOccurrence, weight: 2.0 },
                Indicator { patterns: &["diagnosis_code", "icd"], target: OmopTable::ConditionOccurrence, weight: 5.0 },
                Indicator { patterns: &["onset", "severity"], target: OmopTable::ConditionOccurrence, weight: 2.0 },
                Indicator { patterns: &["lab_code", "loinc", "result_value", "report_code", "panel_code"], target: OmopTable::Measurement, weight: 5.0 },
                Indicator { patterns: &["unit", "reference_range"], target: OmopTable::Measurement, weight: 2.0 },
                Indicator { patterns: &["medication_code", "rxnorm", "ndc"], target: OmopTable::DrugExposure, weight: 5.0 },
                Indicator { patterns: &["dose", "frequency", "route"], target: OmopTable::DrugExposure, weight: 2.0 },
            ],
            OmopTable::Person,
        )
    })
}

/// Predicts the single best CDM table for a source schema, with the top-3
/// ranked alternatives (spec.md §4.11).
pub fn predict_table(source_schema: &Schema) -> TablePrediction {
    let field_names: Vec<String> = source_schema.keys().cloned().collect();
    let score = scorer().score(&field_names);
    let confidence = margin_confidence(score.winner_score, score.runner_up_score);

    let mut top3: Vec<(OmopTable, f64)> = score.ranked.into_iter().take(3).collect();
    if top3.is_empty() {
        top3.push((score.winner, 0.0));
    }

    TablePrediction { table: score.winner, confidence, top3, manual_review_recommended: confidence < 0.70 }
}
