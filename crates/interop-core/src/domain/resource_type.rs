//! FHIR resource types the Resource Predictor (C7) chooses between
//! (spec.md §4.7).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FhirResourceType {
    Patient,
    Observation,
    Condition,
    MedicationRequest,
    Procedure,
    Encounter,
    DiagnosticReport,
}

impl std::fmt::Display for FhirResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Patient => "Patient",
            Self::Observation => "Observation",
            Self::Condition => "Condition",
            Self::MedicationRequest => "MedicationRequest",
            Self::Procedure => "Procedure",
            Self::Encounter => "Encounter",
            Self::DiagnosticReport => "DiagnosticReport",
        };
        write!(f, "{s}")
    }
}
