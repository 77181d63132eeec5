//! AI Mapping Engine (C6): lexical + embedding + reasoning field-mapping
//! suggestions with confidence scoring (spec.md §4.6).

use std::sync::Arc;
use std::sync::OnceLock;

use interop_common::types::SemanticType;
use regex::Regex;

use super::clients::{EmbeddingClient, LlmClient};
use super::lexical::lexical_score;
use crate::domain::{FieldMapping, FieldMappingAlternative, Schema, TransformType};

const AUTO_APPROVE_THRESHOLD: f64 = 0.90;
const REVIEW_THRESHOLD: f64 = 0.70;
/// Top-k lexical candidates considered per source field before the
/// (expensive) embedding/reasoning stages run.
const TOP_K_CANDIDATES: usize = 5;

fn hl7_field_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^[A-Z]{2,3}-\d+(\.\d+)?$").expect("valid regex"))
}

/// Result of running the mapping engine over a schema pair.
pub struct MappingSuggestions {
    pub mappings: Vec<FieldMapping>,
    /// Set when the embedding or reasoning backend was unreachable and the
    /// engine fell back to a lower-fidelity stage (spec.md §4.6, §9).
    pub degraded: bool,
}

pub struct AiMappingEngine {
    embedding: Arc<dyn EmbeddingClient>,
    llm: Arc<dyn LlmClient>,
}

impl AiMappingEngine {
    pub fn new(embedding: Arc<dyn EmbeddingClient>, llm: Arc<dyn LlmClient>) -> Self {
        Self { embedding, llm }
    }

    /// Produces one ranked `FieldMapping` candidate per source field, picking
    /// the best-scoring target field and retaining runners-up as
    /// alternatives.
    pub async fn suggest_mappings(&self, source_schema: &Schema, target_schema: &Schema) -> MappingSuggestions {
        let mut degraded = false;
        let mut mappings = Vec::with_capacity(source_schema.len());

        for (source_field, source_type) in source_schema {
            let mut candidates: Vec<(String, f64)> = target_schema
                .keys()
                .map(|target_field| (target_field.clone(), lexical_score(source_field, target_field)))
                .collect();
            candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            candidates.truncate(TOP_K_CANDIDATES.max(1));

            if candidates.is_empty() {
                continue;
            }

            let mut scored: Vec<(String, f64, f64, bool, Option<String>, f64)> = Vec::with_capacity(candidates.len());
            for (target_field, lex_score) in &candidates {
                let target_type = target_schema.get(target_field).copied().unwrap_or(SemanticType::String);

                let (semantic_score, this_degraded) =
                    self.semantic_score(source_field, target_field, *lex_score).await;
                degraded |= this_degraded;

                let (clinical_score, type_compatible, clinical_context, llm_degraded) =
                    self.reasoning_score(source_field, target_field).await;
                degraded |= llm_degraded;

                let type_compat_score = if type_compatible { 1.0 } else if *source_type == target_type { 1.0 } else { 0.0 };
                let standard_bonus = if *lex_score >= 0.999 { 1.0 } else { *lex_score };

                let confidence = (0.4 * semantic_score + 0.3 * clinical_score + 0.2 * type_compat_score + 0.1 * standard_bonus)
                    .clamp(0.0, 1.0);

                scored.push((target_field.clone(), confidence, *lex_score, type_compatible || *source_type == target_type, clinical_context, semantic_score));
            }

            // Tie-break: higher confidence, then higher type-compatibility,
            // then higher lexical score, then stable ordering by sourceField
            // (already guaranteed by iterating `source_schema` in order).
            scored.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.3.cmp(&a.3))
                    .then_with(|| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal))
            });

            let (winner_field, winner_confidence, winner_lex, winner_type_compat, winner_clinical_context, _) = scored[0].clone();
            let winner_type = target_schema.get(&winner_field).copied().unwrap_or(SemanticType::String);

            let alternatives = scored
                .iter()
                .skip(1)
                .map(|(field, confidence, _, _, _, _)| FieldMappingAlternative {
                    source_field: field.clone(),
                    confidence_score: *confidence,
                    rationale: format!("runner-up candidate for {source_field}"),
                })
                .collect();

            let transform_type = choose_transform_type(*source_type, winner_type);
            let rationale = build_rationale(source_field, &winner_field, winner_lex, winner_confidence);

            mappings.push(FieldMapping {
                source_field: source_field.clone(),
                target_field: winner_field,
                transform_type,
                confidence_score: winner_confidence,
                rationale,
                clinical_context: winner_clinical_context,
                type_compatible: winner_type_compat,
                alternatives,
                options: serde_json::Value::Null,
            });
        }

        MappingSuggestions { mappings, degraded }
    }

    /// Embedding cosine similarity, falling back to the lexical score when
    /// the embedding backend is unreachable (spec.md §4.6, §9).
    async fn semantic_score(&self, source_field: &str, target_field: &str, lexical_fallback: f64) -> (f64, bool) {
        let source_embedding = self.embedding.embed(source_field).await;
        let target_embedding = self.embedding.embed(target_field).await;

        match (source_embedding, target_embedding) {
            (Ok(a), Ok(b)) => (cosine_similarity(&a, &b), false),
            _ => (lexical_fallback, true),
        }
    }

    /// LLM reasoning adjustment, neutral (0.5, no adjustment) when the
    /// backend is unreachable.
    async fn reasoning_score(&self, source_field: &str, target_field: &str) -> (f64, bool, Option<String>, bool) {
        match self.llm.explain(source_field, target_field).await {
            Ok(reasoning) => {
                let clamped_adjust = reasoning.confidence_adjust.clamp(-0.2, 0.2);
                ((0.5 + clamped_adjust).clamp(0.0, 1.0), reasoning.type_compatible, reasoning.clinical_context, false)
            },
            Err(_) => (0.5, false, None, true),
        }
    }
}

fn choose_transform_type(source_type: SemanticType, target_type: SemanticType) -> TransformType {
    if source_type == SemanticType::Date && target_type == SemanticType::DateTime {
        TransformType::FormatDate
    } else {
        TransformType::Direct
    }
}

fn build_rationale(source_field: &str, target_field: &str, lexical: f64, confidence: f64) -> String {
    let mut rationale = format!("lexical score {lexical:.2}, combined confidence {confidence:.2} for {source_field} -> {target_field}");

    if hl7_field_path_re().is_match(source_field) {
        rationale.push_str("; source field looks like an HL7 segment.field.component path");
    }

    let disposition = if confidence >= AUTO_APPROVE_THRESHOLD {
        "auto-approvable"
    } else if confidence >= REVIEW_THRESHOLD {
        "review-required"
    } else {
        "below review threshold, manual mapping recommended"
    };
    rationale.push_str(&format!("; {disposition}"));

    rationale
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::clients::{NullEmbeddingClient, NullLlmClient};
    use indexmap::IndexMap;

    fn engine() -> AiMappingEngine {
        AiMappingEngine::new(Arc::new(NullEmbeddingClient), Arc::new(NullLlmClient))
    }

    #[tokio::test]
    async fn degrades_to_lexical_only_when_backends_unreachable() {
        let mut source: Schema = IndexMap::new();
        source.insert("first_name".into(), SemanticType::String);
        let mut target: Schema = IndexMap::new();
        target.insert("firstName".into(), SemanticType::String);

        let result = engine().suggest_mappings(&source, &target).await;
        assert!(result.degraded);
        assert_eq!(result.mappings.len(), 1);
        assert_eq!(result.mappings[0].target_field, "firstName");
    }

    #[tokio::test]
    async fn date_to_datetime_target_chooses_format_date_transform() {
        let mut source: Schema = IndexMap::new();
        source.insert("birth_date".into(), SemanticType::Date);
        let mut target: Schema = IndexMap::new();
        target.insert("birthDateTime".into(), SemanticType::DateTime);

        let result = engine().suggest_mappings(&source, &target).await;
        assert_eq!(result.mappings[0].transform_type, TransformType::FormatDate);
    }

    #[tokio::test]
    async fn empty_target_schema_yields_no_mappings() {
        let mut source: Schema = IndexMap::new();
        source.insert("first_name".into(), SemanticType::String);
        let target: Schema = IndexMap::new();

        let result = engine().suggest_mappings(&source, &target).await;
        assert!(result.mappings.is_empty());
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0_f32, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }
}
