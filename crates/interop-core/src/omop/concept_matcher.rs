//! Concept Matcher (part of C11): four-stage short-circuiting pipeline from
//! a raw source value to an OMOP standard concept (spec.md §4.11).
//!
//! Mirrors the AI Mapping Engine's pattern of a cheap deterministic stage
//! first, progressively more expensive/uncertain stages after, each one
//! only attempted when the previous one declined to answer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::OmopConcept;
use crate::mapping::clients::{EmbeddingClient, LlmClient};
use crate::vocabulary::VocabularyService;

const EMBEDDING_CANDIDATE_K: usize = 10;
const EMBEDDING_MATCH_THRESHOLD: f64 = 0.80;
const REASONING_CANDIDATE_K: usize = 5;
const REASONING_MATCH_THRESHOLD: f64 = 0.6;
const EXTERNAL_FALLBACK_THRESHOLD: f64 = 0.4;

/// One source value's match outcome, whichever stage produced it (or
/// `"no_match"` if every stage declined).
#[derive(Debug, Clone, Serialize)]
pub struct ConceptSuggestion {
    pub source_value: String,
    pub concept_id: Option<i64>,
    pub concept_name: Option<String>,
    pub confidence: f64,
    pub stage: &'static str,
    pub match_found: bool,
}

impl ConceptSuggestion {
    fn no_match(source_value: &str) -> Self {
        Self { source_value: source_value.to_string(), concept_id: None, concept_name: None, confidence: 0.0, stage: "no_match", match_found: false }
    }
}

/// Maps an OMOP domain name to the standard vocabularies a direct code
/// lookup should try, in order.
fn vocabularies_for_domain(domain: &str) -> &'static [&'static str] {
    match domain {
        "Condition" => &["ICD10CM", "SNOMED"],
        "Measurement" => &["LOINC"],
        "Drug" => &["RxNorm", "NDC"],
        _ => &[],
    }
}

pub struct ConceptMatcher {
    vocabulary: Arc<VocabularyService>,
    embedding: Arc<dyn EmbeddingClient>,
    llm: Arc<dyn LlmClient>,
}

impl ConceptMatcher {
    pub fn new(vocabulary: Arc<VocabularyService>, embedding: Arc<dyn EmbeddingClient>, llm: Arc<dyn LlmClient>) -> Self {
        Self { vocabulary, embedding, llm }
    }

    /// Runs the four stages in order, returning the first one that commits
    /// to a concept; `no_match` if none do (spec.md §4.11).
    pub async fn match_one(&self, source_value: &str, domain: &str) -> ConceptSuggestion {
        if source_value.trim().is_empty() {
            return ConceptSuggestion::no_match(source_value);
        }

        let stages: [&dyn ConceptMatchStage; 4] = [&DirectLookupStage, &EmbeddingStage, &ReasoningStage, &ExternalFallbackStage];
        for stage in stages {
            if let Some(suggestion) = stage.attempt(self, source_value, domain).await {
                return suggestion;
            }
        }

        ConceptSuggestion::no_match(source_value)
    }
}

#[async_trait]
trait ConceptMatchStage: Send + Sync {
    async fn attempt(&self, matcher: &ConceptMatcher, source_value: &str, domain: &str) -> Option<ConceptSuggestion>;
}

/// Stage 1: exact `(code, vocabulary)` lookup. Confidence is fixed at 0.95
/// since an exact code match carries no uncertainty worth scoring finely.
struct DirectLookupStage;

#[async_trait]
impl ConceptMatchStage for DirectLookupStage {
    async fn attempt(&self, matcher: &ConceptMatcher, source_value: &str, domain: &str) -> Option<ConceptSuggestion> {
        for vocabulary_id in vocabularies_for_domain(domain) {
            if let Some(concept) = matcher.vocabulary.lookup_by_code(source_value, vocabulary_id) {
                return Some(ConceptSuggestion {
                    source_value: source_value.to_string(),
                    concept_id: Some(concept.concept_id),
                    concept_name: Some(concept.concept_name),
                    confidence: 0.95,
                    stage: "direct_lookup",
                    match_found: true,
                });
            }
        }
        None
    }
}

/// Stage 2: embed the source value and the free-text candidates the
/// vocabulary's own fuzzy search turns up, rank by cosine similarity.
struct EmbeddingStage;

#[async_trait]
impl ConceptMatchStage for EmbeddingStage {
    async fn attempt(&self, matcher: &ConceptMatcher, source_value: &str, domain: &str) -> Option<ConceptSuggestion> {
        let candidates = matcher.vocabulary.search_by_text(source_value, Some(domain), EMBEDDING_CANDIDATE_K);
        if candidates.is_empty() {
            return None;
        }

        let source_embedding = matcher.embedding.embed(source_value).await.ok()?;

        let mut best: Option<(OmopConcept, f64)> = None;
        for concept in candidates {
            let candidate_embedding = matcher.embedding.embed(&concept.concept_name).await.ok()?;
            let score = cosine_similarity(&source_embedding, &candidate_embedding);
            if best.as_ref().map(|(_, best_score)| score > *best_score).unwrap_or(true) {
                best = Some((concept, score));
            }
        }

        let (concept, score) = best?;
        if score < EMBEDDING_MATCH_THRESHOLD {
            return None;
        }

        Some(ConceptSuggestion {
            source_value: source_value.to_string(),
            concept_id: Some(concept.concept_id),
            concept_name: Some(concept.concept_name),
            confidence: score,
            stage: "embedding",
            match_found: true,
        })
    }
}

/// Stage 3: ask the reasoning model to rank the same candidate pool.
struct ReasoningStage;

#[async_trait]
impl ConceptMatchStage for ReasoningStage {
    async fn attempt(&self, matcher: &ConceptMatcher, source_value: &str, domain: &str) -> Option<ConceptSuggestion> {
        rank_candidates(matcher, source_value, domain, REASONING_MATCH_THRESHOLD, "reasoning").await
    }
}

/// Stage 4: last resort before giving up. Same mechanism as stage 3 with a
/// lower acceptance bar, modeling a secondary/fallback model consulted only
/// once the primary reasoning pass declined.
struct ExternalFallbackStage;

#[async_trait]
impl ConceptMatchStage for ExternalFallbackStage {
    async fn attempt(&self, matcher: &ConceptMatcher, source_value: &str, domain: &str) -> Option<ConceptSuggestion> {
        rank_candidates(matcher, source_value, domain, EXTERNAL_FALLBACK_THRESHOLD, "external_fallback").await
    }
}

async fn rank_candidates(
    matcher: &ConceptMatcher,
    source_value: &str,
    domain: &str,
    threshold: f64,
    stage: &'static str,
) -> Option<ConceptSuggestion> {
    let candidates = matcher.vocabulary.search_by_text(source_value, Some(domain), REASONING_CANDIDATE_K);
    if candidates.is_empty() {
        return None;
    }

    let names: Vec<String> = candidates.iter().map(|c| c.concept_name.clone()).collect();
    let scores = matcher.llm.rank(source_value, &names).await.ok()?;

    let (best_idx, best_score) = scores
        .iter()
        .enumerate()
        .fold((0usize, f64::MIN), |acc, (i, &s)| if s > acc.1 { (i, s) } else { acc });

    if best_score < threshold {
        return None;
    }

    let concept = candidates.get(best_idx)?;
    Some(ConceptSuggestion {
        source_value: source_value.to_string(),
        concept_id: Some(concept.concept_id),
        concept_name: Some(concept.concept_name.clone()),
        confidence: best_score.clamp(0.0, 1.0),
        stage,
        match_found: true,
    })
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
