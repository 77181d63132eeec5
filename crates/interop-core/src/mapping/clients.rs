//! External collaborators for the embedding and reasoning stages of the AI
//! Mapping Engine and OMOP Concept Matcher (spec.md §4.6, §4.11, §9).
//!
//! Both are modeled as small async traits with an HTTP-backed implementation
//! and a null implementation that always reports `degraded`, so the engines
//! run lexical-only / direct-lookup-only when no external AI infrastructure
//! is configured (spec.md §9).

use std::time::Duration;

use async_trait::async_trait;
use interop_common::BridgeError;
use serde::{Deserialize, Serialize};

use super::cache::TtlCache;

const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(15);
const LLM_TIMEOUT: Duration = Duration::from_secs(60);
const QUERY_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
const CACHE_CAPACITY: usize = 500;

/// Outcome of the reasoning stage for one candidate field-mapping pair
/// (spec.md §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingReasoning {
    pub reasoning: String,
    pub clinical_context: Option<String>,
    pub type_compatible: bool,
    /// Clamped to `[-0.2, 0.2]` by the engine before use.
    pub confidence_adjust: f64,
}

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BridgeError>;
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Ranks `candidates` against `query`, returning one relevance score per
    /// candidate in the same order (used by both the Mapping Engine's
    /// reasoning stage and the Concept Matcher's reasoning stage).
    async fn rank(&self, query: &str, candidates: &[String]) -> Result<Vec<f64>, BridgeError>;

    /// Explains why `source_field` maps to `target_field`, producing the
    /// structured reasoning output spec.md §4.6 requires.
    async fn explain(&self, source_field: &str, target_field: &str) -> Result<MappingReasoning, BridgeError>;
}

/// Always reports the backend as unreachable, driving `degraded=true` on
/// engine results (spec.md §4.6, §9).
pub struct NullEmbeddingClient;

#[async_trait]
impl EmbeddingClient for NullEmbeddingClient {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, BridgeError> {
        Err(BridgeError::Degraded("embedding backend not configured".to_string()))
    }
}

pub struct NullLlmClient;

#[async_trait]
impl LlmClient for NullLlmClient {
    async fn rank(&self, _query: &str, _candidates: &[String]) -> Result<Vec<f64>, BridgeError> {
        Err(BridgeError::Degraded("LLM backend not configured".to_string()))
    }

    async fn explain(&self, _source_field: &str, _target_field: &str) -> Result<MappingReasoning, BridgeError> {
        Err(BridgeError::Degraded("LLM backend not configured".to_string()))
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Embeddings are cached indefinitely within the process, keyed by input
/// text hash (spec.md §5: "unbounded-within-process dictionary for
/// embeddings" — realized here as a large-capacity, no-TTL LRU so memory
/// still bounds under pathological input volume).
pub struct HttpEmbeddingClient {
    http: reqwest::Client,
    base_url: String,
    cache: TtlCache<String, Vec<f32>>,
}

impl HttpEmbeddingClient {
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(EMBEDDING_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http, base_url, cache: TtlCache::new(CACHE_CAPACITY, None) }
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BridgeError> {
        if let Some(cached) = self.cache.get(&text.to_string()) {
            return Ok(cached);
        }

        let response = self
            .http
            .post(&self.base_url)
            .json(&EmbedRequest { text })
            .send()
            .await
            .map_err(|e| BridgeError::Network(e.to_string()))?
            .error_for_status()
            .map_err(|e| BridgeError::Network(e.to_string()))?
            .json::<EmbedResponse>()
            .await
            .map_err(|e| BridgeError::Parse(e.to_string()))?;

        self.cache.put(text.to_string(), response.embedding.clone());
        Ok(response.embedding)
    }
}

#[derive(Serialize)]
struct RankRequest<'a> {
    model: &'a str,
    query: &'a str,
    candidates: &'a [String],
}

#[derive(Deserialize)]
struct RankResponse {
    scores: Vec<f64>,
}

#[derive(Serialize)]
struct ExplainRequest<'a> {
    model: &'a str,
    source_field: &'a str,
    target_field: &'a str,
}

pub struct HttpLlmClient {
    http: reqwest::Client,
    base_url: String,
    model_name: String,
    rank_cache: TtlCache<String, Vec<f64>>,
    explain_cache: TtlCache<String, MappingReasoning>,
}

impl HttpLlmClient {
    pub fn new(base_url: String, model_name: String) -> Self {
        let http = reqwest::Client::builder().timeout(LLM_TIMEOUT).build().unwrap_or_default();
        Self {
            http,
            base_url,
            model_name,
            rank_cache: TtlCache::new(CACHE_CAPACITY, Some(QUERY_CACHE_TTL)),
            explain_cache: TtlCache::new(CACHE_CAPACITY, Some(QUERY_CACHE_TTL)),
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn rank(&self, query: &str, candidates: &[String]) -> Result<Vec<f64>, BridgeError> {
        let cache_key = format!("{query}::{}", candidates.join(","));
        if let Some(cached) = self.rank_cache.get(&cache_key) {
            return Ok(cached);
        }

        let response = self
            .http
            .post(format!("{}/rank", self.base_url))
            .json(&RankRequest { model: &self.model_name, query, candidates })
            .send()
            .await
            .map_err(|e| BridgeError::Network(e.to_string()))?
            .error_for_status()
            .map_err(|e| BridgeError::Network(e.to_string()))?
            .json::<RankResponse>()
            .await
            .map_err(|e| BridgeError::Parse(e.to_string()))?;

        self.rank_cache.put(cache_key, response.scores.clone());
        Ok(response.scores)
    }

    async fn explain(&self, source_field: &str, target_field: &str) -> Result<MappingReasoning, BridgeError> {
        let cache_key = format!("{source_field}::{target_field}");
        if let Some(cached) = self.explain_cache.get(&cache_key) {
            return Ok(cached);
        }

        let reasoning = self
            .http
            .post(format!("{}/explain", self.base_url))
            .json(&ExplainRequest { model: &self.model_name, source_field, target_field })
            .send()
            .await
            .map_err(|e| BridgeError::Network(e.to_string()))?
            .error_for_status()
            .map_err(|e| BridgeError::Network(e.to_string()))?
            .json::<MappingReasoning>()
            .await
            .map_err(|e| BridgeError::Parse(e.to_string()))?;

        self.explain_cache.put(cache_key, reasoning.clone());
        Ok(reasoning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_embedding_client_always_reports_degraded() {
        let result = NullEmbeddingClient.embed("first_name").await;
        assert!(matches!(result, Err(BridgeError::Degraded(_))));
    }

    #[tokio::test]
    async fn null_llm_client_always_reports_degraded() {
        assert!(matches!(NullLlmClient.rank("q", &[]).await, Err(BridgeError::Degraded(_))));
        assert!(matches!(NullLlmClient.explain("a", "b").await, Err(BridgeError::Degraded(_))));
    }
}
