//! AI Mapping Engine (C6), Resource Predictor (C7), and Mapping Workflow
//! (C8) — the schema-mapping half of the pipeline (spec.md §4.6-§4.8).

pub mod ai_mapping_engine;
pub mod cache;
pub mod clients;
pub mod indicator_scorer;
pub mod lexical;
pub mod resource_predictor;
pub mod workflow;

pub use ai_mapping_engine::{AiMappingEngine, MappingSuggestions};
pub use clients::{EmbeddingClient, HttpEmbeddingClient, HttpLlmClient, LlmClient, MappingReasoning, NullEmbeddingClient, NullLlmClient};
pub use resource_predictor::{predict as predict_resource_type, ResourcePrediction};
pub use workflow::WorkflowError;
