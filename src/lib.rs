//! ShopTalk - Conversational product search
//!
//! Turns a free-text shopping query into a ranked list of catalog products
//! and a short natural-language answer grounded in those products.
//!
//! # Architecture
//!
//! - **parser**: LLM extraction of a search phrase and attribute filters
//! - **filter**: predicate validation, store filter compilation, widening plans
//! - **retrieval**: query embedding plus filtered vector search
//! - **rerank**: optional cross-encoder reordering
//! - **answer**: grounded answer generation with a template fallback
//! - **pipeline**: the per-request orchestration of all of the above

pub mod errors;
pub mod types;
pub mod telemetry;
pub mod config;

// Collaborators
pub mod llm;
pub mod embedding;
pub mod store;

// Pipeline stages
pub mod parser;
pub mod filter;
pub mod retrieval;
pub mod rerank;
pub mod answer;
pub mod pipeline;

pub mod cli;

// Re-export commonly used types
pub use config::Config;
pub use errors::{Result, RetrievalStage, ShopError};
pub use pipeline::{Components, HealthReport, Pipeline, PipelineConfig};
pub use telemetry::Degradation;
pub use types::{AnswerResponse, Candidate, Predicate, StructuredQuery};
