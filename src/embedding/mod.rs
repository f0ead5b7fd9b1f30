//! Query embedding
//!
//! The embedder is a synchronous, CPU-bound capability; the retriever runs
//! it on the blocking pool under a timeout. Identical input always yields
//! the identical vector.

pub mod candle;
pub mod hashing;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::Result;

pub use self::candle::CandleEmbedder;
pub use hashing::HashingEmbedder;

/// Text to vector capability
pub trait Embedder: Send + Sync {
    /// Model label for logs
    fn name(&self) -> &str;

    /// Output dimension
    fn dimension(&self) -> usize;

    /// Encode a search query. Any model-specific instruction prefix is
    /// applied by the implementation.
    fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Sentence-transformer model run locally with candle
    Candle,
    /// Feature-hashed bag of words, no model download
    Hashing,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    /// HuggingFace model id
    pub model_id: String,
    pub dimension: usize,
    /// Explicit query prefix; `None` picks one from the model family
    pub query_prefix: Option<String>,
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Candle,
            model_id: "intfloat/e5-base-v2".to_string(),
            dimension: 768,
            query_prefix: None,
            timeout_ms: 5_000,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Prefix prepended to queries. e5 and gte models were trained with
    /// `query: ` / `passage: ` markers; the catalog was indexed with `passage: `.
    pub fn effective_query_prefix(&self) -> String {
        if let Some(prefix) = &self.query_prefix {
            return prefix.clone();
        }
        let model = self.model_id.to_lowercase();
        if model.contains("e5") || model.contains("gte") {
            "query: ".to_string()
        } else {
            String::new()
        }
    }
}

/// L2-normalize in place. Zero vectors are left untouched.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Build the configured embedder. Candle downloads weights on first use.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.provider {
        EmbeddingProvider::Candle => Arc::new(CandleEmbedder::from_config(config)?),
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(config.dimension)),
    };
    Ok(embedder)
}
