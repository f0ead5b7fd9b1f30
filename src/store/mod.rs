//! Vector store capability
//!
//! Nearest-neighbour search over catalog vectors with an optional metadata
//! filter. Implementations:
//! - `qdrant`: a Qdrant collection over gRPC
//! - `memory`: brute-force cosine search, for offline runs and tests

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::Result;
use crate::filter::FilterExpr;
use crate::types::{ProductRecord, StoreHit};

pub use memory::InMemoryStore;
pub use qdrant::QdrantStore;

/// Vector store consumed by the retriever
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend label for logs
    fn name(&self) -> &str;

    /// Insert or replace records by item id
    async fn upsert(&self, records: Vec<ProductRecord>) -> Result<()>;

    /// Up to `k` hits ordered by similarity, highest first
    async fn query(&self, vector: &[f32], filter: Option<&FilterExpr>, k: usize) -> Result<Vec<StoreHit>>;

    /// Number of stored items
    async fn count(&self) -> Result<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    Qdrant,
    Memory,
}

/// What the backend's raw score means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreKind {
    /// Higher is better (cosine, dot)
    Similarity,
    /// Lower is better; converted with `max(0, 1 - d)`
    Distance,
}

impl ScoreKind {
    pub fn to_similarity(&self, raw: f32) -> f32 {
        match self {
            ScoreKind::Similarity => raw,
            ScoreKind::Distance => (1.0 - raw).max(0.0),
        }
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub provider: StoreProvider,
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub timeout_ms: u64,
    pub score: ScoreKind,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: StoreProvider::Qdrant,
            url: "http://localhost:6334".to_string(),
            api_key: None,
            collection: "products".to_string(),
            timeout_ms: 5_000,
            score: ScoreKind::Similarity,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Build the configured store. The memory store starts empty.
pub fn build_store(config: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.provider {
        StoreProvider::Qdrant => Arc::new(QdrantStore::connect(config)?),
        StoreProvider::Memory => Arc::new(InMemoryStore::new()),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_similarity() {
        assert_eq!(ScoreKind::Similarity.to_similarity(0.7), 0.7);
        assert!((ScoreKind::Distance.to_similarity(0.25) - 0.75).abs() < 1e-6);
        assert_eq!(ScoreKind::Distance.to_similarity(1.8), 0.0);
    }

    #[test]
    fn test_store_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.provider, StoreProvider::Qdrant);
        assert_eq!(config.collection, "products");
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_build_memory_store() {
        let config = StoreConfig {
            provider: StoreProvider::Memory,
            ..Default::default()
        };
        let store = build_store(&config).unwrap();
        assert_eq!(store.name(), "memory");
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
