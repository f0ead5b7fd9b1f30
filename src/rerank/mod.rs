//! Second-stage reranking
//!
//! A relevance scorer assigns one score per (query, candidate text) pair in
//! a single batched call; candidates are then stably sorted by that score.
//! Reranking is a quality pass only: any scorer failure keeps the
//! retrieval order.

pub mod http;
pub mod scorer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::errors::{Result, ShopError};
use crate::pipeline::Deadline;
use crate::telemetry::Degradation;
use crate::types::Candidate;

pub use http::HttpCrossEncoder;
pub use scorer::{order_by_scores, KeywordScorer};

/// Cross-encoder style relevance capability
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    fn name(&self) -> &str;

    /// One score per text, in input order. Higher is more relevant.
    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankProvider {
    /// Text-embeddings-inference style `/rerank` endpoint
    Http,
    /// Local token-overlap scorer
    Keyword,
}

/// Reranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub enabled: bool,
    pub provider: RerankProvider,
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: RerankProvider::Http,
            url: "http://localhost:8080".to_string(),
            timeout_ms: 5_000,
        }
    }
}

impl RerankConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Build the configured scorer; `None` when reranking is disabled
pub fn build_scorer(config: &RerankConfig) -> Result<Option<Arc<dyn RelevanceScorer>>> {
    if !config.enabled {
        return Ok(None);
    }
    let scorer: Arc<dyn RelevanceScorer> = match config.provider {
        RerankProvider::Http => Arc::new(HttpCrossEncoder::from_config(config)?),
        RerankProvider::Keyword => Arc::new(KeywordScorer),
    };
    Ok(Some(scorer))
}

pub struct Reranker {
    scorer: Option<Arc<dyn RelevanceScorer>>,
    timeout: Duration,
}

impl Reranker {
    pub fn new(scorer: Option<Arc<dyn RelevanceScorer>>, timeout: Duration) -> Self {
        Self { scorer, timeout }
    }

    /// Pass-through reranker
    pub fn disabled() -> Self {
        Self::new(None, Duration::ZERO)
    }

    /// Rerank with the configured timeout
    pub async fn rerank(&self, query: &str, candidates: Vec<Candidate>) -> Vec<Candidate> {
        self.rerank_within(query, candidates, &Deadline::unbounded()).await.0
    }

    /// Rerank with the timeout clipped to `deadline`. On failure the input
    /// order is returned with the reason.
    pub async fn rerank_within(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
        deadline: &Deadline,
    ) -> (Vec<Candidate>, Option<Degradation>) {
        let Some(scorer) = &self.scorer else {
            return (candidates, None);
        };
        if candidates.is_empty() {
            return (candidates, None);
        }

        let texts: Vec<String> = candidates.iter().map(Candidate::rerank_text).collect();
        let timeout = deadline.clip(self.timeout);

        let scores = match tokio::time::timeout(timeout, scorer.score(query, &texts)).await {
            Ok(Ok(scores)) if scores.len() == candidates.len() => scores,
            Ok(Ok(scores)) => {
                return degraded(
                    candidates,
                    ShopError::Rerank(format!(
                        "scorer returned {} scores for {} candidates",
                        scores.len(),
                        texts.len()
                    )),
                )
            }
            Ok(Err(e)) => return degraded(candidates, e),
            Err(_) => {
                return degraded(
                    candidates,
                    ShopError::Timeout {
                        operation: "rerank",
                        duration_ms: timeout.as_millis() as u64,
                    },
                )
            }
        };

        debug!(scorer = scorer.name(), candidates = texts.len(), "reranked");
        (order_by_scores(candidates, &scores), None)
    }
}

fn degraded(candidates: Vec<Candidate>, error: ShopError) -> (Vec<Candidate>, Option<Degradation>) {
    (
        candidates,
        Some(Degradation::RerankDegraded {
            reason: error.to_string(),
        }),
    )
}
