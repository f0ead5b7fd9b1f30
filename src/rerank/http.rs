//! HTTP cross-encoder client
//!
//! Speaks the text-embeddings-inference rerank API:
//! POST {url}/rerank `{"query", "texts"}` -> `[{"index", "score"}]`.
//! Results may come back sorted by score; they are mapped back by index.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ShopError};
use crate::rerank::{RelevanceScorer, RerankConfig};

#[derive(Debug, Clone)]
pub struct HttpCrossEncoder {
    client: Client,
    base_url: String,
}

impl HttpCrossEncoder {
    pub fn from_config(config: &RerankConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(ShopError::Http)?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    raw_scores: bool,
}

#[derive(Debug, Deserialize)]
struct RankedText {
    index: usize,
    score: f32,
}

/// Put scores back in input order; every index must appear exactly once
fn scores_in_order(ranked: Vec<RankedText>, expected: usize) -> Result<Vec<f32>> {
    let mut scores = vec![None; expected];
    for item in ranked {
        match scores.get_mut(item.index) {
            Some(slot) if slot.is_none() => *slot = Some(item.score),
            Some(_) => {
                return Err(ShopError::Rerank(format!("duplicate index {}", item.index)))
            }
            None => return Err(ShopError::Rerank(format!("index {} out of range", item.index))),
        }
    }
    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| ShopError::Rerank(format!("missing score for index {}", i))))
        .collect()
}

#[async_trait]
impl RelevanceScorer for HttpCrossEncoder {
    fn name(&self) -> &str {
        "cross-encoder"
    }

    async fn score(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        let url = format!("{}/rerank", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&RerankRequest {
                query,
                texts,
                raw_scores: false,
            })
            .send()
            .await
            .map_err(|e| ShopError::Rerank(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ShopError::Rerank(format!("HTTP {}: {}", status, error_text)));
        }

        let ranked: Vec<RankedText> = response
            .json()
            .await
            .map_err(|e| ShopError::Rerank(format!("Failed to parse response: {}", e)))?;

        scores_in_order(ranked, texts.len())
    }
}
