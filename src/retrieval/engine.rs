//! Retrieval engine
//!
//! `encode -> search(full filter) -> search(partial_1) -> ... -> search(unfiltered)`.
//! The stage list comes from `filter::plan`; the loop stops at the first
//! non-empty result. Encoder and store errors are fatal and carry the
//! stage that failed; they are never retried.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::errors::{Result, RetrievalStage, ShopError};
use crate::filter::{plan, FilterCompiler, FilterExpr};
use crate::pipeline::Deadline;
use crate::retrieval::RetrievalConfig;
use crate::store::VectorStore;
use crate::telemetry::Degradation;
use crate::types::{Candidate, Predicate, StoreHit, StructuredQuery};

/// Per-call ceilings on the two collaborator calls
#[derive(Debug, Clone, Copy)]
pub struct RetrieverTimeouts {
    pub encode: Duration,
    pub search: Duration,
}

impl Default for RetrieverTimeouts {
    fn default() -> Self {
        Self {
            encode: Duration::from_secs(5),
            search: Duration::from_secs(5),
        }
    }
}

/// Candidates plus the conditions recovered on the way
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub candidates: Vec<Candidate>,
    /// Predicates that passed validation, normalized
    pub accepted: Vec<Predicate>,
    pub degradations: Vec<Degradation>,
    /// Number of searches issued
    pub searches: usize,
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    compiler: FilterCompiler,
    config: RetrievalConfig,
    timeouts: RetrieverTimeouts,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        config: RetrievalConfig,
        timeouts: RetrieverTimeouts,
    ) -> Self {
        Self {
            embedder,
            store,
            compiler: FilterCompiler::new(config.categories.clone()),
            config,
            timeouts,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn compiler(&self) -> &FilterCompiler {
        &self.compiler
    }

    /// Reject `k` outside `1..=max_k`
    pub fn check_k(&self, k: usize) -> Result<()> {
        if k == 0 || k > self.config.max_k {
            return Err(ShopError::InvalidK {
                k,
                max: self.config.max_k,
            });
        }
        Ok(())
    }

    /// Retrieve up to `k` candidates with no request deadline
    pub async fn retrieve(&self, query: &StructuredQuery, k: usize) -> Result<Vec<Candidate>> {
        self.retrieve_within(query, k, &Deadline::unbounded())
            .await
            .map(|retrieval| retrieval.candidates)
    }

    /// Retrieve up to `k` candidates, clipping every call to `deadline`
    pub async fn retrieve_within(
        &self,
        query: &StructuredQuery,
        k: usize,
        deadline: &Deadline,
    ) -> Result<Retrieval> {
        self.check_k(k)?;

        let compiled = self.compiler.compile(&query.filters);
        let stages = plan(&compiled.accepted, &self.config.widening_order);
        let mut retrieval = Retrieval {
            accepted: compiled.accepted,
            degradations: compiled.rejected,
            ..Default::default()
        };

        let vector = self.encode(&query.search_phrase, deadline).await?;

        let mut hits = Vec::new();
        for (index, stage) in stages.iter().enumerate() {
            let expr = FilterExpr::from_valid(&stage.predicates);
            hits = self.search(&vector, expr.as_option(), k, deadline).await?;
            retrieval.searches += 1;

            if !hits.is_empty() {
                if index > 0 {
                    info!(dropped = ?stage.dropped, attempts = index + 1, "widened filter found results");
                    retrieval.degradations.push(Degradation::Widened {
                        dropped: stage.dropped.clone(),
                        attempts: index + 1,
                    });
                }
                break;
            }
        }

        // Stores may over-return; never pad
        hits.truncate(k);
        retrieval.candidates = hits.into_iter().map(Candidate::from_hit).collect();
        Ok(retrieval)
    }

    async fn encode(&self, phrase: &str, deadline: &Deadline) -> Result<Vec<f32>> {
        let timeout = deadline.clip(self.timeouts.encode);
        let embedder = Arc::clone(&self.embedder);
        let text = phrase.to_string();
        let started = Instant::now();

        let vector = match tokio::time::timeout(
            timeout,
            tokio::task::spawn_blocking(move || embedder.encode(&text)),
        )
        .await
        {
            Ok(Ok(Ok(vector))) => vector,
            Ok(Ok(Err(e))) => return Err(ShopError::retrieval(RetrievalStage::Encode, e)),
            Ok(Err(join)) => return Err(ShopError::retrieval(RetrievalStage::Encode, join)),
            Err(_) => {
                return Err(ShopError::retrieval(
                    RetrievalStage::Encode,
                    format!("timed out after {}ms", timeout.as_millis()),
                ))
            }
        };

        debug!(
            embedder = self.embedder.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query encoded"
        );
        Ok(vector)
    }

    async fn search(
        &self,
        vector: &[f32],
        filter: Option<&FilterExpr>,
        k: usize,
        deadline: &Deadline,
    ) -> Result<Vec<StoreHit>> {
        if deadline.is_expired() {
            return Err(ShopError::retrieval(
                RetrievalStage::Search,
                "request deadline exceeded",
            ));
        }
        let timeout = deadline.clip(self.timeouts.search);
        let started = Instant::now();

        let hits = match tokio::time::timeout(timeout, self.store.query(vector, filter, k)).await {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => return Err(ShopError::retrieval(RetrievalStage::Search, e)),
            Err(_) => {
                return Err(ShopError::retrieval(
                    RetrievalStage::Search,
                    format!("timed out after {}ms", timeout.as_millis()),
                ))
            }
        };

        debug!(
            store = self.store.name(),
            filtered = filter.is_some(),
            hits = hits.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "vector search finished"
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::store::InMemoryStore;
    use crate::types::{FilterField, ProductRecord};
    use async_trait::async_trait;
    use serde_json::json;

    const DIM: usize = 64;

    async fn catalog() -> Arc<InMemoryStore> {
        let embedder = HashingEmbedder::new(DIM);
        let items = [
            ("r1", "Red running shoes", "red", 80.0, "SHOES"),
            ("r2", "Blue running shoes", "blue", 60.0, "SHOES"),
            ("r3", "Red leather boots", "red", 180.0, "BOOT"),
            ("r4", "Ceramic coffee mug", "white", 12.0, "KITCHEN"),
        ];
        let records = items
            .iter()
            .map(|(id, title, color, price, category)| ProductRecord {
                id: id.to_string(),
                vector: embedder.encode(title).unwrap(),
                metadata: json!({"title": title, "color": color, "price": price, "category": category})
                    .as_object()
                    .cloned()
                    .unwrap(),
            })
            .collect();
        Arc::new(InMemoryStore::from_records(records))
    }

    async fn retriever() -> Retriever {
        Retriever::new(
            Arc::new(HashingEmbedder::new(DIM)),
            catalog().await,
            RetrievalConfig::default(),
            RetrieverTimeouts::default(),
        )
    }

    #[tokio::test]
    async fn test_k_bounds() {
        let retriever = retriever().await;
        let query = StructuredQuery::raw("shoes");
        assert!(matches!(
            retriever.retrieve(&query, 0).await,
            Err(ShopError::InvalidK { k: 0, max: 50 })
        ));
        assert!(matches!(
            retriever.retrieve(&query, 51).await,
            Err(ShopError::InvalidK { .. })
        ));
    }

    #[tokio::test]
    async fn test_filtered_search_respects_predicates() {
        let retriever = retriever().await;
        let query = StructuredQuery::new(
            "running shoes",
            "red running shoes under $100",
            vec![Predicate::text(FilterField::Color, "red"), Predicate::price_max(100.0)],
        );
        let retrieval = retriever
            .retrieve_within(&query, 10, &Deadline::unbounded())
            .await
            .unwrap();

        assert_eq!(retrieval.searches, 1);
        assert!(retrieval.degradations.is_empty());
        let ids: Vec<_> = retrieval.candidates.iter().map(|c| c.item_id.as_str()).collect();
        assert_eq!(ids, vec!["r1"]);
    }

    #[tokio::test]
    async fn test_widening_drops_category_first() {
        let retriever = retriever().await;
        let query = StructuredQuery::new(
            "shoes",
            "shoes",
            vec![
                Predicate::text(FilterField::Category, "SPACESHIPS"),
                Predicate::text(FilterField::Color, "blue"),
            ],
        );
        let retrieval = retriever
            .retrieve_within(&query, 10, &Deadline::unbounded())
            .await
            .unwrap();

        assert_eq!(retrieval.searches, 2);
        assert_eq!(retrieval.candidates[0].item_id, "r2");
        assert!(matches!(
            &retrieval.degradations[0],
            Degradation::Widened { dropped, attempts: 2 } if dropped == &vec![FilterField::Category]
        ));
    }

    #[tokio::test]
    async fn test_caps_at_k_without_padding() {
        let retriever = retriever().await;
        let query = StructuredQuery::raw("shoes");
        assert_eq!(retriever.retrieve(&query, 2).await.unwrap().len(), 2);
        assert_eq!(retriever.retrieve(&query, 10).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_catalog_is_not_an_error() {
        let retriever = Retriever::new(
            Arc::new(HashingEmbedder::new(DIM)),
            Arc::new(InMemoryStore::new()),
            RetrievalConfig::default(),
            RetrieverTimeouts::default(),
        );
        let query = StructuredQuery::new("shoes", "shoes", vec![Predicate::price_max(10.0)]);
        let retrieval = retriever
            .retrieve_within(&query, 5, &Deadline::unbounded())
            .await
            .unwrap();
        assert!(retrieval.candidates.is_empty());
        assert_eq!(retrieval.searches, 2);
    }

    struct BrokenEmbedder;

    impl Embedder for BrokenEmbedder {
        fn name(&self) -> &str {
            "broken"
        }

        fn dimension(&self) -> usize {
            DIM
        }

        fn encode(&self, _text: &str) -> Result<Vec<f32>> {
            Err(ShopError::Embedding("model not loaded".to_string()))
        }
    }

    struct StalledStore;

    #[async_trait]
    impl VectorStore for StalledStore {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn upsert(&self, _records: Vec<ProductRecord>) -> Result<()> {
            Ok(())
        }

        async fn query(&self, _v: &[f32], _f: Option<&FilterExpr>, _k: usize) -> Result<Vec<StoreHit>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }

        async fn count(&self) -> Result<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_encoder_failure_is_typed() {
        let retriever = Retriever::new(
            Arc::new(BrokenEmbedder),
            catalog().await,
            RetrievalConfig::default(),
            RetrieverTimeouts::default(),
        );
        let err = retriever.retrieve(&StructuredQuery::raw("shoes"), 5).await.unwrap_err();
        assert!(matches!(
            err,
            ShopError::RetrievalFailure {
                stage: RetrievalStage::Encode,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_search_timeout_is_retrieval_failure() {
        let retriever = Retriever::new(
            Arc::new(HashingEmbedder::new(DIM)),
            Arc::new(StalledStore),
            RetrievalConfig::default(),
            RetrieverTimeouts {
                encode: Duration::from_secs(1),
                search: Duration::from_millis(20),
            },
        );
        let err = retriever.retrieve(&StructuredQuery::raw("shoes"), 5).await.unwrap_err();
        assert!(matches!(
            err,
            ShopError::RetrievalFailure {
                stage: RetrievalStage::Search,
                ..
            }
        ));
    }
}
