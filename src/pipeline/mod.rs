//! Query-to-answer pipeline
//!
//! `parse -> compile -> retrieve (widen on empty) -> rerank -> compose`,
//! run sequentially per request under one deadline. Only request
//! validation errors and `RetrievalFailure` reach the caller; every other
//! failure is absorbed by its stage's fallback and reported in
//! `AnswerResponse::diagnostics`.

pub mod deadline;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::answer::AnswerComposer;
use crate::config::Config;
use crate::embedding::build_embedder;
use crate::errors::{Result, ShopError};
use crate::llm::{build_llm, LanguageModel};
use crate::parser::QueryParser;
use crate::rerank::{build_scorer, Reranker};
use crate::retrieval::{Retriever, RetrieverTimeouts};
use crate::store::{build_store, VectorStore};
use crate::telemetry::Diagnostics;
use crate::types::{AnswerResponse, StructuredQuery};

pub use deadline::Deadline;

/// Request-level limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Longer queries are truncated, not rejected
    pub max_query_chars: usize,
    /// Upper bound on one `answer` call, all stages included
    pub request_budget_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_query_chars: 512,
            request_budget_ms: 45_000,
        }
    }
}

impl PipelineConfig {
    pub fn request_budget(&self) -> Duration {
        Duration::from_millis(self.request_budget_ms)
    }
}

/// Reachability of the external collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub store: String,
    /// Item count, when the store answered
    pub items: Option<u64>,
    pub store_error: Option<String>,
    pub llm: String,
    pub llm_reachable: bool,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.items.is_some() && self.llm_reachable
    }
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn truncate_query(query: &str, max_chars: usize) -> &str {
    match query.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &query[..byte_index],
        None => query,
    }
}

pub struct Pipeline {
    parser: QueryParser,
    retriever: Retriever,
    reranker: Reranker,
    composer: AnswerComposer,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LanguageModel>,
    config: PipelineConfig,
}

/// Collaborators for `Pipeline::new`
pub struct Components {
    pub parser: QueryParser,
    pub retriever: Retriever,
    pub reranker: Reranker,
    pub composer: AnswerComposer,
    /// Same store the retriever searches; used for health reporting
    pub store: Arc<dyn VectorStore>,
    /// Same model the parser and composer call; used for health reporting
    pub llm: Arc<dyn LanguageModel>,
}

impl Pipeline {
    pub fn new(components: Components, config: PipelineConfig) -> Self {
        let Components {
            parser,
            retriever,
            reranker,
            composer,
            store,
            llm,
        } = components;

        Self {
            parser,
            retriever,
            reranker,
            composer,
            store,
            llm,
            config,
        }
    }

    /// Build every collaborator from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let llm = build_llm(&config.llm)?;
        let embedder = build_embedder(&config.embedding)?;
        let store = build_store(&config.store)?;
        let scorer = build_scorer(&config.rerank)?;

        let components = Components {
            parser: QueryParser::new(Arc::clone(&llm), &config.llm.parse_model, config.parse.clone()),
            retriever: Retriever::new(
                embedder,
                Arc::clone(&store),
                config.retrieval.clone(),
                RetrieverTimeouts {
                    encode: config.embedding.timeout(),
                    search: config.store.timeout(),
                },
            ),
            reranker: Reranker::new(scorer, config.rerank.timeout()),
            composer: AnswerComposer::new(
                Arc::clone(&llm),
                &config.llm.answer_model,
                config.answer.clone(),
            ),
            store,
            llm,
        };

        Ok(Self::new(components, config.pipeline.clone()))
    }

    /// `k` used when the caller has no preference
    pub fn default_k(&self) -> usize {
        self.retriever.config().default_k
    }

    /// Answer one shopping query with up to `k` products
    pub async fn answer(&self, query: &str, k: usize) -> Result<AnswerResponse> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(ShopError::InvalidQuery("query is empty".to_string()));
        }
        self.retriever.check_k(k)?;

        let raw = truncate_query(trimmed, self.config.max_query_chars);
        if raw.len() < trimmed.len() {
            info!(
                max_chars = self.config.max_query_chars,
                "query truncated"
            );
        }

        let request_id = Uuid::new_v4();
        let span = info_span!("answer", %request_id, k);
        self.run(raw, k).instrument(span).await
    }

    async fn run(&self, raw: &str, k: usize) -> Result<AnswerResponse> {
        let deadline = Deadline::new(self.config.request_budget());
        let mut diagnostics = Diagnostics::new();

        let parsed = self.parser.parse_within(raw, deadline.remaining()).await;
        diagnostics.extend(parsed.degradations);

        let retrieval = self.retriever.retrieve_within(&parsed.query, k, &deadline).await?;
        diagnostics.extend(retrieval.degradations);

        let (results, rerank_issue) = self
            .reranker
            .rerank_within(raw, retrieval.candidates, &deadline)
            .await;
        diagnostics.extend(rerank_issue);

        let (answer_text, generation_issue) = self
            .composer
            .compose_within(raw, &retrieval.accepted, &results, &deadline)
            .await;
        diagnostics.extend(generation_issue);

        info!(
            results = results.len(),
            degradations = diagnostics.events().len(),
            elapsed_ms = deadline.elapsed().as_millis() as u64,
            "answered"
        );

        Ok(AnswerResponse {
            answer_text,
            results,
            query_echo: StructuredQuery {
                search_phrase: parsed.query.search_phrase,
                filters: retrieval.accepted,
            },
            diagnostics: diagnostics.into_events(),
        })
    }

    /// Store item count and LLM reachability
    pub async fn health(&self) -> HealthReport {
        let (items, store_error) = match self.store.count().await {
            Ok(count) => (Some(count), None),
            Err(e) => (None, Some(e.to_string())),
        };

        HealthReport {
            store: self.store.name().to_string(),
            items,
            store_error,
            llm: self.llm.name().to_string(),
            llm_reachable: self.llm.health_check().await,
        }
    }
}
