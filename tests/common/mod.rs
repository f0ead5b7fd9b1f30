//! Shared fixtures for the pipeline integration tests
//!
//! Everything runs in-process: a hashing embedder over a small in-memory
//! catalog, and scripted collaborators standing in for the LLM, the store
//! and the reranker.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use shoptalk::answer::{AnswerComposer, AnswerConfig};
use shoptalk::embedding::{Embedder, HashingEmbedder};
use shoptalk::filter::FilterExpr;
use shoptalk::llm::{CompletionRequest, LanguageModel};
use shoptalk::parser::{ParserConfig, QueryParser};
use shoptalk::rerank::{RelevanceScorer, Reranker};
use shoptalk::retrieval::{RetrievalConfig, Retriever, RetrieverTimeouts};
use shoptalk::store::{InMemoryStore, VectorStore};
use shoptalk::types::{ProductRecord, StoreHit};
use shoptalk::{Components, Pipeline, PipelineConfig, Result, ShopError};

pub const DIM: usize = 64;

/// id, title, color, price, category
pub const CATALOG: &[(&str, &str, &str, f64, &str)] = &[
    ("s1", "Red running shoes", "red", 80.0, "SHOES"),
    ("s2", "Red trail running shoes", "red", 95.0, "SHOES"),
    ("s3", "Red racing running shoes", "red", 140.0, "SHOES"),
    ("s4", "Blue running shoes", "blue", 60.0, "SHOES"),
    ("s5", "Red leather boots", "red", 180.0, "BOOT"),
    ("s6", "Ceramic coffee mug", "white", 12.0, "KITCHEN"),
];

pub fn catalog() -> Arc<InMemoryStore> {
    let embedder = HashingEmbedder::new(DIM);
    let records = CATALOG
        .iter()
        .map(|(id, title, color, price, category)| ProductRecord {
            id: id.to_string(),
            vector: embedder.encode(title).unwrap(),
            metadata: json!({
                "title": title,
                "color": color,
                "price": price,
                "product_type": category,
                "category": category,
            })
            .as_object()
            .cloned()
            .unwrap(),
        })
        .collect();
    Arc::new(InMemoryStore::from_records(records))
}

pub fn price_of(id: &str) -> f64 {
    CATALOG
        .iter()
        .find(|(item, ..)| *item == id)
        .map(|(_, _, _, price, _)| *price)
        .unwrap()
}

/// How a scripted call behaves
#[derive(Clone)]
pub enum Script {
    Reply(String),
    Fail,
    Stall(Duration),
}

impl Script {
    pub fn reply(text: &str) -> Self {
        Script::Reply(text.to_string())
    }
}

/// LLM that answers extraction requests and generation requests separately
pub struct ScriptedLlm {
    parse: Script,
    answer: Script,
    pub parse_calls: AtomicUsize,
    pub answer_calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(parse: Script, answer: Script) -> Self {
        Self {
            parse,
            answer,
            parse_calls: AtomicUsize::new(0),
            answer_calls: AtomicUsize::new(0),
        }
    }

    pub fn answer_calls(&self) -> usize {
        self.answer_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        // Extraction requests carry a response schema
        let script = if request.wants_json() {
            self.parse_calls.fetch_add(1, Ordering::SeqCst);
            &self.parse
        } else {
            self.answer_calls.fetch_add(1, Ordering::SeqCst);
            &self.answer
        };

        match script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Fail => Err(ShopError::Llm("HTTP 503".to_string())),
            Script::Stall(duration) => {
                tokio::time::sleep(*duration).await;
                Ok("too late".to_string())
            }
        }
    }
}

/// Store whose search always fails
pub struct FailingStore;

#[async_trait]
impl VectorStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn upsert(&self, _records: Vec<ProductRecord>) -> Result<()> {
        Ok(())
    }

    async fn query(&self, _vector: &[f32], _filter: Option<&FilterExpr>, _k: usize) -> Result<Vec<StoreHit>> {
        Err(ShopError::Store("connection refused".to_string()))
    }

    async fn count(&self) -> Result<u64> {
        Err(ShopError::Store("connection refused".to_string()))
    }
}

/// Scorer returning canned scores, or failing when `None`
pub struct FixedScorer(pub Option<Vec<f32>>);

#[async_trait]
impl RelevanceScorer for FixedScorer {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn score(&self, _query: &str, texts: &[String]) -> Result<Vec<f32>> {
        match &self.0 {
            Some(scores) => Ok(scores.iter().copied().take(texts.len()).collect()),
            None => Err(ShopError::Rerank("sidecar unavailable".to_string())),
        }
    }
}

/// Builder over `Components` with test-friendly timeouts
pub struct Harness {
    pub llm: Arc<ScriptedLlm>,
    pub store: Arc<dyn VectorStore>,
    pub reranker: Reranker,
    pub answer: AnswerConfig,
    pub retrieval: RetrievalConfig,
}

impl Harness {
    pub fn new(llm: ScriptedLlm) -> Self {
        Self {
            llm: Arc::new(llm),
            store: catalog(),
            reranker: Reranker::disabled(),
            answer: AnswerConfig {
                top_n: 5,
                timeout_ms: 2_000,
                temperature: 0.2,
            },
            retrieval: RetrievalConfig::default(),
        }
    }

    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = store;
        self
    }

    pub fn reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn answer_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.answer.timeout_ms = timeout_ms;
        self
    }

    pub fn build(self) -> Pipeline {
        let llm: Arc<dyn LanguageModel> = self.llm;
        let components = Components {
            parser: QueryParser::new(
                Arc::clone(&llm),
                "parse-model",
                ParserConfig {
                    timeout_ms: 500,
                    temperature: 0.0,
                },
            ),
            retriever: Retriever::new(
                Arc::new(HashingEmbedder::new(DIM)),
                Arc::clone(&self.store),
                self.retrieval,
                RetrieverTimeouts::default(),
            ),
            reranker: self.reranker,
            composer: AnswerComposer::new(Arc::clone(&llm), "answer-model", self.answer),
            store: self.store,
            llm,
        };
        Pipeline::new(components, PipelineConfig::default())
    }
}

/// Extraction reply for "red running shoes under $100"
pub const RED_SHOES_EXTRACTION: &str =
    r#"{"search_phrase": "running shoes", "color": "red", "price_max": 100}"#;
