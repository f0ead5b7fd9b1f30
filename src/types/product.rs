//! Catalog items as they move through retrieval, reranking and answering
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::telemetry::Degradation;
use crate::types::query::StructuredQuery;

/// Free-form catalog metadata attached to a vector
pub type Metadata = Map<String, Value>;

/// Vector plus metadata written by ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
}

/// Raw nearest-neighbour hit returned by a vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreHit {
    pub id: String,
    /// Higher is more similar
    pub similarity: f32,
    pub metadata: Metadata,
}

/// A retrieved product, owned by a single request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub item_id: String,
    pub title: String,
    pub image_url: Option<String>,
    pub product_type: Option<String>,
    pub price: Option<f64>,
    /// Remaining metadata (brand, color, category, ...)
    pub attributes: Metadata,
    pub raw_similarity: f32,
    pub rerank_score: Option<f32>,
}

impl Candidate {
    /// Build a candidate from a store hit.
    ///
    /// Accepts both the `title`/`url` keys written by the index rebuild and
    /// the `item_name`/`image_url` columns of the raw catalog.
    pub fn from_hit(hit: StoreHit) -> Self {
        let StoreHit {
            id,
            similarity,
            mut metadata,
        } = hit;

        let title = take_string(&mut metadata, &["title", "item_name"])
            .unwrap_or_else(|| "(no title)".to_string());
        let image_url = take_string(&mut metadata, &["image_url", "url"]);
        let product_type = take_string(&mut metadata, &["product_type"]);
        let price = metadata.remove("price").and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });

        Self {
            item_id: id,
            title,
            image_url,
            product_type,
            price,
            attributes: metadata,
            raw_similarity: similarity,
            rerank_score: None,
        }
    }

    /// Text handed to the cross-encoder: title plus product type
    pub fn rerank_text(&self) -> String {
        match &self.product_type {
            Some(product_type) if !product_type.is_empty() => {
                format!("{} ({})", self.title, product_type)
            }
            _ => self.title.clone(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// Remove and return the first non-blank string among `keys`. Keys that are
/// skipped stay in `metadata`.
fn take_string(metadata: &mut Metadata, keys: &[&str]) -> Option<String> {
    let key = keys.iter().find(|key| {
        metadata
            .get(**key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty())
    })?;
    match metadata.remove(*key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Final pipeline output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer_text: String,
    /// Top-k, in final rank order
    pub results: Vec<Candidate>,
    pub query_echo: StructuredQuery,
    /// Non-fatal conditions recovered during the request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Degradation>,
}
