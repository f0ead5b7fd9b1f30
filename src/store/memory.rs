//! In-memory vector store
//!
//! Brute-force cosine similarity over every record that passes the filter.
//! Ties keep insertion order, so results are fully deterministic.

use async_trait::async_trait;
use std::sync::RwLock;

use crate::errors::{Result, ShopError};
use crate::filter::FilterExpr;
use crate::store::VectorStore;
use crate::types::{ProductRecord, StoreHit};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<ProductRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<ProductRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn poisoned<T>(_: T) -> ShopError {
    ShopError::Store("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, records: Vec<ProductRecord>) -> Result<()> {
        let mut stored = self.records.write().map_err(poisoned)?;
        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => stored.push(record),
            }
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], filter: Option<&FilterExpr>, k: usize) -> Result<Vec<StoreHit>> {
        let stored = self.records.read().map_err(poisoned)?;

        let mut hits = Vec::new();
        for record in stored.iter() {
            if record.vector.len() != vector.len() {
                return Err(ShopError::Store(format!(
                    "dimension mismatch: query has {}, item {} has {}",
                    vector.len(),
                    record.id,
                    record.vector.len()
                )));
            }
            if filter.map_or(true, |f| f.matches(&record.metadata)) {
                hits.push(StoreHit {
                    id: record.id.clone(),
                    similarity: cosine(vector, &record.vector),
                    metadata: record.metadata.clone(),
                });
            }
        }

        // Stable: equal scores keep insertion order
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.read().map_err(poisoned)?.len() as u64)
    }
}
