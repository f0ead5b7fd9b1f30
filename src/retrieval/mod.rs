//! Retrieval: encode, filtered vector search, widen on empty

pub mod engine;

use serde::{Deserialize, Serialize};

use crate::filter::WideningStep;

pub use engine::{Retrieval, Retriever, RetrieverTimeouts};

/// Retrieval parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Upper bound on `k`
    pub max_k: usize,
    /// `k` used when the caller does not pass one
    pub default_k: usize,
    /// Order in which predicates are relaxed after an empty search
    pub widening_order: Vec<WideningStep>,
    /// Controlled category vocabulary; empty accepts any value
    pub categories: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_k: 50,
            default_k: 10,
            widening_order: WideningStep::default_order(),
            categories: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widening_order_from_toml() {
        let config: RetrievalConfig =
            toml::from_str("max_k = 20\nwidening_order = [\"price\", \"category\"]").unwrap();
        assert_eq!(config.max_k, 20);
        assert_eq!(config.default_k, 10);
        assert_eq!(
            config.widening_order,
            vec![WideningStep::Price, WideningStep::Category]
        );
    }
}
