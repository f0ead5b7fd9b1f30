//! Error types for ShopTalk
//!
//! One crate-wide error enum. Only `RetrievalFailure` (and request
//! validation) ever reaches the caller of `Pipeline::answer`; every other
//! variant is produced by a collaborator and absorbed by a fallback.

use std::fmt;
use thiserror::Error;

/// Stage of retrieval that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStage {
    /// Query encoding via the embedding collaborator
    Encode,
    /// Nearest-neighbour search against the vector store
    Search,
}

impl fmt::Display for RetrievalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalStage::Encode => write!(f, "encode"),
            RetrievalStage::Search => write!(f, "search"),
        }
    }
}

/// Main error type for the retrieval pipeline
#[derive(Error, Debug)]
pub enum ShopError {
    /// Query rejected before entering the pipeline
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Requested result count outside the configured bounds
    #[error("Invalid k: {k} (must be between 1 and {max})")]
    InvalidK { k: usize, max: usize },

    /// Vector store or encoder failure; fatal to the request
    #[error("Retrieval failed during {stage}: {message}")]
    RetrievalFailure {
        stage: RetrievalStage,
        message: String,
    },

    /// LLM provider errors (non-2xx, malformed body, empty completion)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Embedding model errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector store errors
    #[error("Vector store error: {0}")]
    Store(String),

    /// Reranker errors
    #[error("Rerank error: {0}")]
    Rerank(String),

    /// Timeout errors
    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout {
        operation: &'static str,
        duration_ms: u64,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShopError {
    /// True for the one error class surfaced to pipeline callers after
    /// request validation.
    pub fn is_retrieval_failure(&self) -> bool {
        matches!(self, ShopError::RetrievalFailure { .. })
    }

    /// Wrap an error as a retrieval failure at the given stage.
    pub fn retrieval(stage: RetrievalStage, err: impl fmt::Display) -> Self {
        ShopError::RetrievalFailure {
            stage,
            message: err.to_string(),
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ShopError>;
