//! Telemetry for ShopTalk
//!
//! Tracing setup for the binary and the per-request record of conditions the
//! pipeline recovered from without failing.

use serde::{Deserialize, Serialize};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::types::FilterField;

/// A non-fatal condition absorbed by a fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// Structured parsing failed; raw text used as the search phrase
    ParseDegraded { reason: String },
    /// A single predicate was invalid and dropped
    FilterRejected { field: FilterField, reason: String },
    /// Zero results under the full filter; predicates were relaxed
    Widened {
        dropped: Vec<FilterField>,
        attempts: usize,
    },
    /// Reranker failed; vector-similarity order kept
    RerankDegraded { reason: String },
    /// Generation failed, timed out or cited unknown items; template used
    GenerationDegraded { reason: String },
}

/// Request-scoped collector. Logs each condition as it is recorded.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    events: Vec<Degradation>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event
    pub fn record(&mut self, event: Degradation) {
        match &event {
            Degradation::ParseDegraded { reason } => {
                warn!(%reason, "query parse degraded to raw text");
            }
            Degradation::FilterRejected { field, reason } => {
                warn!(%field, %reason, "filter predicate rejected");
            }
            Degradation::Widened { dropped, attempts } => {
                warn!(?dropped, attempts, "filters widened after empty result");
            }
            Degradation::RerankDegraded { reason } => {
                warn!(%reason, "rerank degraded to retrieval order");
            }
            Degradation::GenerationDegraded { reason } => {
                warn!(%reason, "answer generation degraded to template");
            }
        }
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Degradation>) {
        for event in events {
            self.record(event);
        }
    }

    pub fn events(&self) -> &[Degradation] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Degradation> {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over the verbosity-derived default directive.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
