//! Type definitions module
//!
//! Request-scoped data model shared by every pipeline stage.

pub mod query;
pub mod product;

// Re-export commonly used types
pub use query::{FilterField, FilterValue, Operator, Predicate, StructuredQuery};
pub use product::{AnswerResponse, Candidate, Metadata, ProductRecord, StoreHit};
