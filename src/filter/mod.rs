//! Filter compilation and widening
//!
//! Predicates from the parser are validated and compiled into a
//! store-neutral `FilterExpr`; the widening plan decides which predicates
//! to relax, in what order, when a filtered search comes back empty.

pub mod compiler;
pub mod widening;

pub use compiler::{Clause, CompiledFilter, FilterCompiler, FilterExpr};
pub use widening::{plan, FilterStage, WideningStep};
