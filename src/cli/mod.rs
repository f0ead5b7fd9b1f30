//! CLI module for ShopTalk
//!
//! Argument parsing and terminal rendering for the thin `shoptalk` binary.

pub mod args;
pub mod output;

pub use args::{Args, Commands, Verbosity};
pub use output::{render_answer, render_health};
