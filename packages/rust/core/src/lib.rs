//! Core pipeline orchestration for SuperAnalyze.
//!
//! This crate ties together acquisition, claim analysis, report rendering,
//! and the artifact store into the single [`pipeline::run`] workflow shared
//! by the CLI and the tool server.

pub mod analyzer;
pub mod pipeline;

pub use analyzer::{BridgeAnalyzer, ClaimAnalyzer};
pub use pipeline::{ProgressReporter, RunOptions, SilentProgress, run};
