//! Shared types, error model, and configuration for SuperAnalyze.
//!
//! This crate is the foundation depended on by all other SuperAnalyze crates.
//! It provides:
//! - [`SuperAnalyzeError`]: the unified error type
//! - Domain types ([`ContentItem`], [`AnalysisResult`], [`RenderParameters`], [`ArtifactPaths`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ANALYZE_ACTION, AnalyzerConfig, AppConfig, DefaultsConfig, FetchConfig, ServerConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, SuperAnalyzeError};
pub use types::{
    AnalysisResult, ArtifactPaths, ContentItem, Format, ItemOverrides, ItemType,
    RenderParameters, StorePath,
};
