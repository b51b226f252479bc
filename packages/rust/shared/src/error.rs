//! Error types for SuperAnalyze.
//!
//! Library crates use [`SuperAnalyzeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` outside of the analysis run itself.

use std::path::PathBuf;

/// Top-level error type for all SuperAnalyze operations.
///
/// The first five variants are the pipeline taxonomy: each one is fatal to the
/// current run and is reported to the caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum SuperAnalyzeError {
    /// The input reference could not be resolved to a readable document.
    #[error("could not acquire '{input}': {message}")]
    Acquisition { input: String, message: String },

    /// The claim analyzer failed or produced no usable result.
    #[error("analysis failed: {0}")]
    Analysis(String),

    /// Template lookup or parameter substitution failed.
    #[error("template error: {0}")]
    Template(String),

    /// HTML minification rejected its input or changed visible content.
    #[error("optimization error: {0}")]
    Optimization(String),

    /// Workspace or artifact persistence failure.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error outside the artifact store.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SuperAnalyzeError>;

impl SuperAnalyzeError {
    /// Create an acquisition error for `input`.
    pub fn acquisition(input: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Acquisition {
            input: input.into(),
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a filesystem failure inside the workspace as a store error.
    pub fn store_io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Store(format!("{}: {source}", path.as_ref().display()))
    }

    /// Stable snake_case name of the error kind, used in tool-error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Acquisition { .. } => "acquisition_error",
            Self::Analysis(_) => "analysis_error",
            Self::Template(_) => "template_error",
            Self::Optimization(_) => "optimization_error",
            Self::Store(_) => "store_error",
            Self::Config { .. } => "config_error",
            Self::Io { .. } => "io_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SuperAnalyzeError::config("missing analyzer command");
        assert_eq!(err.to_string(), "config error: missing analyzer command");

        let err = SuperAnalyzeError::acquisition("./nope.md", "file not found");
        assert_eq!(err.to_string(), "could not acquire './nope.md': file not found");
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(
            SuperAnalyzeError::Analysis("boom".into()).kind(),
            "analysis_error"
        );
        assert_eq!(
            SuperAnalyzeError::Optimization("bad".into()).kind(),
            "optimization_error"
        );
        assert_eq!(
            SuperAnalyzeError::acquisition("x", "y").kind(),
            "acquisition_error"
        );
    }

    #[test]
    fn store_io_includes_path() {
        let err = SuperAnalyzeError::store_io(
            "/tmp/ws/docs/a.doc.md",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("store error:"));
        assert!(msg.contains("a.doc.md"));
    }
}
