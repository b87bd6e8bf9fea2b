//! Error types for graphctx.
//!
//! Library crates use [`GraphContextError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! "No context available" is never an error: extraction that yields nothing
//! and a store that pages out without a match both surface as `Ok(None)`.

use std::path::PathBuf;

/// Top-level error type for all graphctx operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphContextError {
    /// Configuration error: invalid mode, out-of-range setting, unknown NLP model.
    #[error("config error: {message}")]
    Config { message: String },

    /// The context store could not be queried (unreachable, failed statement, bad row).
    #[error("store error: {0}")]
    Store(String),

    /// The caller-supplied wall-clock budget for a search ran out.
    #[error("search timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// A worker-pool task panicked or was lost before reporting a result.
    #[error("worker error: {0}")]
    Worker(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (malformed ingest document, bad timestamp, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GraphContextError>;

impl GraphContextError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a store error from any displayable message.
    pub fn store(msg: impl std::fmt::Display) -> Self {
        Self::Store(msg.to_string())
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
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

    /// Whether this error means the search could not run, as opposed to a
    /// misconfiguration the caller must fix.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Timeout { .. })
    }
}
