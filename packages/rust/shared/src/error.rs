//! Error types for stitchbook.
//!
//! Library crates use [`StitchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all stitching operations.
#[derive(Debug, thiserror::Error)]
pub enum StitchError {
    /// Manifest or configuration loading/validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A document named by the manifest could not be read.
    #[error("cannot load document '{key}' from {path:?}: {source}")]
    SourceLoad {
        key: String,
        path: PathBuf,
        source: std::io::Error,
    },

    /// Markup could not be parsed or a required element is absent.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A source document violates the structure the merge relies on.
    #[error("document '{key}': {message}")]
    Structure { key: String, message: String },

    /// A rewritten link points at an anchor the merged document lacks.
    #[error("dangling link in '{key}': {href} has no matching anchor")]
    DanglingLink { key: String, href: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StitchError>;

impl StitchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a structure error for the document with the given key.
    pub fn structure(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Structure {
            key: key.into(),
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

    /// Wrap a read failure for a manifest document.
    pub fn source_load(key: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceLoad {
            key: key.into(),
            path: path.into(),
            source,
        }
    }
}
