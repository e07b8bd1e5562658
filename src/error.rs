// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while generating PCA reference fixtures.
///
/// `Input` aborts a whole generation run. `Fit` and `Io` only abort the
/// variant (or the single fixture) they occurred in; the generator records
/// them and carries on with sibling variants.
#[derive(Error, Debug)]
pub enum FixtureError {
    /// The dataset is empty, malformed or contains values PCA cannot digest.
    #[error("input error: {0}")]
    Input(String),

    /// The requested decomposition cannot be produced for this matrix.
    #[error("fit error: {0}")]
    Fit(String),

    /// Column counts of two operands disagree.
    #[error("dimension mismatch: expected {expected} columns, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Reading or writing a fixture file failed.
    #[error("i/o error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file was readable but its contents do not describe a valid fixture or model.
    #[error("format error in {path:?}: {message}")]
    Format { path: PathBuf, message: String },
}

impl FixtureError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FixtureError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        FixtureError::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True for errors that only invalidate a single variant branch.
    pub fn is_variant_local(&self) -> bool {
        matches!(
            self,
            FixtureError::Fit(_) | FixtureError::Io { .. } | FixtureError::Format { .. }
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FixtureError>;
