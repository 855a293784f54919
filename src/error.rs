use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised by loading, analysing, and writing sales data.
///
/// Only [`SalesError::Io`] from creating the output directory is fatal to a
/// batch; everything else is isolated to the file or user it concerns.
#[derive(Debug, Error)]
pub enum SalesError {
    #[error("{}: no such file", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported format: {0:?}")]
    UnsupportedFormat(String),

    #[error("{}: malformed input: {reason}", path.display())]
    MalformedInput { path: PathBuf, reason: String },

    #[error("no sales for user {0}")]
    NoSalesForUser(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SalesError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::MalformedInput {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SalesError>;
