//! Storage errors

use std::path::PathBuf;

use enkf_node::NodeError;
use thiserror::Error;

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Node(#[from] NodeError),

    #[error("{} is not an ensemble case: {reason}", path.display())]
    NotACase { path: PathBuf, reason: String },

    #[error("no stored {key} node for realization {iens}")]
    MissingNode { key: String, iens: usize },

    #[error("case '{0}' is mounted read-only")]
    ReadOnly(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub(crate) fn shape(expected: usize, actual: usize) -> Self {
        StorageError::Node(NodeError::LengthMismatch { expected, actual })
    }
}
