//! Errors raised by parameter node operations.
//!
//! # Error Categories
//!
//! - **Construction**: [`NodeError::InvalidConfig`]
//! - **Shape**: [`NodeError::LengthMismatch`], [`NodeError::Format`]
//! - **Ensemble**: [`NodeError::ConfigMismatch`], [`NodeError::EmptyEnsemble`]
//! - **File system**: [`NodeError::Io`]
//!
//! # Error Handling Policy
//!
//! Every error is local and synchronous: nothing is retried here, and an
//! operation that fails leaves the node exactly as it was. A single malformed
//! node makes the whole ensemble suspect, so callers are expected to abort the
//! realization rather than continue with a partially updated node.

use thiserror::Error;

/// Node result type alias.
pub type Result<T> = std::result::Result<T, NodeError>;

/// Errors that can occur while building, updating or persisting a node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The parameter config is malformed (zero size, duplicate names,
    /// inverted bounds, invalid prior parameters).
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A buffer disagrees with the config size, or an active index or row
    /// window does not fit the buffer.
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Length required by the config or the row window.
        expected: usize,
        /// Length actually provided.
        actual: usize,
    },

    /// Nodes built from incompatible configs were combined.
    #[error("config mismatch: {0}")]
    ConfigMismatch(String),

    /// Aggregation was asked for over zero nodes.
    #[error("cannot aggregate an empty ensemble")]
    EmptyEnsemble,

    /// Persisted data has the wrong shape, kind or version.
    #[error("format error: {0}")]
    Format(String),

    /// File system failure while reading or writing a node.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    pub(crate) fn length(expected: usize, actual: usize) -> Self {
        Self::LengthMismatch { expected, actual }
    }
}
