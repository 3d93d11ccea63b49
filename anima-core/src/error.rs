//! Error types for the Anima core library.

use thiserror::Error;

/// Top-level error type for all Anima core operations.
///
/// Only [`AnimaError::NotFound`] and [`AnimaError::DimensionMismatch`] are
/// meant to abort a unit of work.  Everything else is recovered by the
/// caller into a documented default.
#[derive(Error, Debug)]
pub enum AnimaError {
    /// A referenced record does not exist in the document store.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Record kind (`npc`, `persona`, `world`, `memory`, ...).
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// Vector width disagrees with the configured index width.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured width.
        expected: usize,
        /// Width that was observed.
        actual: usize,
    },

    /// An index operation ran before `create` or `load`.
    #[error("Similarity index '{0}' is not initialized")]
    IndexNotInitialized(String),

    /// The embedding service failed to produce vectors.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite document-store error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied an argument the operation cannot accept.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnimaError {
    /// Shorthand for [`AnimaError::NotFound`].
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether this error must abort the enclosing unit of work.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::DimensionMismatch { .. })
    }
}

impl From<serde_json::Error> for AnimaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for AnimaError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, AnimaError>;
