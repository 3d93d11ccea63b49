//! Errors that abort an NPC turn.
//!
//! Almost every failure inside a turn degrades to a documented default.
//! What remains here is the short list of conditions a caller must handle.

use anima_core::AnimaError;
use thiserror::Error;

/// Failure of a turn-level operation.
#[derive(Error, Debug)]
pub enum TurnError {
    /// The NPC, or the persona or world it references, does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Record kind (`npc`, `persona`, `world`, `memory`).
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// An index and the embedding service disagree on vector width.
    /// Requires a reindex.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured width.
        expected: usize,
        /// Width that was observed.
        actual: usize,
    },

    /// A tool could not be registered.
    #[error("Tool registry error: {0}")]
    Registry(String),

    /// Any other core failure (document store, I/O).
    #[error(transparent)]
    Core(AnimaError),
}

impl From<AnimaError> for TurnError {
    fn from(err: AnimaError) -> Self {
        match err {
            AnimaError::NotFound { kind, id } => Self::NotFound { kind, id },
            AnimaError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            other => Self::Core(other),
        }
    }
}

impl TurnError {
    /// Shorthand for [`TurnError::NotFound`].
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, TurnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_keep_their_class() {
        let err = TurnError::from(AnimaError::not_found("npc", "npc_9"));
        assert!(matches!(err, TurnError::NotFound { kind: "npc", .. }));
        assert_eq!(err.to_string(), "npc npc_9 not found");

        let err = TurnError::from(AnimaError::DimensionMismatch { expected: 8, actual: 4 });
        assert!(matches!(err, TurnError::DimensionMismatch { expected: 8, actual: 4 }));

        let err = TurnError::from(AnimaError::Config("bad".into()));
        assert!(matches!(err, TurnError::Core(AnimaError::Config(_))));
    }
}
