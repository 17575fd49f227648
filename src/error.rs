//! Error types for a3s-state

use thiserror::Error;

/// Errors that can occur in the state system
#[derive(Debug, Error)]
pub enum StateError {
    /// Malformed state key or delta shape (programmer error)
    #[error("Invalid state key: {0}")]
    InvalidKey(String),

    /// Positional access outside `1..=len`
    #[error("No item at position {position}. You currently have {len} item(s).")]
    NotFound {
        position: usize,
        len: usize,
    },

    /// Session lookup failure
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session id already taken
    #[error("Session already exists: {0}")]
    SessionExists(String),

    /// Persistence backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StateError {
    /// Current collection length reported by a positional miss
    pub fn available(&self) -> Option<usize> {
        match self {
            StateError::NotFound { len, .. } => Some(*len),
            _ => None,
        }
    }
}

/// Result type alias for state operations
pub type Result<T> = std::result::Result<T, StateError>;
