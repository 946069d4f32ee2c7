//! Domain errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain result type
pub type Result<T> = std::result::Result<T, CallError>;

/// Error category, for callers that only branch on the kind of failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Duplicate,
    StateConflict,
    ResourceExhausted,
    Unsupported,
    Internal,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Duplicate(String),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            CallError::NotFound(_) => ErrorKind::NotFound,
            CallError::Duplicate(_) => ErrorKind::Duplicate,
            CallError::StateConflict(_) => ErrorKind::StateConflict,
            CallError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            CallError::Unsupported(_) => ErrorKind::Unsupported,
            CallError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Missing collaborator, e.g. a bearer channel that was never wired in
    pub fn missing_collaborator(name: &str) -> Self {
        CallError::Internal(format!("{} is not available", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            CallError::NotFound("call 7".to_string()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CallError::missing_collaborator("bearer channel").kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_error_display() {
        let err = CallError::StateConflict("call 3 is not ringing".to_string());
        assert_eq!(err.to_string(), "State conflict: call 3 is not ringing");
    }
}
