//! Error taxonomy shared by the ledger, wallet and infrastructure layers.

use thiserror::Error;

/// Result type used across the workspace.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Every failure the financial core can report.
///
/// Amount-sensitive messages embed the exact figure (shortfall, remaining
/// headroom) so clients can display it without re-deriving it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed input: unbalanced entry, bad enum value, malformed metadata.
    #[error("{0}")]
    Validation(String),

    /// A referenced account, entry or wallet does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Illegal state transition, insufficient funds, limit exceeded.
    #[error("{0}")]
    BadRequest(String),

    /// Uniqueness violation (duplicate wallet, duplicate account code, replayed transaction).
    #[error("{0}")]
    Conflict(String),

    /// A row lock could not be acquired within the configured wait.
    #[error("lock wait timed out during {0}")]
    LockTimeout(String),

    /// Unexpected persistence failure, wrapped with the failing operation.
    #[error("internal error in {operation}: {message}")]
    Internal { operation: String, message: String },
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn lock_timeout(operation: impl Into<String>) -> Self {
        Self::LockTimeout(operation.into())
    }

    pub fn internal(operation: impl Into<String>, message: impl core::fmt::Display) -> Self {
        Self::Internal {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation_error",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::BadRequest(_) => "bad_request",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::LockTimeout(_) => "lock_timeout",
            LedgerError::Internal { .. } => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_passed_through_verbatim() {
        let err = LedgerError::validation("entry not balanced: debits=10000, credits=5000");
        assert_eq!(err.to_string(), "entry not balanced: debits=10000, credits=5000");
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn internal_error_names_operation() {
        let err = LedgerError::internal("post_entry", "connection reset");
        assert_eq!(err.to_string(), "internal error in post_entry: connection reset");
        assert_eq!(err.code(), "internal_error");
    }
}
