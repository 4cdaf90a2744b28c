// Error taxonomy for ledger operations
// Structural errors abort the operation; per-row parsing issues never do.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural errors surfaced to the caller verbatim. None of these are
/// retried. Malformed individual cells are NOT errors — they degrade to
/// defaults during import.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Malformed import input: missing header/data rows, or fewer
    /// transaction identifiers than data rows.
    #[error("invalid import format: {0}")]
    InvalidFormat(String),

    /// Update/delete referenced a transaction id absent from the ledger.
    #[error("transaction not found: {0}")]
    NotFound(String),

    /// Bulk import invoked with zero transactions.
    #[error("import batch contains no transactions")]
    EmptyBatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidFormat,
    NotFound,
    EmptyBatch,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            LedgerError::NotFound(_) => ErrorKind::NotFound,
            LedgerError::EmptyBatch => ErrorKind::EmptyBatch,
        }
    }
}

/// Serializable failure value for call sites that record errors on the
/// operation's own audit record instead of raising.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&LedgerError> for OperationError {
    fn from(err: &LedgerError) -> Self {
        OperationError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            LedgerError::InvalidFormat("x".to_string()).kind(),
            ErrorKind::InvalidFormat
        );
        assert_eq!(
            LedgerError::NotFound("tx-1".to_string()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(LedgerError::EmptyBatch.kind(), ErrorKind::EmptyBatch);
    }

    #[test]
    fn test_operation_error_carries_message() {
        let err = LedgerError::NotFound("tx-42".to_string());
        let op_err = OperationError::from(&err);

        assert_eq!(op_err.kind, ErrorKind::NotFound);
        assert_eq!(op_err.message, "transaction not found: tx-42");
    }
}
