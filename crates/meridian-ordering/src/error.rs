//! # Ordering Error Types
//!
//! What callers of the ordering service see.
//!
//! ## Error Kinds
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Ordering Error Kinds                              │
//! │                                                                         │
//! │  Validation  - bad schema, unknown catalog reference, illegal          │
//! │                transition, unbalanced payment. Fix the input.          │
//! │  NotFound    - unknown id, or an id owned by another merchant          │
//! │  Conflict    - a version precondition lost a race. Safe to retry.      │
//! │  Unexpected  - storage failure or timeout. Logged; safe to retry.      │
//! │                                                                         │
//! │  Every variant carries the operation it failed in. Wrapping never      │
//! │  changes the kind.                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use meridian_core::ports::RepositoryError;
use meridian_core::{CoreError, ValidationError};
use thiserror::Error;

/// Result type alias for ordering operations.
pub type OrderingResult<T> = Result<T, OrderingError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unexpected,
}

impl ErrorKind {
    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Conflict | ErrorKind::Unexpected)
    }
}

#[derive(Debug, Error)]
pub enum OrderingError {
    #[error("{operation}: {source}")]
    Validation {
        operation: &'static str,
        #[source]
        source: CoreError,
    },

    #[error("{operation}: {entity} {id} not found")]
    NotFound {
        operation: &'static str,
        entity: &'static str,
        id: String,
    },

    #[error("{operation}: {source}")]
    Conflict {
        operation: &'static str,
        #[source]
        source: RepositoryError,
    },

    #[error("{operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: RepositoryError,
    },

    #[error("{operation}: storage call timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

impl OrderingError {
    pub fn validation(operation: &'static str, source: impl Into<CoreError>) -> Self {
        OrderingError::Validation {
            operation,
            source: source.into(),
        }
    }

    pub fn not_found(operation: &'static str, entity: &'static str, id: impl Into<String>) -> Self {
        OrderingError::NotFound {
            operation,
            entity,
            id: id.into(),
        }
    }

    /// Wraps a repository error, keeping conflicts distinguishable.
    pub fn storage(operation: &'static str, source: RepositoryError) -> Self {
        if source.is_conflict() {
            OrderingError::Conflict { operation, source }
        } else {
            OrderingError::Storage { operation, source }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderingError::Validation { .. } => ErrorKind::Validation,
            OrderingError::NotFound { .. } => ErrorKind::NotFound,
            OrderingError::Conflict { .. } => ErrorKind::Conflict,
            OrderingError::Storage { .. } | OrderingError::Timeout { .. } => ErrorKind::Unexpected,
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            OrderingError::Validation { operation, .. }
            | OrderingError::NotFound { operation, .. }
            | OrderingError::Conflict { operation, .. }
            | OrderingError::Storage { operation, .. }
            | OrderingError::Timeout { operation, .. } => operation,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

/// Shorthand for the common `InvalidFormat` rejection.
pub(crate) fn invalid(operation: &'static str, field: &str, reason: impl Into<String>) -> OrderingError {
    OrderingError::validation(
        operation,
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: reason.into(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::OrderState;

    #[test]
    fn test_kinds() {
        let err = OrderingError::validation(
            "cancel_order",
            CoreError::InvalidTransition {
                from: OrderState::Canceled,
                to: OrderState::Canceled,
            },
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.kind().is_retryable());
        assert_eq!(err.operation(), "cancel_order");

        let err = OrderingError::not_found("pay_order", "Order", "ord-1");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "pay_order: Order ord-1 not found");
    }

    #[test]
    fn test_storage_keeps_conflicts_apart() {
        let err = OrderingError::storage("pay_order", RepositoryError::conflict("Order", "ord-1"));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.kind().is_retryable());

        let err = OrderingError::storage("pay_order", RepositoryError::Backend("disk full".into()));
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_timeout_is_unexpected() {
        let err = OrderingError::Timeout {
            operation: "get_order",
            timeout: Duration::from_millis(50),
        };
        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }
}
