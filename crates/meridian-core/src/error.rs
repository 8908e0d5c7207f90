//! # Error Types
//!
//! Domain-specific error types for meridian-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  meridian-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations (always Validation)   │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  meridian-core::ports                                                  │
//! │  └── RepositoryError  - What storage adapters report                   │
//! │                                                                         │
//! │  meridian-db                                                           │
//! │  └── DbError          - SQLite failures, mapped into RepositoryError   │
//! │                                                                         │
//! │  meridian-ordering                                                     │
//! │  └── OrderingError    - What callers see (kind + operation)            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → OrderingError → HTTP layer        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in this crate performs I/O, so every error raised here is a
//! caller mistake: it is never retried automatically.

use thiserror::Error;

use crate::money::{Currency, Money};
use crate::types::OrderState;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Two money values with different currencies were combined.
    #[error("Currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: Currency, found: Currency },

    /// An amount left the i64 range.
    #[error("Monetary amount overflow")]
    AmountOverflow,

    /// A schema line item references a variation missing from the snapshot.
    #[error("Unknown item variation: {0}")]
    UnknownVariation(String),

    /// A schema tax references a tax missing from the snapshot.
    #[error("Unknown tax: {0}")]
    UnknownTax(String),

    /// A schema discount references a discount missing from the snapshot.
    #[error("Unknown discount: {0}")]
    UnknownDiscount(String),

    /// A catalog entity cannot be used at the order's location.
    #[error("{entity} {id} is not available at location {location_id}")]
    NotAtLocation {
        entity: &'static str,
        id: String,
        location_id: String,
    },

    /// The order lifecycle forbids the requested move.
    ///
    /// ## When This Occurs
    /// - Cancelling a completed order
    /// - Paying a canceled order
    /// - Cancelling twice
    #[error("Order is {from}, cannot transition to {to}")]
    InvalidTransition { from: OrderState, to: OrderState },

    /// Payments do not cover the order and partial payment is not allowed.
    #[error("Payments total {paid}, order requires {due}")]
    UnbalancedPayment { due: Money, paid: Money },

    /// A payment does not belong to the order being paid.
    #[error("Payment {payment_id} belongs to order {actual_order_id}, not {order_id}")]
    PaymentOrderMismatch {
        payment_id: String,
        order_id: String,
        actual_order_id: String,
    },

    /// A payment was already applied to this order.
    #[error("Payment {0} was already applied")]
    DuplicatePayment(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., unknown enum value, malformed percentage).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., two line items sharing a uid).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
