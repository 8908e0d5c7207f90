//! # Validation Module
//!
//! Input validation for order schemas, payments and ledger adjustments.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP binding (outside this workspace)                        │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Schema shape: non-empty, positive quantities, unique uids         │
//! │  └── Amount / reason checks before any ledger write                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Calculator + state machine (business rules)                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: Database constraints (NOT NULL, UNIQUE, FK)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here runs before allocation, so a rejected schema never
//! produces a partially priced order.

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::OrderSchema;
use crate::{MAX_ITEM_QUANTITY, MAX_LINE_ITEMS, MAX_REASON_LENGTH, MAX_UID_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a correlation uid or entity id.
///
/// ## Rules
/// - Must not be empty or whitespace
/// - At most MAX_UID_LENGTH characters
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > MAX_UID_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_UID_LENGTH,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line item quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
///
/// ```rust
/// use meridian_core::validation::validate_quantity;
///
/// assert!(validate_quantity(1).is_ok());
/// assert!(validate_quantity(0).is_err());
/// assert!(validate_quantity(-3).is_err());
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an inventory adjustment quantity (zero allowed for resets).
pub fn validate_adjustment_quantity(qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::OutOfRange {
            field: "adjustment quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a ledger or payment amount.
///
/// ## Rules
/// - Must be positive (> 0)
pub fn validate_positive_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a cancellation reason.
///
/// ## Rules
/// - Must not be empty
/// - At most MAX_REASON_LENGTH characters
///
/// ## Returns
/// The trimmed reason.
pub fn validate_cancel_reason(reason: &str) -> ValidationResult<String> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "cancel_reason".to_string(),
        });
    }

    if reason.chars().count() > MAX_REASON_LENGTH {
        return Err(ValidationError::TooLong {
            field: "cancel_reason".to_string(),
            max: MAX_REASON_LENGTH,
        });
    }

    Ok(reason.to_string())
}

// =============================================================================
// Schema Validator
// =============================================================================

/// Validates the shape of an order schema.
///
/// ## Rules
/// - At least one line item, at most MAX_LINE_ITEMS
/// - Every quantity positive
/// - Every uid non-empty and unique across line items, taxes and discounts
/// - Every referenced id non-empty
///
/// Catalog existence is not checked here; the calculator rejects unknown
/// references against the resolved snapshot.
pub fn validate_schema(schema: &OrderSchema) -> ValidationResult<()> {
    validate_id("location_id", &schema.location_id)?;
    validate_id("merchant_id", &schema.merchant_id)?;

    if schema.line_items.is_empty() {
        return Err(ValidationError::Required {
            field: "line_items".to_string(),
        });
    }

    if schema.line_items.len() > MAX_LINE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "line_items".to_string(),
            min: 1,
            max: MAX_LINE_ITEMS as i64,
        });
    }

    for item in &schema.line_items {
        validate_id("uid", &item.uid)?;
        validate_id("variation_id", &item.variation_id)?;
        validate_quantity(item.quantity)?;
    }
    for tax in &schema.taxes {
        validate_id("uid", &tax.uid)?;
        validate_id("tax_id", &tax.tax_id)?;
    }
    for discount in &schema.discounts {
        validate_id("uid", &discount.uid)?;
        validate_id("discount_id", &discount.discount_id)?;
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let uids = schema
        .line_items
        .iter()
        .map(|i| i.uid.as_str())
        .chain(schema.taxes.iter().map(|t| t.uid.as_str()))
        .chain(schema.discounts.iter().map(|d| d.uid.as_str()));
    for uid in uids {
        if !seen.insert(uid) {
            return Err(ValidationError::Duplicate {
                field: "uid".to_string(),
                value: uid.to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use crate::types::{SchemaDiscount, SchemaLineItem, SchemaTax};

    fn schema() -> OrderSchema {
        OrderSchema {
            location_id: "loc-1".to_string(),
            merchant_id: "m-1".to_string(),
            customer_id: None,
            employee_id: None,
            currency: Currency::Usd,
            line_items: vec![SchemaLineItem {
                uid: "li-1".to_string(),
                variation_id: "var-1".to_string(),
                quantity: 1,
            }],
            taxes: vec![],
            discounts: vec![],
        }
    }

    #[test]
    fn test_valid_schema() {
        assert!(validate_schema(&schema()).is_ok());
    }

    #[test]
    fn test_empty_line_items_rejected() {
        let mut s = schema();
        s.line_items.clear();
        assert!(matches!(
            validate_schema(&s),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        for qty in [0, -1] {
            let mut s = schema();
            s.line_items[0].quantity = qty;
            assert!(matches!(
                validate_schema(&s),
                Err(ValidationError::MustBePositive { .. })
            ));
        }
    }

    #[test]
    fn test_uids_unique_across_schema() {
        let mut s = schema();
        s.taxes.push(SchemaTax {
            uid: "li-1".to_string(),
            tax_id: "tax-1".to_string(),
            scope: None,
        });
        assert!(matches!(
            validate_schema(&s),
            Err(ValidationError::Duplicate { .. })
        ));

        let mut s = schema();
        s.discounts.push(SchemaDiscount {
            uid: "d".to_string(),
            discount_id: "disc-1".to_string(),
        });
        s.discounts.push(SchemaDiscount {
            uid: "d".to_string(),
            discount_id: "disc-2".to_string(),
        });
        assert!(validate_schema(&s).is_err());
    }

    #[test]
    fn test_blank_uid_rejected() {
        let mut s = schema();
        s.line_items[0].uid = "  ".to_string();
        assert!(matches!(
            validate_schema(&s),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_cancel_reason() {
        assert_eq!(validate_cancel_reason("  customer left ").unwrap(), "customer left");
        assert!(validate_cancel_reason("   ").is_err());
        assert!(validate_cancel_reason(&"x".repeat(MAX_REASON_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_positive_amount("amount", Money::new(1, Currency::Usd)).is_ok());
        assert!(validate_positive_amount("amount", Money::zero(Currency::Usd)).is_err());
        assert!(validate_adjustment_quantity(0).is_ok());
        assert!(validate_adjustment_quantity(-1).is_err());
    }
}
