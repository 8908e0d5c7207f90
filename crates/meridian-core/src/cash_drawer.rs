//! Cash drawer arithmetic. One drawer per location; every movement is an
//! append-only adjustment and the balance is their running sum.

use chrono::{DateTime, Utc};

use crate::error::{CoreResult, ValidationError};
use crate::money::{Currency, Money};
use crate::types::{CashDrawer, CashDrawerAdjustment, CashDrawerOp, Payment, PaymentType};
use crate::validation::validate_positive_amount;

impl CashDrawer {
    /// A zero-balance drawer, not yet stored (`version` 0).
    pub fn open(merchant_id: &str, location_id: &str, currency: Currency, now: DateTime<Utc>) -> Self {
        CashDrawer {
            id: drawer_id(location_id),
            location_id: location_id.to_string(),
            merchant_id: merchant_id.to_string(),
            amount: Money::zero(currency),
            version: 0,
            calculated_at: now,
        }
    }

    pub fn is_stored(&self) -> bool {
        self.version > 0
    }

    /// Moves the balance by one adjustment. The balance may go negative.
    pub fn apply(&mut self, adjustment: &CashDrawerAdjustment, now: DateTime<Utc>) -> CoreResult<()> {
        if adjustment.cash_drawer_id != self.id {
            return Err(ValidationError::InvalidFormat {
                field: "cash_drawer_id".to_string(),
                reason: format!(
                    "adjustment targets drawer {}, not {}",
                    adjustment.cash_drawer_id, self.id
                ),
            }
            .into());
        }
        validate_positive_amount("amount", adjustment.amount)?;

        self.amount = match adjustment.op {
            CashDrawerOp::Add => self.amount.checked_add(adjustment.amount)?,
            CashDrawerOp::Remove => self.amount.checked_sub(adjustment.amount)?,
        };
        self.calculated_at = now;
        Ok(())
    }
}

pub fn drawer_id(location_id: &str) -> String {
    format!("drawer@{}", location_id)
}

/// Id of a cash payment's drawer entry, tagged with the version of the
/// order it was applied against.
pub fn payment_adjustment_id(payment_id: &str, order_version: i64) -> String {
    format!("{}:cash:v{}", payment_id, order_version)
}

/// The drawer movement for a cash payment, tip included. `None` for any
/// other payment type.
pub fn cash_sale_adjustment(
    cash_drawer_id: &str,
    payment: &Payment,
    order_version: i64,
    now: DateTime<Utc>,
) -> CoreResult<Option<CashDrawerAdjustment>> {
    if payment.payment_type != PaymentType::Cash {
        return Ok(None);
    }
    let amount = payment.amount.checked_add(payment.tip_amount)?;
    Ok(Some(CashDrawerAdjustment {
        id: payment_adjustment_id(&payment.id, order_version),
        cash_drawer_id: cash_drawer_id.to_string(),
        op: CashDrawerOp::Add,
        amount,
        note: format!("Cash payment {} for order {}", payment.id, payment.order_id),
        created_at: now,
    }))
}

/// Takes `adjustment` back out under a `:void` id.
pub fn void_cash_adjustment(adjustment: &CashDrawerAdjustment, now: DateTime<Utc>) -> CashDrawerAdjustment {
    CashDrawerAdjustment {
        id: format!("{}:void", adjustment.id),
        cash_drawer_id: adjustment.cash_drawer_id.clone(),
        op: match adjustment.op {
            CashDrawerOp::Add => CashDrawerOp::Remove,
            CashDrawerOp::Remove => CashDrawerOp::Add,
        },
        amount: adjustment.amount,
        note: format!("Void of {}", adjustment.id),
        created_at: now,
    }
}
