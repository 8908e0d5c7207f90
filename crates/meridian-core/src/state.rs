//! # Order State Machine
//!
//! ```text
//!              pay (covered)
//!     ┌──────┐ ─────────────► ┌───────────┐
//!     │ open │                │ completed │  terminal
//!     └──────┘ ─────────────► └───────────┘
//!         │      cancel(reason)
//!         │                   ┌───────────┐
//!         └─────────────────► │ canceled  │  terminal
//!                             └───────────┘
//! ```
//!
//! Mutations here never touch `version`; the service bumps it right before
//! the optimistic write so a failed write leaves the loaded order reusable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Order, OrderState, Payment};
use crate::validation::validate_cancel_reason;

impl OrderState {
    /// Only `open` has outgoing edges.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, OrderState::Open)
    }

    pub const fn can_transition_to(&self, to: OrderState) -> bool {
        matches!(
            (self, to),
            (OrderState::Open, OrderState::Completed) | (OrderState::Open, OrderState::Canceled)
        )
    }

    pub fn transition(&self, to: OrderState) -> CoreResult<OrderState> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(CoreError::InvalidTransition { from: *self, to })
        }
    }
}

/// What happens when a pay call does not cover the order total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPolicy {
    /// A single call must settle the order; shortfalls are rejected.
    #[default]
    RequireFull,
    /// Shortfalls are recorded and the order stays open.
    AllowPartial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Completed,
    Partial { remaining: Money },
}

impl Order {
    /// Applies payments to an open order.
    ///
    /// Every check runs before the order is touched, so an `Err` leaves it
    /// unchanged.
    pub fn apply_payments(
        &mut self,
        payments: &[Payment],
        policy: PaymentPolicy,
        now: DateTime<Utc>,
    ) -> CoreResult<PaymentOutcome> {
        // A pay call is always a request to complete.
        self.state.transition(OrderState::Completed)?;

        if payments.is_empty() {
            return Err(ValidationError::Required {
                field: "payment_ids".to_string(),
            }
            .into());
        }

        let mut paid = self.amount_paid;
        let mut incoming: Vec<&str> = Vec::with_capacity(payments.len());
        for payment in payments {
            if payment.order_id != self.id {
                return Err(CoreError::PaymentOrderMismatch {
                    payment_id: payment.id.clone(),
                    order_id: self.id.clone(),
                    actual_order_id: payment.order_id.clone(),
                });
            }
            if self.payment_ids.contains(&payment.id) || incoming.contains(&payment.id.as_str()) {
                return Err(CoreError::DuplicatePayment(payment.id.clone()));
            }
            incoming.push(&payment.id);
            paid = paid
                .checked_add(payment.amount)?
                .checked_add(payment.tip_amount)?;
        }

        let covered = paid.amount() >= self.total_amount.amount();
        if !covered && policy == PaymentPolicy::RequireFull {
            return Err(CoreError::UnbalancedPayment {
                due: self.total_amount,
                paid,
            });
        }

        for payment in payments {
            self.payment_ids.push(payment.id.clone());
            if !self.payment_types.contains(&payment.payment_type) {
                self.payment_types.push(payment.payment_type);
            }
        }
        self.amount_paid = paid;
        self.updated_at = now;

        if covered {
            self.state = OrderState::Completed;
            self.closed_at = Some(now);
            Ok(PaymentOutcome::Completed)
        } else {
            Ok(PaymentOutcome::Partial {
                remaining: self.total_amount.checked_sub(paid)?,
            })
        }
    }

    /// Cancels an open order. The reason is trimmed and must be non-empty.
    pub fn cancel(&mut self, reason: &str, now: DateTime<Utc>) -> CoreResult<()> {
        let next = self.state.transition(OrderState::Canceled)?;
        let reason = validate_cancel_reason(reason)?;

        self.state = next;
        self.cancel_reason = Some(reason);
        self.updated_at = now;
        self.closed_at = Some(now);
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
