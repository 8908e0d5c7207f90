//! Cash drawer ledger: one drawer per location, moved only by appended
//! adjustments. Replaying an adjustment id that is already recorded is a
//! no-op, which is what makes a retried `pay_order` safe. Money is never
//! deleted from the ledger; a payment that did not stick is voided by a
//! second, opposite entry.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use meridian_core::cash_drawer::{cash_sale_adjustment, drawer_id, void_cash_adjustment};
use meridian_core::ports::CashDrawerRepository;
use meridian_core::validation::validate_id;
use meridian_core::{CashDrawer, CashDrawerAdjustment, Currency, Payment};

use crate::error::{OrderingError, OrderingResult};
use crate::stores::bounded;

#[derive(Clone)]
pub struct CashDrawerLedger {
    repo: Arc<dyn CashDrawerRepository>,
    timeout: Duration,
    max_retries: u32,
}

/// How the drawer an adjustment targets is found.
enum Target<'a> {
    /// An existing drawer; missing is NotFound.
    Id(&'a str),
    /// The drawer of a location, opened at zero if it has none yet.
    Location { location_id: &'a str, currency: Currency },
}

impl CashDrawerLedger {
    pub fn new(repo: Arc<dyn CashDrawerRepository>, timeout: Duration, max_retries: u32) -> Self {
        CashDrawerLedger {
            repo,
            timeout,
            max_retries,
        }
    }

    /// Applies one adjustment to an existing drawer.
    pub async fn adjust(
        &self,
        merchant_id: &str,
        adjustment: &CashDrawerAdjustment,
    ) -> OrderingResult<CashDrawer> {
        self.commit_adjustment(
            "adjust_cash_drawer",
            merchant_id,
            Target::Id(&adjustment.cash_drawer_id),
            adjustment,
        )
        .await
    }

    /// Puts a cash payment (tip included) into its location's drawer.
    /// Returns `None` for non-cash payments.
    pub async fn record_payment(
        &self,
        operation: &'static str,
        location_id: &str,
        payment: &Payment,
        order_version: i64,
    ) -> OrderingResult<Option<CashDrawer>> {
        let Some(adjustment) = self.payment_adjustment(operation, location_id, payment, order_version)? else {
            return Ok(None);
        };

        let target = Target::Location {
            location_id,
            currency: payment.amount.currency(),
        };
        self.commit_adjustment(operation, &payment.merchant_id, target, &adjustment)
            .await
            .map(Some)
    }

    /// Takes back what [`record_payment`](Self::record_payment) put in for
    /// the same order version. A no-op when nothing was recorded.
    pub async fn void_payment(
        &self,
        operation: &'static str,
        location_id: &str,
        payment: &Payment,
        order_version: i64,
    ) -> OrderingResult<Option<CashDrawer>> {
        let Some(recorded) = self.payment_adjustment(operation, location_id, payment, order_version)? else {
            return Ok(None);
        };
        let exists = bounded(
            operation,
            self.timeout,
            self.repo.adjustment_exists(&payment.merchant_id, &recorded.id),
        )
        .await?;
        if !exists {
            return Ok(None);
        }

        let void = void_cash_adjustment(&recorded, Utc::now());
        let target = Target::Location {
            location_id,
            currency: payment.amount.currency(),
        };
        self.commit_adjustment(operation, &payment.merchant_id, target, &void)
            .await
            .map(Some)
    }

    fn payment_adjustment(
        &self,
        operation: &'static str,
        location_id: &str,
        payment: &Payment,
        order_version: i64,
    ) -> OrderingResult<Option<CashDrawerAdjustment>> {
        cash_sale_adjustment(&drawer_id(location_id), payment, order_version, Utc::now())
            .map_err(|e| OrderingError::validation(operation, e))
    }

    /// The location's drawer, or an unstored zero-balance one.
    pub async fn drawer_for_location(
        &self,
        merchant_id: &str,
        location_id: &str,
        currency: Currency,
    ) -> OrderingResult<CashDrawer> {
        let target = Target::Location {
            location_id,
            currency,
        };
        self.load("get_cash_drawer", merchant_id, &target).await
    }

    /// Drawer ledger, oldest first.
    pub async fn history(
        &self,
        merchant_id: &str,
        cash_drawer_id: &str,
    ) -> OrderingResult<Vec<CashDrawerAdjustment>> {
        bounded(
            "get_cash_drawer_history",
            self.timeout,
            self.repo.list_adjustments(merchant_id, cash_drawer_id),
        )
        .await
    }

    async fn commit_adjustment(
        &self,
        operation: &'static str,
        merchant_id: &str,
        target: Target<'_>,
        adjustment: &CashDrawerAdjustment,
    ) -> OrderingResult<CashDrawer> {
        validate_id("id", &adjustment.id).map_err(|e| OrderingError::validation(operation, e))?;

        let mut attempt = 0;
        loop {
            let mut drawer = self.load(operation, merchant_id, &target).await?;

            let recorded = bounded(
                operation,
                self.timeout,
                self.repo.adjustment_exists(merchant_id, &adjustment.id),
            )
            .await?;
            if recorded {
                debug!(adjustment_id = %adjustment.id, "Cash adjustment already recorded");
                return Ok(drawer);
            }

            drawer
                .apply(adjustment, Utc::now())
                .map_err(|e| OrderingError::validation(operation, e))?;
            drawer.version += 1;

            match bounded(operation, self.timeout, self.repo.commit(&drawer, adjustment)).await {
                Ok(()) => {
                    info!(
                        drawer_id = %drawer.id,
                        adjustment_id = %adjustment.id,
                        op = ?adjustment.op,
                        amount = adjustment.amount.amount(),
                        balance = drawer.amount.amount(),
                        "Cash drawer adjusted"
                    );
                    return Ok(drawer);
                }
                Err(err) if err.is_conflict() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(drawer_id = %drawer.id, attempt, "Cash drawer commit lost a race, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn load(
        &self,
        operation: &'static str,
        merchant_id: &str,
        target: &Target<'_>,
    ) -> OrderingResult<CashDrawer> {
        match *target {
            Target::Id(id) => bounded(operation, self.timeout, self.repo.get_drawer(merchant_id, id))
                .await?
                .ok_or_else(|| OrderingError::not_found(operation, "CashDrawer", id)),
            Target::Location {
                location_id,
                currency,
            } => {
                let stored = bounded(
                    operation,
                    self.timeout,
                    self.repo.get_drawer_for_location(merchant_id, location_id),
                )
                .await?;
                Ok(stored.unwrap_or_else(|| CashDrawer::open(merchant_id, location_id, currency, Utc::now())))
            }
        }
    }
}
