//! # Ordering Service
//!
//! The operations the HTTP layer calls. Every operation takes the acting
//! merchant explicitly; nothing is read from ambient request state.
//!
//! ## pay_order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  load order (open, version v) + payments  ── NotFound / Validation     │
//! │  apply payments to a copy              ── Validation, nothing written  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  cash drawer: {payment_id}:cash:v{v}   ── idempotent ledger writes     │
//! │  inventory:   {order_id}:{uid}:sale:v{v}  (completing + on_payment)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  order update WHERE version = v        ── Conflict                     │
//! │       │                                                                 │
//! │       ▼ (Conflict)                                                      │
//! │  reload: still v?        keep effects, a retry reuses the same ids     │
//! │          moved past v?   void what the winning write does not cover    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ledger effects land before the order flips state. A failure between the
//! two leaves an open order whose effects are already recorded; repeating
//! the call completes it without applying them twice. When another write
//! got to the order first, the effects it does not account for are voided
//! with `:void` entries before the Conflict is returned. `cancel_order`
//! follows the same pattern for its restock under `on_creation`.

use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use meridian_core::inventory::{restock_adjustments, sale_adjustments, void_adjustments};
use meridian_core::ports::{CatalogBatch, OrderFilter};
use meridian_core::validation::validate_positive_amount;
use meridian_core::{
    calculate, CashDrawer, InventoryAdjustment, InventoryPolicy, Money, Order, OrderSchema,
    OrderState, Payment, PaymentOutcome, PaymentPolicy, PaymentType,
};

use crate::cash_drawer::CashDrawerLedger;
use crate::catalog::CatalogLoader;
use crate::config::OrderingSettings;
use crate::error::{invalid, OrderingError, OrderingResult};
use crate::inventory::InventoryLedger;
use crate::stores::{bounded, Stores};

/// Ledger effects an order write produced before losing its version race.
struct LostWrite<'a> {
    payments: &'a [Payment],
    stock: &'a [InventoryAdjustment],
    /// State a winner from the same version reaches when it wrote the same
    /// stock ids.
    shared_if: OrderState,
}

/// A payment to record against an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub order_id: String,
    pub payment_type: PaymentType,
    pub amount: Money,
    pub tip_amount: Money,
}

#[derive(Clone)]
pub struct OrderingService {
    stores: Stores,
    catalog: CatalogLoader,
    inventory: InventoryLedger,
    cash_drawers: CashDrawerLedger,
    payment_policy: PaymentPolicy,
    inventory_policy: InventoryPolicy,
    timeout: Duration,
}

impl OrderingService {
    pub fn new(stores: Stores, settings: &OrderingSettings) -> Self {
        let timeout = settings.storage_timeout();
        OrderingService {
            catalog: CatalogLoader::new(stores.catalog.clone(), timeout),
            inventory: InventoryLedger::new(
                stores.catalog.clone(),
                stores.inventory.clone(),
                timeout,
                settings.max_conflict_retries,
            ),
            cash_drawers: CashDrawerLedger::new(
                stores.cash_drawers.clone(),
                timeout,
                settings.max_conflict_retries,
            ),
            stores,
            payment_policy: settings.payment_policy,
            inventory_policy: settings.inventory_policy,
            timeout,
        }
    }

    pub fn inventory(&self) -> &InventoryLedger {
        &self.inventory
    }

    pub fn cash_drawers(&self) -> &CashDrawerLedger {
        &self.cash_drawers
    }

    pub fn catalog(&self) -> &CatalogLoader {
        &self.catalog
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Prices `schema` and stores the result as an open order.
    ///
    /// Under [`InventoryPolicy::OnCreation`] stock is deducted before the
    /// order is stored, and restored if storing fails.
    #[instrument(skip(self, schema), fields(location_id = %schema.location_id))]
    pub async fn create_order(&self, merchant_id: &str, schema: &OrderSchema) -> OrderingResult<Order> {
        const OP: &str = "create_order";

        let order = self.price(OP, merchant_id, schema).await?;

        if self.inventory_policy == InventoryPolicy::OnCreation {
            self.inventory
                .apply_adjustments(merchant_id, &sale_adjustments(&order, order.created_at))
                .await?;
        }

        if let Err(err) = bounded(OP, self.timeout, self.stores.orders.insert(&order)).await {
            if self.inventory_policy == InventoryPolicy::OnCreation {
                self.compensate_creation(merchant_id, &order).await;
            }
            return Err(err);
        }

        info!(
            order_id = %order.id,
            merchant_id = %merchant_id,
            total = order.total_amount.amount(),
            items = order.items.len(),
            "Order created"
        );
        Ok(order)
    }

    /// Same computation as [`create_order`](Self::create_order), never stored.
    pub async fn calculate_order(&self, merchant_id: &str, schema: &OrderSchema) -> OrderingResult<Order> {
        self.price("calculate_order", merchant_id, schema).await
    }

    /// Applies payments to an open order; see the module docs for ordering.
    #[instrument(skip(self, payment_ids), fields(payments = payment_ids.len()))]
    pub async fn pay_order(
        &self,
        merchant_id: &str,
        order_id: &str,
        payment_ids: &[String],
    ) -> OrderingResult<Order> {
        const OP: &str = "pay_order";

        let order = self.load_order(OP, merchant_id, order_id).await?;

        let mut payments = Vec::with_capacity(payment_ids.len());
        for payment_id in payment_ids {
            let payment = bounded(OP, self.timeout, self.stores.payments.get(merchant_id, payment_id))
                .await?
                .ok_or_else(|| OrderingError::not_found(OP, "Payment", payment_id.as_str()))?;
            payments.push(payment);
        }

        let now = Utc::now();
        let mut next = order.clone();
        let outcome = next
            .apply_payments(&payments, self.payment_policy, now)
            .map_err(|e| OrderingError::validation(OP, e))?;

        for payment in &payments {
            self.cash_drawers
                .record_payment(OP, &next.location_id, payment, order.version)
                .await?;
        }

        let mut stock = Vec::new();
        if outcome == PaymentOutcome::Completed && self.inventory_policy == InventoryPolicy::OnPayment {
            stock = sale_adjustments(&order, now);
            self.inventory.apply_adjustments(merchant_id, &stock).await?;
        }

        if let Err(err) = self.save(OP, &order, &mut next).await {
            if err.is_conflict() {
                let lost = LostWrite {
                    payments: &payments,
                    stock: &stock,
                    shared_if: OrderState::Completed,
                };
                self.void_lost_effects(OP, merchant_id, &order, lost).await?;
            }
            return Err(err);
        }

        match outcome {
            PaymentOutcome::Completed => info!(
                order_id = %next.id,
                amount_paid = next.amount_paid.amount(),
                "Order completed"
            ),
            PaymentOutcome::Partial { remaining } => info!(
                order_id = %next.id,
                remaining = remaining.amount(),
                "Order partially paid"
            ),
        }
        Ok(next)
    }

    /// Cancels an open order.
    ///
    /// Stock is only restored under [`InventoryPolicy::OnCreation`]; under
    /// `OnPayment` an open order never took any.
    #[instrument(skip(self, reason))]
    pub async fn cancel_order(&self, merchant_id: &str, order_id: &str, reason: &str) -> OrderingResult<Order> {
        const OP: &str = "cancel_order";

        let order = self.load_order(OP, merchant_id, order_id).await?;

        let now = Utc::now();
        let mut next = order.clone();
        next
            .cancel(reason, now)
            .map_err(|e| OrderingError::validation(OP, e))?;

        let mut stock = Vec::new();
        if self.inventory_policy == InventoryPolicy::OnCreation {
            stock = restock_adjustments(&order, now);
            self.inventory.apply_adjustments(merchant_id, &stock).await?;
        }

        if let Err(err) = self.save(OP, &order, &mut next).await {
            if err.is_conflict() {
                let lost = LostWrite {
                    payments: &[],
                    stock: &stock,
                    shared_if: OrderState::Canceled,
                };
                self.void_lost_effects(OP, merchant_id, &order, lost).await?;
            }
            return Err(err);
        }

        info!(order_id = %next.id, reason = ?next.cancel_reason, "Order canceled");
        Ok(next)
    }

    pub async fn get_order(&self, merchant_id: &str, order_id: &str) -> OrderingResult<Order> {
        self.load_order("get_order", merchant_id, order_id).await
    }

    /// Orders of the merchant matching `filter`, newest first.
    pub async fn list_orders(&self, merchant_id: &str, filter: &OrderFilter) -> OrderingResult<Vec<Order>> {
        bounded("list_orders", self.timeout, self.stores.orders.list(merchant_id, filter)).await
    }

    // =========================================================================
    // Payments & catalog
    // =========================================================================

    /// Records a payment for an existing order of the merchant. The payment
    /// only affects the order once passed to [`pay_order`](Self::pay_order).
    pub async fn create_payment(&self, merchant_id: &str, new: NewPayment) -> OrderingResult<Payment> {
        const OP: &str = "create_payment";

        let order = self.load_order(OP, merchant_id, &new.order_id).await?;

        validate_positive_amount("amount", new.amount).map_err(|e| OrderingError::validation(OP, e))?;
        if new.tip_amount.is_negative() {
            return Err(invalid(OP, "tip_amount", "must not be negative"));
        }
        for money in [new.amount, new.tip_amount] {
            Money::zero(order.currency)
                .ensure_same_currency(&money)
                .map_err(|e| OrderingError::validation(OP, e))?;
        }

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            merchant_id: merchant_id.to_string(),
            order_id: order.id,
            payment_type: new.payment_type,
            amount: new.amount,
            tip_amount: new.tip_amount,
            created_at: Utc::now(),
        };
        bounded(OP, self.timeout, self.stores.payments.insert(&payment)).await?;

        info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            payment_type = ?payment.payment_type,
            amount = payment.amount.amount(),
            "Payment recorded"
        );
        Ok(payment)
    }

    /// Upserts catalog entities for the merchant in one unit.
    pub async fn put_catalog(&self, merchant_id: &str, batch: &CatalogBatch) -> OrderingResult<()> {
        self.catalog.put_batch(merchant_id, batch).await
    }

    /// The location's cash drawer (zero balance if it never took cash).
    pub async fn cash_drawer(&self, merchant_id: &str, location_id: &str) -> OrderingResult<CashDrawer> {
        const OP: &str = "get_cash_drawer";
        let location = self
            .catalog
            .location(OP, merchant_id, location_id)
            .await?
            .ok_or_else(|| OrderingError::not_found(OP, "Location", location_id))?;
        self.cash_drawers
            .drawer_for_location(merchant_id, location_id, location.currency)
            .await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn price(&self, operation: &'static str, merchant_id: &str, schema: &OrderSchema) -> OrderingResult<Order> {
        if schema.merchant_id != merchant_id {
            return Err(invalid(
                operation,
                "merchant_id",
                format!("schema is for merchant {}", schema.merchant_id),
            ));
        }

        let snapshot = self.catalog.load(operation, merchant_id, schema).await?;
        let priced = calculate(schema, &snapshot).map_err(|e| OrderingError::validation(operation, e))?;
        Ok(priced.into_order(Uuid::new_v4().to_string(), Utc::now()))
    }

    async fn load_order(&self, operation: &'static str, merchant_id: &str, order_id: &str) -> OrderingResult<Order> {
        bounded(operation, self.timeout, self.stores.orders.get(merchant_id, order_id))
            .await?
            .ok_or_else(|| OrderingError::not_found(operation, "Order", order_id))
    }

    /// Writes `next` if the stored order is still at `loaded.version`.
    async fn save(&self, operation: &'static str, loaded: &Order, next: &mut Order) -> OrderingResult<()> {
        let expected = loaded.version;
        next.version = expected + 1;
        bounded(operation, self.timeout, self.stores.orders.update(next, expected)).await
    }

    /// Runs after `save` lost to another write. Effects stay when the order
    /// has not moved, since a retry from the same version reuses their ids.
    /// Otherwise they are kept only when the winner started from the same
    /// version and wrote the same ids itself.
    async fn void_lost_effects(
        &self,
        operation: &'static str,
        merchant_id: &str,
        loaded: &Order,
        lost: LostWrite<'_>,
    ) -> OrderingResult<()> {
        let current = self.load_order(operation, merchant_id, &loaded.id).await?;
        if current.version == loaded.version {
            return Ok(());
        }
        let same_step = current.version == loaded.version + 1;

        let mut voided = 0;
        for payment in lost.payments {
            if same_step && current.payment_ids.contains(&payment.id) {
                continue;
            }
            let drawer = self
                .cash_drawers
                .void_payment(operation, &loaded.location_id, payment, loaded.version)
                .await?;
            voided += usize::from(drawer.is_some());
        }

        if !lost.stock.is_empty() && !(same_step && current.state == lost.shared_if) {
            let voids = void_adjustments(lost.stock, Utc::now());
            self.inventory.apply_adjustments(merchant_id, &voids).await?;
            voided += voids.len();
        }

        warn!(
            order_id = %loaded.id,
            loaded_version = loaded.version,
            current_version = current.version,
            current_state = %current.state,
            voided,
            "Order moved underneath; voided effects it does not cover"
        );
        Ok(())
    }

    async fn compensate_creation(&self, merchant_id: &str, order: &Order) {
        let restock = restock_adjustments(order, Utc::now());
        if let Err(err) = self.inventory.apply_adjustments(merchant_id, &restock).await {
            error!(
                order_id = %order.id,
                error = %err,
                "Failed to restore stock for an order that was never stored"
            );
        }
    }
}
