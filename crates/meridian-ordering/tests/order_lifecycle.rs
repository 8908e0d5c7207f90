//! Ordering service behavior against the in-memory store.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use common::*;
use meridian_core::cash_drawer::drawer_id;
use meridian_core::ports::{OrderFilter, OrderRepository, RepositoryError, RepositoryResult};
use meridian_core::{
    AdjustmentOp, CashDrawerAdjustment, CashDrawerOp, InventoryAdjustment, InventoryPolicy,
    InventoryState, Order, OrderState, PaymentPolicy, PaymentType,
};
use meridian_ordering::{ErrorKind, InMemoryStore, NewPayment, OrderingService};

async fn service(payment_policy: PaymentPolicy, inventory_policy: InventoryPolicy) -> OrderingService {
    service_with(
        InMemoryStore::new().stores(),
        &settings(payment_policy, inventory_policy),
    )
    .await
}

async fn default_service() -> OrderingService {
    service(PaymentPolicy::RequireFull, InventoryPolicy::OnPayment).await
}

// =============================================================================
// Create / calculate
// =============================================================================

#[tokio::test]
async fn test_cash_sale_end_to_end() {
    let service = default_service().await;

    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();
    assert_eq!(order.total_amount, usd(1150));
    assert_eq!(order.state, OrderState::Open);
    assert_eq!(order.version, 1);
    assert_eq!(stock(&service, SANDWICH).await, 10);

    let payment_id = pay_with(&service, &order, PaymentType::Cash, 1150).await;
    let paid = service
        .pay_order(MERCHANT, &order.id, &[payment_id.clone()])
        .await
        .unwrap();

    assert_eq!(paid.state, OrderState::Completed);
    assert_eq!(paid.amount_paid, usd(1150));
    assert_eq!(paid.payment_ids, vec![payment_id.clone()]);
    assert!(paid.closed_at.is_some());
    assert_eq!(paid.version, 2);

    let drawer = service.cash_drawer(MERCHANT, LOCATION).await.unwrap();
    assert_eq!(drawer.amount, usd(1150));
    let history = service
        .cash_drawers()
        .history(MERCHANT, &drawer_id(LOCATION))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, format!("{}:cash:v1", payment_id));

    assert_eq!(stock(&service, SANDWICH).await, 9);
    assert_eq!(stock(&service, SALAD).await, 9);

    let stored = service.get_order(MERCHANT, &order.id).await.unwrap();
    assert_eq!(stored, paid);
}

#[tokio::test]
async fn test_calculate_order_is_not_stored() {
    let service = default_service().await;

    let preview = service.calculate_order(MERCHANT, &lunch_schema()).await.unwrap();
    assert_eq!(preview.total_amount, usd(1150));

    let err = service.get_order(MERCHANT, &preview.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(service
        .list_orders(MERCHANT, &OrderFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_discounted_items_sum_to_order_total() {
    let service = default_service().await;
    let mut schema = lunch_schema();
    schema.discounts.push(staff_discount());

    let order = service.create_order(MERCHANT, &schema).await.unwrap();

    assert_eq!(order.total_discount_amount, usd(115));
    assert_eq!(order.total_amount, usd(1035));
    let items: i64 = order.items.iter().map(|i| i.total_amount.amount()).sum();
    assert_eq!(items, order.total_amount.amount());
    assert_eq!(order.items[0].total_discount_amount, usd(50));
    assert_eq!(order.items[1].total_discount_amount, usd(65));
}

#[tokio::test]
async fn test_create_rejects_bad_references() {
    let service = default_service().await;

    let mut unknown_variation = lunch_schema();
    unknown_variation.line_items.push(line("c", "v-missing", 1));
    let err = service
        .create_order(MERCHANT, &unknown_variation)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.operation(), "create_order");

    let mut unknown_location = lunch_schema();
    unknown_location.location_id = "loc-nowhere".to_string();
    let err = service
        .create_order(MERCHANT, &unknown_location)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut empty = lunch_schema();
    empty.line_items.clear();
    let err = service.create_order(MERCHANT, &empty).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // The acting merchant must match the schema.
    let err = service
        .create_order(OTHER_MERCHANT, &lunch_schema())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert!(service
        .list_orders(MERCHANT, &OrderFilter::default())
        .await
        .unwrap()
        .is_empty());
}

// =============================================================================
// State machine
// =============================================================================

#[tokio::test]
async fn test_cancel_twice_is_rejected() {
    let service = default_service().await;
    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();

    let canceled = service
        .cancel_order(MERCHANT, &order.id, "  customer left  ")
        .await
        .unwrap();
    assert_eq!(canceled.state, OrderState::Canceled);
    assert_eq!(canceled.cancel_reason.as_deref(), Some("customer left"));

    let err = service
        .cancel_order(MERCHANT, &order.id, "again")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Stock never moved for an unpaid order.
    assert_eq!(stock(&service, SANDWICH).await, 10);
}

#[tokio::test]
async fn test_cancel_requires_reason() {
    let service = default_service().await;
    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();

    let err = service.cancel_order(MERCHANT, &order.id, "   ").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let stored = service.get_order(MERCHANT, &order.id).await.unwrap();
    assert_eq!(stored.state, OrderState::Open);
}

#[tokio::test]
async fn test_paying_closed_orders_is_rejected() {
    let service = default_service().await;

    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();
    let first = pay_with(&service, &order, PaymentType::Card, 1150).await;
    service.pay_order(MERCHANT, &order.id, &[first]).await.unwrap();

    let second = pay_with(&service, &order, PaymentType::Card, 100).await;
    let err = service
        .pay_order(MERCHANT, &order.id, &[second])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let canceled = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();
    let payment = pay_with(&service, &canceled, PaymentType::Cash, 1150).await;
    service
        .cancel_order(MERCHANT, &canceled.id, "wrong table")
        .await
        .unwrap();
    let err = service
        .pay_order(MERCHANT, &canceled.id, &[payment])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let drawer = service.cash_drawer(MERCHANT, LOCATION).await.unwrap();
    assert_eq!(drawer.amount, usd(0));
}

#[tokio::test]
async fn test_cross_tenant_access_is_not_found() {
    let store = InMemoryStore::new();
    let service = service_with(
        store.stores(),
        &settings(PaymentPolicy::RequireFull, InventoryPolicy::OnPayment),
    )
    .await;
    service
        .put_catalog(OTHER_MERCHANT, &catalog(OTHER_MERCHANT))
        .await
        .unwrap();

    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();
    let payment_id = pay_with(&service, &order, PaymentType::Cash, 1150).await;

    let err = service
        .pay_order(OTHER_MERCHANT, &order.id, &[payment_id.clone()])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service
        .cancel_order(OTHER_MERCHANT, &order.id, "mine now")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service
        .create_payment(
            OTHER_MERCHANT,
            NewPayment {
                order_id: order.id.clone(),
                payment_type: PaymentType::Cash,
                amount: usd(1150),
                tip_amount: usd(0),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let untouched = service.get_order(MERCHANT, &order.id).await.unwrap();
    assert_eq!(untouched.state, OrderState::Open);
    assert_eq!(untouched.version, 1);
}

// =============================================================================
// Payment policies
// =============================================================================

#[tokio::test]
async fn test_require_full_rejects_shortfall() {
    let service = default_service().await;
    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();

    let short = pay_with(&service, &order, PaymentType::Cash, 1000).await;
    let err = service
        .pay_order(MERCHANT, &order.id, &[short])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let stored = service.get_order(MERCHANT, &order.id).await.unwrap();
    assert_eq!(stored.state, OrderState::Open);
    assert_eq!(stored.amount_paid, usd(0));
    assert_eq!(service.cash_drawer(MERCHANT, LOCATION).await.unwrap().amount, usd(0));
    assert_eq!(stock(&service, SANDWICH).await, 10);
}

#[tokio::test]
async fn test_allow_partial_accumulates_until_covered() {
    let service = service(PaymentPolicy::AllowPartial, InventoryPolicy::OnPayment).await;
    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();

    let cash = pay_with(&service, &order, PaymentType::Cash, 500).await;
    let partial = service.pay_order(MERCHANT, &order.id, &[cash]).await.unwrap();
    assert_eq!(partial.state, OrderState::Open);
    assert_eq!(partial.amount_paid, usd(500));
    assert_eq!(service.cash_drawer(MERCHANT, LOCATION).await.unwrap().amount, usd(500));
    assert_eq!(stock(&service, SANDWICH).await, 10);

    let card = pay_with(&service, &order, PaymentType::Card, 650).await;
    let done = service.pay_order(MERCHANT, &order.id, &[card]).await.unwrap();
    assert_eq!(done.state, OrderState::Completed);
    assert_eq!(done.amount_paid, usd(1150));
    assert_eq!(done.payment_types, vec![PaymentType::Cash, PaymentType::Card]);

    // Only the cash part reached the drawer.
    assert_eq!(service.cash_drawer(MERCHANT, LOCATION).await.unwrap().amount, usd(500));
    assert_eq!(stock(&service, SANDWICH).await, 9);
}

#[tokio::test]
async fn test_create_payment_validates_amounts() {
    let service = default_service().await;
    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();

    let zero = NewPayment {
        order_id: order.id.clone(),
        payment_type: PaymentType::Cash,
        amount: usd(0),
        tip_amount: usd(0),
    };
    let err = service.create_payment(MERCHANT, zero).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let euros = NewPayment {
        order_id: order.id.clone(),
        payment_type: PaymentType::Cash,
        amount: meridian_core::Money::new(1150, meridian_core::Currency::Eur),
        tip_amount: meridian_core::Money::new(0, meridian_core::Currency::Eur),
    };
    let err = service.create_payment(MERCHANT, euros).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let unknown = NewPayment {
        order_id: "ord-missing".to_string(),
        payment_type: PaymentType::Card,
        amount: usd(100),
        tip_amount: usd(0),
    };
    let err = service.create_payment(MERCHANT, unknown).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_cash_tip_goes_into_drawer() {
    let service = default_service().await;
    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();

    let payment = service
        .create_payment(
            MERCHANT,
            NewPayment {
                order_id: order.id.clone(),
                payment_type: PaymentType::Cash,
                amount: usd(1150),
                tip_amount: usd(200),
            },
        )
        .await
        .unwrap();
    let paid = service
        .pay_order(MERCHANT, &order.id, &[payment.id])
        .await
        .unwrap();

    assert_eq!(paid.amount_paid, usd(1350));
    assert_eq!(service.cash_drawer(MERCHANT, LOCATION).await.unwrap().amount, usd(1350));
}

// =============================================================================
// Inventory policies
// =============================================================================

#[tokio::test]
async fn test_on_creation_deducts_and_cancel_restocks() {
    let service = service(PaymentPolicy::RequireFull, InventoryPolicy::OnCreation).await;

    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();
    assert_eq!(stock(&service, SANDWICH).await, 9);
    assert_eq!(stock(&service, SALAD).await, 9);

    service
        .cancel_order(MERCHANT, &order.id, "out of bread")
        .await
        .unwrap();
    assert_eq!(stock(&service, SANDWICH).await, 10);
    assert_eq!(stock(&service, SALAD).await, 10);

    let history = service
        .inventory()
        .history(MERCHANT, SANDWICH, LOCATION)
        .await
        .unwrap();
    let ops: Vec<AdjustmentOp> = history.iter().map(|a| a.op).collect();
    assert_eq!(
        ops,
        vec![AdjustmentOp::ResetStock, AdjustmentOp::RemoveStock, AdjustmentOp::AddStock]
    );
}

#[tokio::test]
async fn test_on_creation_does_not_deduct_again_on_payment() {
    let service = service(PaymentPolicy::RequireFull, InventoryPolicy::OnCreation).await;

    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();
    let payment = pay_with(&service, &order, PaymentType::Card, 1150).await;
    service.pay_order(MERCHANT, &order.id, &[payment]).await.unwrap();

    assert_eq!(stock(&service, SANDWICH).await, 9);
}

// =============================================================================
// Retries
// =============================================================================

/// Order store whose next `update` loses a version race.
struct RacingOrders {
    inner: InMemoryStore,
    lose_next: AtomicBool,
}

#[async_trait]
impl OrderRepository for RacingOrders {
    async fn insert(&self, order: &Order) -> RepositoryResult<()> {
        OrderRepository::insert(&self.inner, order).await
    }

    async fn get(&self, merchant_id: &str, id: &str) -> RepositoryResult<Option<Order>> {
        OrderRepository::get(&self.inner, merchant_id, id).await
    }

    async fn update(&self, order: &Order, expected_version: i64) -> RepositoryResult<()> {
        if self.lose_next.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::conflict("Order", order.id.as_str()));
        }
        self.inner.update(order, expected_version).await
    }

    async fn list(&self, merchant_id: &str, filter: &OrderFilter) -> RepositoryResult<Vec<Order>> {
        self.inner.list(merchant_id, filter).await
    }
}

#[tokio::test]
async fn test_retried_payment_applies_ledgers_once() {
    let store = InMemoryStore::new();
    let orders = Arc::new(RacingOrders {
        inner: store.clone(),
        lose_next: AtomicBool::new(false),
    });
    let racing: Arc<dyn OrderRepository> = orders.clone();
    let mut stores = store.stores();
    stores.orders = racing;
    let service = service_with(
        stores,
        &settings(PaymentPolicy::RequireFull, InventoryPolicy::OnPayment),
    )
    .await;

    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();
    let payment_id = pay_with(&service, &order, PaymentType::Cash, 1150).await;

    orders.lose_next.store(true, Ordering::SeqCst);
    let err = service
        .pay_order(MERCHANT, &order.id, &[payment_id.clone()])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.kind().is_retryable());

    // Ledger effects landed, the order did not flip.
    assert_eq!(service.get_order(MERCHANT, &order.id).await.unwrap().state, OrderState::Open);
    assert_eq!(service.cash_drawer(MERCHANT, LOCATION).await.unwrap().amount, usd(1150));
    assert_eq!(stock(&service, SANDWICH).await, 9);

    let paid = service
        .pay_order(MERCHANT, &order.id, &[payment_id])
        .await
        .unwrap();
    assert_eq!(paid.state, OrderState::Completed);
    assert_eq!(service.cash_drawer(MERCHANT, LOCATION).await.unwrap().amount, usd(1150));
    assert_eq!(stock(&service, SANDWICH).await, 9);
    assert_eq!(stock(&service, SALAD).await, 9);
}

/// Order store that serves one stale snapshot from `get`, as a concurrent
/// request that read the order before another write landed would see it.
struct StaleOrders {
    inner: InMemoryStore,
    stale: Mutex<Option<Order>>,
}

impl StaleOrders {
    fn serve_once(&self, order: Order) {
        *self.stale.lock().unwrap() = Some(order);
    }
}

#[async_trait]
impl OrderRepository for StaleOrders {
    async fn insert(&self, order: &Order) -> RepositoryResult<()> {
        OrderRepository::insert(&self.inner, order).await
    }

    async fn get(&self, merchant_id: &str, id: &str) -> RepositoryResult<Option<Order>> {
        let stale = self.stale.lock().unwrap().take();
        match stale {
            Some(order) => Ok(Some(order)),
            None => OrderRepository::get(&self.inner, merchant_id, id).await,
        }
    }

    async fn update(&self, order: &Order, expected_version: i64) -> RepositoryResult<()> {
        self.inner.update(order, expected_version).await
    }

    async fn list(&self, merchant_id: &str, filter: &OrderFilter) -> RepositoryResult<Vec<Order>> {
        self.inner.list(merchant_id, filter).await
    }
}

async fn stale_service(
    payment_policy: PaymentPolicy,
    inventory_policy: InventoryPolicy,
) -> (OrderingService, Arc<StaleOrders>) {
    let store = InMemoryStore::new();
    let orders = Arc::new(StaleOrders {
        inner: store.clone(),
        stale: Mutex::new(None),
    });
    let stale: Arc<dyn OrderRepository> = orders.clone();
    let mut stores = store.stores();
    stores.orders = stale;
    let service = service_with(stores, &settings(payment_policy, inventory_policy)).await;
    (service, orders)
}

#[tokio::test]
async fn test_losing_pay_race_voids_its_cash() {
    let (service, orders) = stale_service(PaymentPolicy::RequireFull, InventoryPolicy::OnPayment).await;

    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();
    let first = pay_with(&service, &order, PaymentType::Cash, 1150).await;
    let second = pay_with(&service, &order, PaymentType::Cash, 1150).await;

    service
        .pay_order(MERCHANT, &order.id, &[first.clone()])
        .await
        .unwrap();

    // The second request read the order while it was still open.
    orders.serve_once(order.clone());
    let err = service
        .pay_order(MERCHANT, &order.id, &[second.clone()])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let stored = service.get_order(MERCHANT, &order.id).await.unwrap();
    assert_eq!(stored.state, OrderState::Completed);
    assert_eq!(stored.payment_ids, vec![first]);
    assert_eq!(stored.amount_paid, usd(1150));

    // The drawer holds exactly what the order accepted.
    let drawer = service.cash_drawer(MERCHANT, LOCATION).await.unwrap();
    assert_eq!(drawer.amount, stored.amount_paid);
    let history = service
        .cash_drawers()
        .history(MERCHANT, &drawer_id(LOCATION))
        .await
        .unwrap();
    let ids: Vec<&str> = history.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[2], format!("{}:cash:v1:void", second));

    // The winner's deduction stands and was not doubled.
    assert_eq!(stock(&service, SANDWICH).await, 9);
    assert_eq!(stock(&service, SALAD).await, 9);

    // Retrying finds the order closed and changes nothing.
    let err = service
        .pay_order(MERCHANT, &order.id, &[second])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(service.cash_drawer(MERCHANT, LOCATION).await.unwrap().amount, usd(1150));
}

#[tokio::test]
async fn test_voided_partial_payment_can_be_retried() {
    let (service, orders) = stale_service(PaymentPolicy::AllowPartial, InventoryPolicy::OnPayment).await;

    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();
    let first = pay_with(&service, &order, PaymentType::Cash, 500).await;
    let second = pay_with(&service, &order, PaymentType::Cash, 650).await;

    service
        .pay_order(MERCHANT, &order.id, &[first.clone()])
        .await
        .unwrap();

    orders.serve_once(order.clone());
    let err = service
        .pay_order(MERCHANT, &order.id, &[second.clone()])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(service.cash_drawer(MERCHANT, LOCATION).await.unwrap().amount, usd(500));

    // A fresh read sees version 2, so the retry writes new ledger ids.
    let paid = service
        .pay_order(MERCHANT, &order.id, &[second.clone()])
        .await
        .unwrap();
    assert_eq!(paid.state, OrderState::Completed);
    assert_eq!(paid.payment_ids, vec![first, second]);
    assert_eq!(service.cash_drawer(MERCHANT, LOCATION).await.unwrap().amount, usd(1150));
    assert_eq!(stock(&service, SANDWICH).await, 9);
}

#[tokio::test]
async fn test_losing_completion_to_cancel_restores_stock() {
    let (service, orders) = stale_service(PaymentPolicy::RequireFull, InventoryPolicy::OnPayment).await;

    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();
    let payment = pay_with(&service, &order, PaymentType::Card, 1150).await;
    service
        .cancel_order(MERCHANT, &order.id, "customer left")
        .await
        .unwrap();

    orders.serve_once(order.clone());
    let err = service
        .pay_order(MERCHANT, &order.id, &[payment])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert_eq!(
        service.get_order(MERCHANT, &order.id).await.unwrap().state,
        OrderState::Canceled
    );
    assert_eq!(stock(&service, SANDWICH).await, 10);
    assert_eq!(stock(&service, SALAD).await, 10);
}

#[tokio::test]
async fn test_losing_cancel_race_takes_restock_back() {
    let (service, orders) = stale_service(PaymentPolicy::RequireFull, InventoryPolicy::OnCreation).await;

    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();
    assert_eq!(stock(&service, SANDWICH).await, 9);
    let payment = pay_with(&service, &order, PaymentType::Card, 1150).await;
    service.pay_order(MERCHANT, &order.id, &[payment]).await.unwrap();

    orders.serve_once(order.clone());
    let err = service
        .cancel_order(MERCHANT, &order.id, "changed mind")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert_eq!(
        service.get_order(MERCHANT, &order.id).await.unwrap().state,
        OrderState::Completed
    );
    assert_eq!(stock(&service, SANDWICH).await, 9);
    assert_eq!(stock(&service, SALAD).await, 9);

    let history = service
        .inventory()
        .history(MERCHANT, SANDWICH, LOCATION)
        .await
        .unwrap();
    let ops: Vec<AdjustmentOp> = history.iter().map(|a| a.op).collect();
    assert_eq!(
        ops,
        vec![
            AdjustmentOp::ResetStock,
            AdjustmentOp::RemoveStock,
            AdjustmentOp::AddStock,
            AdjustmentOp::RemoveStock,
        ]
    );
}

// =============================================================================
// Ledgers
// =============================================================================

fn adjustment(id: &str, op: AdjustmentOp, quantity: i64) -> InventoryAdjustment {
    InventoryAdjustment {
        id: id.to_string(),
        item_variation_id: SANDWICH.to_string(),
        location_id: LOCATION.to_string(),
        merchant_id: MERCHANT.to_string(),
        op,
        quantity,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_inventory_replay() {
    let service = default_service().await;
    let ledger = service.inventory();

    let counts = ledger
        .apply_adjustments(
            MERCHANT,
            &[
                adjustment("r-1", AdjustmentOp::ResetStock, 10),
                adjustment("r-2", AdjustmentOp::RemoveStock, 3),
                adjustment("r-3", AdjustmentOp::AddStock, 1),
            ],
        )
        .await
        .unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].quantity, 8);
    assert_eq!(counts[0].state, InventoryState::InStock);

    let counts = ledger
        .apply_adjustments(
            MERCHANT,
            &[
                adjustment("s-1", AdjustmentOp::ResetStock, 5),
                adjustment("s-2", AdjustmentOp::RemoveStock, 5),
            ],
        )
        .await
        .unwrap();
    assert_eq!(counts[0].quantity, 0);
    assert_eq!(counts[0].state, InventoryState::Sold);
}

#[tokio::test]
async fn test_inventory_batch_is_idempotent() {
    let service = default_service().await;
    let batch = [adjustment("delivery-7", AdjustmentOp::AddStock, 12)];

    service.inventory().apply_adjustments(MERCHANT, &batch).await.unwrap();
    let again = service.inventory().apply_adjustments(MERCHANT, &batch).await.unwrap();

    assert_eq!(again[0].quantity, 22);
    assert_eq!(stock(&service, SANDWICH).await, 22);
}

#[tokio::test]
async fn test_inventory_rejects_bad_batches() {
    let service = default_service().await;
    let ledger = service.inventory();

    let mut unknown = adjustment("u-1", AdjustmentOp::AddStock, 1);
    unknown.item_variation_id = "v-missing".to_string();
    let err = ledger.apply_adjustments(MERCHANT, &[unknown]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = ledger
        .apply_adjustments(MERCHANT, &[adjustment("n-1", AdjustmentOp::RemoveStock, -2)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let twice = [
        adjustment("d-1", AdjustmentOp::AddStock, 1),
        adjustment("d-1", AdjustmentOp::AddStock, 1),
    ];
    let err = ledger.apply_adjustments(MERCHANT, &twice).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = ledger
        .apply_adjustments(OTHER_MERCHANT, &[adjustment("x-1", AdjustmentOp::AddStock, 1)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(stock(&service, SANDWICH).await, 10);
}

#[tokio::test]
async fn test_cash_drawer_manual_adjustments() {
    let service = default_service().await;
    let order = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();
    let payment = pay_with(&service, &order, PaymentType::Cash, 1150).await;
    service.pay_order(MERCHANT, &order.id, &[payment]).await.unwrap();

    let payout = CashDrawerAdjustment {
        id: "payout-1".to_string(),
        cash_drawer_id: drawer_id(LOCATION),
        op: CashDrawerOp::Remove,
        amount: usd(200),
        note: "Window cleaner".to_string(),
        created_at: Utc::now(),
    };
    let drawer = service.cash_drawers().adjust(MERCHANT, &payout).await.unwrap();
    assert_eq!(drawer.amount, usd(950));

    // Same id again is a no-op.
    let drawer = service.cash_drawers().adjust(MERCHANT, &payout).await.unwrap();
    assert_eq!(drawer.amount, usd(950));

    let mut elsewhere = payout.clone();
    elsewhere.id = "payout-2".to_string();
    elsewhere.cash_drawer_id = drawer_id("loc-nowhere");
    let err = service.cash_drawers().adjust(MERCHANT, &elsewhere).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service.cash_drawers().adjust(OTHER_MERCHANT, &payout).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_list_orders_filters_by_state() {
    let service = default_service().await;

    let open = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();
    let canceled = service.create_order(MERCHANT, &lunch_schema()).await.unwrap();
    service
        .cancel_order(MERCHANT, &canceled.id, "duplicate ticket")
        .await
        .unwrap();

    let all = service
        .list_orders(MERCHANT, &OrderFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let filter = OrderFilter {
        state: Some(OrderState::Open),
        ..Default::default()
    };
    let open_only = service.list_orders(MERCHANT, &filter).await.unwrap();
    assert_eq!(open_only.len(), 1);
    assert_eq!(open_only[0].id, open.id);

    assert!(service
        .list_orders(OTHER_MERCHANT, &OrderFilter::default())
        .await
        .unwrap()
        .is_empty());
}
