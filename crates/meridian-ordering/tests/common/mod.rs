//! Shared fixtures: one merchant with a single USD location selling a
//! $5.00 sandwich and a $6.50 salad.
#![allow(dead_code)]

use chrono::Utc;

use meridian_core::ports::CatalogBatch;
use meridian_core::{
    AdjustmentOp, CatalogStatus, Currency, Discount, DiscountKind, InventoryAdjustment,
    InventoryPolicy, ItemVariation, Location, Money, Order, OrderSchema, PaymentPolicy,
    PaymentType, Percentage, SchemaDiscount, SchemaLineItem,
};
use meridian_ordering::{NewPayment, OrderingService, OrderingSettings, Stores};

pub const MERCHANT: &str = "m-1";
pub const OTHER_MERCHANT: &str = "m-2";
pub const LOCATION: &str = "loc-1";
pub const SANDWICH: &str = "v-sandwich";
pub const SALAD: &str = "v-salad";
pub const STAFF_DISCOUNT: &str = "d-staff";

pub fn usd(amount: i64) -> Money {
    Money::new(amount, Currency::Usd)
}

pub fn catalog(merchant_id: &str) -> CatalogBatch {
    let variation = |id: &str, name: &str, price: i64| ItemVariation {
        id: id.to_string(),
        item_id: format!("item-{}", id),
        merchant_id: merchant_id.to_string(),
        name: name.to_string(),
        price: usd(price),
        location_ids: vec![],
        status: CatalogStatus::Active,
    };

    CatalogBatch {
        locations: vec![Location {
            id: LOCATION.to_string(),
            merchant_id: merchant_id.to_string(),
            name: "Downtown".to_string(),
            currency: Currency::Usd,
            status: CatalogStatus::Active,
        }],
        variations: vec![
            variation(SANDWICH, "Sandwich", 500),
            variation(SALAD, "Salad", 650),
        ],
        taxes: vec![],
        discounts: vec![Discount {
            id: STAFF_DISCOUNT.to_string(),
            merchant_id: merchant_id.to_string(),
            name: "Staff".to_string(),
            kind: DiscountKind::Percentage {
                percentage: Percentage::from_bps(1000),
            },
            location_ids: vec![],
            status: CatalogStatus::Active,
        }],
    }
}

pub fn settings(payment_policy: PaymentPolicy, inventory_policy: InventoryPolicy) -> OrderingSettings {
    OrderingSettings {
        payment_policy,
        inventory_policy,
        ..OrderingSettings::default()
    }
}

/// A service over `stores` with the fixture catalog loaded and 10 of each
/// variation in stock.
pub async fn service_with(stores: Stores, settings: &OrderingSettings) -> OrderingService {
    let service = OrderingService::new(stores, settings);
    service.put_catalog(MERCHANT, &catalog(MERCHANT)).await.unwrap();

    let restock: Vec<InventoryAdjustment> = [SANDWICH, SALAD]
        .iter()
        .map(|variation| InventoryAdjustment {
            id: format!("initial:{}", variation),
            item_variation_id: variation.to_string(),
            location_id: LOCATION.to_string(),
            merchant_id: MERCHANT.to_string(),
            op: AdjustmentOp::ResetStock,
            quantity: 10,
            created_at: Utc::now(),
        })
        .collect();
    service
        .inventory()
        .apply_adjustments(MERCHANT, &restock)
        .await
        .unwrap();
    service
}

pub fn line(uid: &str, variation_id: &str, quantity: i64) -> SchemaLineItem {
    SchemaLineItem {
        uid: uid.to_string(),
        variation_id: variation_id.to_string(),
        quantity,
    }
}

/// One sandwich and one salad, nothing else: $11.50.
pub fn lunch_schema() -> OrderSchema {
    OrderSchema {
        location_id: LOCATION.to_string(),
        merchant_id: MERCHANT.to_string(),
        customer_id: None,
        employee_id: None,
        currency: Currency::Usd,
        line_items: vec![line("a", SANDWICH, 1), line("b", SALAD, 1)],
        taxes: vec![],
        discounts: vec![],
    }
}

pub fn staff_discount() -> SchemaDiscount {
    SchemaDiscount {
        uid: "staff".to_string(),
        discount_id: STAFF_DISCOUNT.to_string(),
    }
}

pub async fn pay_with(
    service: &OrderingService,
    order: &Order,
    payment_type: PaymentType,
    amount: i64,
) -> String {
    let payment = service
        .create_payment(
            MERCHANT,
            NewPayment {
                order_id: order.id.clone(),
                payment_type,
                amount: usd(amount),
                tip_amount: usd(0),
            },
        )
        .await
        .unwrap();
    payment.id
}

pub async fn stock(service: &OrderingService, variation_id: &str) -> i64 {
    service
        .inventory()
        .count(MERCHANT, variation_id, LOCATION)
        .await
        .unwrap()
        .quantity
}
