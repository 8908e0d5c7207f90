//! # Order Calculator
//!
//! Turns an [`OrderSchema`] plus a resolved [`CatalogSnapshot`] into a fully
//! priced order. Pure and deterministic: no I/O, no clock, no id generation.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  OrderSchema + CatalogSnapshot                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. validate_schema()            empty / non-positive qty / dup uid    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. resolve line items           gross = base_price × quantity         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. discounts                    order amount → allocate by gross      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  4. taxes                        item scope: per-item net × rate       │
//! │       │                          order scope: allocate by net          │
//! │       ▼                                                                 │
//! │  5. totals                       Σ item.total_amount == order total    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every order-level amount is split with the largest-remainder method
//! (see [`crate::allocation`]), so no cent is created or lost.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::allocation::allocate;
use crate::error::{CoreError, CoreResult};
use crate::money::{Currency, Money};
use crate::types::{
    available_at, AppliedDiscount, AppliedTax, CatalogStatus, Discount, DiscountKind,
    ItemVariation, Order, OrderDiscount, OrderItem, OrderSchema, OrderState, OrderTax, Tax,
    TaxScope,
};
use crate::validation::validate_schema;

// =============================================================================
// Catalog Snapshot
// =============================================================================

/// The catalog entities an order schema refers to, resolved ahead of time.
///
/// Owned copies: the calculator never shares buffers with the catalog store,
/// and later catalog edits cannot reach a calculated order.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub variations: HashMap<String, ItemVariation>,
    pub taxes: HashMap<String, Tax>,
    pub discounts: HashMap<String, Discount>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variation(mut self, variation: ItemVariation) -> Self {
        self.variations.insert(variation.id.clone(), variation);
        self
    }

    pub fn with_tax(mut self, tax: Tax) -> Self {
        self.taxes.insert(tax.id.clone(), tax);
        self
    }

    pub fn with_discount(mut self, discount: Discount) -> Self {
        self.discounts.insert(discount.id.clone(), discount);
        self
    }
}

// =============================================================================
// Priced Order
// =============================================================================

/// The calculator's output: everything an [`Order`] needs except identity
/// and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub merchant_id: String,
    pub location_id: String,
    pub customer_id: Option<String>,
    pub employee_id: Option<String>,
    pub currency: Currency,
    pub items: Vec<OrderItem>,
    pub taxes: Vec<OrderTax>,
    pub discounts: Vec<OrderDiscount>,
    pub total_discount_amount: Money,
    pub total_tax_amount: Money,
    pub total_amount: Money,
}

impl PricedOrder {
    /// Wraps the priced contents into a new `open` order.
    pub fn into_order(self, id: String, now: DateTime<Utc>) -> Order {
        Order {
            id,
            merchant_id: self.merchant_id,
            location_id: self.location_id,
            customer_id: self.customer_id,
            employee_id: self.employee_id,
            state: OrderState::Open,
            currency: self.currency,
            items: self.items,
            taxes: self.taxes,
            discounts: self.discounts,
            total_discount_amount: self.total_discount_amount,
            total_tax_amount: self.total_tax_amount,
            total_amount: self.total_amount,
            payment_types: Vec::new(),
            payment_ids: Vec::new(),
            amount_paid: Money::zero(self.currency),
            cancel_reason: None,
            version: 1,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }
}

// =============================================================================
// Calculate
// =============================================================================

/// Prices an order schema against a catalog snapshot.
///
/// ## Errors
/// Only validation failures: malformed schema, unknown / inactive /
/// cross-tenant catalog references, entities not sold at the location,
/// currency mismatches, overflow.
///
/// ## Decisions
/// - Discounts are applied in schema order; each is capped at the part of
///   the gross that earlier discounts left and split by what each item has
///   left, so no line item goes negative.
/// - A schema tax `scope` overrides the catalog tax scope.
pub fn calculate(schema: &OrderSchema, snapshot: &CatalogSnapshot) -> CoreResult<PricedOrder> {
    validate_schema(schema)?;
    let currency = schema.currency;

    // ---------------------------------------------------------------------
    // Line items
    // ---------------------------------------------------------------------
    let mut items = Vec::with_capacity(schema.line_items.len());
    for line in &schema.line_items {
        let variation = resolve_variation(schema, snapshot, &line.variation_id)?;
        let base_price = variation.price;
        Money::zero(currency).ensure_same_currency(&base_price)?;
        let gross_sales = base_price.multiply_quantity(line.quantity)?;

        items.push(OrderItem {
            uid: line.uid.clone(),
            variation_id: variation.id.clone(),
            name: variation.name.clone(),
            quantity: line.quantity,
            base_price,
            gross_sales,
            applied_taxes: Vec::new(),
            applied_discounts: Vec::new(),
            total_discount_amount: Money::zero(currency),
            total_tax_amount: Money::zero(currency),
            total_amount: Money::zero(currency),
        });
    }

    let gross_total = Money::sum(currency, items.iter().map(|i| i.gross_sales))?;

    // ---------------------------------------------------------------------
    // Discounts
    // ---------------------------------------------------------------------
    let mut order_discounts = Vec::with_capacity(schema.discounts.len());
    // Per-item gross not yet taken by earlier discounts.
    let mut remaining: Vec<i64> = items.iter().map(|i| i.gross_sales.amount().max(0)).collect();
    let mut undiscounted: i64 = remaining.iter().sum();
    for entry in &schema.discounts {
        let discount = resolve_discount(schema, snapshot, &entry.discount_id)?;
        let requested = match discount.kind {
            DiscountKind::Percentage { percentage } => gross_total.percentage_of(percentage),
            DiscountKind::Fixed { amount } => {
                Money::zero(currency).ensure_same_currency(&amount)?;
                amount
            }
        };
        let amount = requested.amount().clamp(0, undiscounted);
        undiscounted -= amount;

        // amount <= Σ remaining, so no share exceeds its item's remainder
        let shares = allocate(amount, &remaining);
        for ((item, left), share) in items.iter_mut().zip(remaining.iter_mut()).zip(shares) {
            *left -= share;
            item.applied_discounts.push(AppliedDiscount {
                discount_uid: entry.uid.clone(),
                applied_amount: Money::new(share, currency),
            });
        }

        order_discounts.push(OrderDiscount {
            uid: entry.uid.clone(),
            discount_id: discount.id.clone(),
            name: discount.name.clone(),
            kind: discount.kind,
            applied_amount: Money::new(amount, currency),
        });
    }

    for item in items.iter_mut() {
        item.total_discount_amount =
            Money::sum(currency, item.applied_discounts.iter().map(|d| d.applied_amount))?;
    }

    // ---------------------------------------------------------------------
    // Taxes
    // ---------------------------------------------------------------------
    let net_bases: Vec<Money> = items
        .iter()
        .map(|i| i.gross_sales.checked_sub(i.total_discount_amount))
        .collect::<CoreResult<_>>()?;
    let net_weights: Vec<i64> = net_bases.iter().map(|n| n.amount().max(0)).collect();
    let net_total = Money::new(net_weights.iter().sum(), currency);

    let mut order_taxes = Vec::with_capacity(schema.taxes.len());
    for entry in &schema.taxes {
        let tax = resolve_tax(schema, snapshot, &entry.tax_id)?;
        let scope = entry.scope.unwrap_or(tax.scope);

        let shares: Vec<i64> = match scope {
            TaxScope::Item => net_weights
                .iter()
                .map(|net| Money::new(*net, currency).percentage_of(tax.percentage).amount())
                .collect(),
            TaxScope::Order => {
                let total = net_total.percentage_of(tax.percentage);
                allocate(total.amount(), &net_weights)
            }
        };

        let applied: i64 = shares.iter().sum();
        for (item, share) in items.iter_mut().zip(shares) {
            item.applied_taxes.push(AppliedTax {
                tax_uid: entry.uid.clone(),
                applied_amount: Money::new(share, currency),
            });
        }

        order_taxes.push(OrderTax {
            uid: entry.uid.clone(),
            tax_id: tax.id.clone(),
            name: tax.name.clone(),
            percentage: tax.percentage,
            scope,
            applied_amount: Money::new(applied, currency),
        });
    }

    // ---------------------------------------------------------------------
    // Totals
    // ---------------------------------------------------------------------
    for item in items.iter_mut() {
        item.total_tax_amount =
            Money::sum(currency, item.applied_taxes.iter().map(|t| t.applied_amount))?;
        item.total_amount = item
            .gross_sales
            .checked_sub(item.total_discount_amount)?
            .checked_add(item.total_tax_amount)?;
    }

    let total_discount_amount =
        Money::sum(currency, items.iter().map(|i| i.total_discount_amount))?;
    let total_tax_amount = Money::sum(currency, items.iter().map(|i| i.total_tax_amount))?;
    let total_amount = Money::sum(currency, items.iter().map(|i| i.total_amount))?;

    Ok(PricedOrder {
        merchant_id: schema.merchant_id.clone(),
        location_id: schema.location_id.clone(),
        customer_id: schema.customer_id.clone(),
        employee_id: schema.employee_id.clone(),
        currency,
        items,
        taxes: order_taxes,
        discounts: order_discounts,
        total_discount_amount,
        total_tax_amount,
        total_amount,
    })
}

// =============================================================================
// Resolution helpers
// =============================================================================

fn resolve_variation<'a>(
    schema: &OrderSchema,
    snapshot: &'a CatalogSnapshot,
    id: &str,
) -> CoreResult<&'a ItemVariation> {
    let variation = snapshot
        .variations
        .get(id)
        .filter(|v| v.merchant_id == schema.merchant_id && v.status == CatalogStatus::Active)
        .ok_or_else(|| CoreError::UnknownVariation(id.to_string()))?;
    if !available_at(&variation.location_ids, &schema.location_id) {
        return Err(CoreError::NotAtLocation {
            entity: "Item variation",
            id: id.to_string(),
            location_id: schema.location_id.clone(),
        });
    }
    Ok(variation)
}

fn resolve_tax<'a>(
    schema: &OrderSchema,
    snapshot: &'a CatalogSnapshot,
    id: &str,
) -> CoreResult<&'a Tax> {
    let tax = snapshot
        .taxes
        .get(id)
        .filter(|t| t.merchant_id == schema.merchant_id && t.status == CatalogStatus::Active)
        .ok_or_else(|| CoreError::UnknownTax(id.to_string()))?;
    if !available_at(&tax.location_ids, &schema.location_id) {
        return Err(CoreError::NotAtLocation {
            entity: "Tax",
            id: id.to_string(),
            location_id: schema.location_id.clone(),
        });
    }
    Ok(tax)
}

fn resolve_discount<'a>(
    schema: &OrderSchema,
    snapshot: &'a CatalogSnapshot,
    id: &str,
) -> CoreResult<&'a Discount> {
    let discount = snapshot
        .discounts
        .get(id)
        .filter(|d| d.merchant_id == schema.merchant_id && d.status == CatalogStatus::Active)
        .ok_or_else(|| CoreError::UnknownDiscount(id.to_string()))?;
    if !available_at(&discount.location_ids, &schema.location_id) {
        return Err(CoreError::NotAtLocation {
            entity: "Discount",
            id: id.to_string(),
            location_id: schema.location_id.clone(),
        });
    }
    Ok(discount)
}

// =============================================================================
// Unit Tests
// =============================================================================
