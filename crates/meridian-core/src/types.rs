//! # Domain Types
//!
//! Core domain types of the order fulfillment engine.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog (read-only here)     Input               Output                │
//! │  ─────────────────────────    ─────────────────   ───────────────────── │
//! │  ItemVariation                OrderSchema ──────► Order                 │
//! │  Tax (item | order scope)       line_items          items[OrderItem]    │
//! │  Discount (pct | fixed)         taxes               taxes[OrderTax]     │
//! │  Location                       discounts           discounts[...]      │
//! │                                                                         │
//! │  Payment ──► pay_order ──► InventoryAdjustment ──► InventoryCount       │
//! │                       └──► CashDrawerAdjustment ──► CashDrawer          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tenancy
//! Every persisted entity carries `merchant_id`. Lookups that cross merchants
//! behave exactly like lookups of ids that do not exist.
//!
//! ## Snapshot Pattern
//! `OrderItem`, `OrderTax` and `OrderDiscount` copy names, prices and rates at
//! calculation time so later catalog edits never rewrite historical orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{Currency, Money, Percentage};

// =============================================================================
// Catalog
// =============================================================================

/// Whether a catalog entity can be sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CatalogStatus {
    #[default]
    Active,
    Inactive,
}

/// Returns true when an entity restricted to `location_ids` may be used at
/// `location_id`. An empty list means "every location of the merchant".
pub fn available_at(location_ids: &[String], location_id: &str) -> bool {
    location_ids.is_empty() || location_ids.iter().any(|l| l == location_id)
}

/// A physical store of a merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Location {
    pub id: String,
    pub merchant_id: String,
    pub name: String,
    pub currency: Currency,
    pub status: CatalogStatus,
}

/// A sellable variation of a catalog item (e.g. "Latte, Large").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemVariation {
    pub id: String,
    pub item_id: String,
    pub merchant_id: String,
    pub name: String,
    pub price: Money,
    /// Locations where the variation is sold; empty = all.
    pub location_ids: Vec<String>,
    pub status: CatalogStatus,
}

/// Whether a tax applies per line item or to the order subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaxScope {
    Order,
    Item,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Tax {
    pub id: String,
    pub merchant_id: String,
    pub name: String,
    pub percentage: Percentage,
    pub scope: TaxScope,
    pub location_ids: Vec<String>,
    pub status: CatalogStatus,
}

/// Storage discriminator for [`DiscountKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

/// How a discount computes its order-level amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountKind {
    /// `round(gross * percentage / 100)`.
    Percentage { percentage: Percentage },
    /// A fixed amount off the order.
    Fixed { amount: Money },
}

impl DiscountKind {
    pub fn discount_type(&self) -> DiscountType {
        match self {
            DiscountKind::Percentage { .. } => DiscountType::Percentage,
            DiscountKind::Fixed { .. } => DiscountType::Fixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Discount {
    pub id: String,
    pub merchant_id: String,
    pub name: String,
    pub kind: DiscountKind,
    pub location_ids: Vec<String>,
    pub status: CatalogStatus,
}

// =============================================================================
// Order Schema (input)
// =============================================================================

/// The unpriced, caller-supplied description of an order.
///
/// Ephemeral: it is discarded once the calculator has produced an `Order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderSchema {
    pub location_id: String,
    pub merchant_id: String,
    pub customer_id: Option<String>,
    pub employee_id: Option<String>,
    pub currency: Currency,
    pub line_items: Vec<SchemaLineItem>,
    #[serde(default)]
    pub taxes: Vec<SchemaTax>,
    #[serde(default)]
    pub discounts: Vec<SchemaDiscount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SchemaLineItem {
    /// Caller correlation id, unique within the schema.
    pub uid: String,
    pub variation_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SchemaTax {
    pub uid: String,
    pub tax_id: String,
    /// Overrides the catalog scope when present.
    #[serde(default)]
    pub scope: Option<TaxScope>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SchemaDiscount {
    pub uid: String,
    pub discount_id: String,
}

// =============================================================================
// Order (output)
// =============================================================================

/// Lifecycle state of an order. See `state.rs` for the legal moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    #[default]
    Open,
    Completed,
    Canceled,
}

impl OrderState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderState::Open => "open",
            OrderState::Completed => "completed",
            OrderState::Canceled => "canceled",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(OrderState::Open),
            "completed" => Ok(OrderState::Completed),
            "canceled" => Ok(OrderState::Canceled),
            other => Err(ValidationError::NotAllowed {
                field: format!("state '{}'", other),
                allowed: vec!["open".into(), "completed".into(), "canceled".into()],
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Physical cash; moves the location's cash drawer.
    Cash,
    /// Card on an external terminal.
    Card,
    Other,
}

/// A tax's share on one line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppliedTax {
    pub tax_uid: String,
    pub applied_amount: Money,
}

/// A discount's share on one line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppliedDiscount {
    pub discount_uid: String,
    pub applied_amount: Money,
}

/// A priced line item.
///
/// ## Invariants
/// - `gross_sales = base_price * quantity`
/// - `total_amount = gross_sales - total_discount_amount + total_tax_amount`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItem {
    pub uid: String,
    pub variation_id: String,
    /// Variation name at time of calculation (frozen).
    pub name: String,
    pub quantity: i64,
    /// Unit price at time of calculation (frozen).
    pub base_price: Money,
    pub gross_sales: Money,
    pub applied_taxes: Vec<AppliedTax>,
    pub applied_discounts: Vec<AppliedDiscount>,
    pub total_discount_amount: Money,
    pub total_tax_amount: Money,
    pub total_amount: Money,
}

/// Order-level tax summary, summed across items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderTax {
    pub uid: String,
    pub tax_id: String,
    pub name: String,
    pub percentage: Percentage,
    pub scope: TaxScope,
    pub applied_amount: Money,
}

/// Order-level discount summary, summed across items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDiscount {
    pub uid: String,
    pub discount_id: String,
    pub name: String,
    pub kind: DiscountKind,
    pub applied_amount: Money,
}

/// A priced order.
///
/// Created once in state `open`; mutated only by state transitions and
/// payment application; never deleted. `version` increases on every write
/// and guards concurrent updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub merchant_id: String,
    pub location_id: String,
    pub customer_id: Option<String>,
    pub employee_id: Option<String>,
    pub state: OrderState,
    pub currency: Currency,
    pub items: Vec<OrderItem>,
    pub taxes: Vec<OrderTax>,
    pub discounts: Vec<OrderDiscount>,
    pub total_discount_amount: Money,
    pub total_tax_amount: Money,
    pub total_amount: Money,
    /// Distinct payment types applied so far, in order of first use.
    pub payment_types: Vec<PaymentType>,
    pub payment_ids: Vec<String>,
    /// Sum of `amount + tip_amount` of the applied payments.
    pub amount_paid: Money,
    pub cancel_reason: Option<String>,
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Payment
// =============================================================================

/// A payment towards an order. An order can have several (split tender).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub merchant_id: String,
    pub order_id: String,
    pub payment_type: PaymentType,
    pub amount: Money,
    pub tip_amount: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Inventory
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InventoryState {
    InStock,
    /// Quantity is exactly zero.
    #[default]
    Sold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentOp {
    AddStock,
    RemoveStock,
    ResetStock,
}

impl FromStr for AdjustmentOp {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add_stock" => Ok(AdjustmentOp::AddStock),
            "remove_stock" => Ok(AdjustmentOp::RemoveStock),
            "reset_stock" => Ok(AdjustmentOp::ResetStock),
            _ => Err(ValidationError::NotAllowed {
                field: "op".to_string(),
                allowed: vec![
                    "add_stock".into(),
                    "remove_stock".into(),
                    "reset_stock".into(),
                ],
            }),
        }
    }
}

/// Materialized on-hand count for one (variation, location) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryCount {
    pub id: String,
    pub item_variation_id: String,
    pub location_id: String,
    pub merchant_id: String,
    pub quantity: i64,
    pub state: InventoryState,
    /// Bumped on every write; guards concurrent recalculation.
    pub version: i64,
    #[ts(as = "String")]
    pub calculated_at: DateTime<Utc>,
}

/// Append-only inventory ledger entry. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryAdjustment {
    pub id: String,
    pub item_variation_id: String,
    pub location_id: String,
    pub merchant_id: String,
    pub op: AdjustmentOp,
    pub quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Cash Drawer
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CashDrawerOp {
    Add,
    Remove,
}

impl FromStr for CashDrawerOp {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(CashDrawerOp::Add),
            "remove" => Ok(CashDrawerOp::Remove),
            _ => Err(ValidationError::NotAllowed {
                field: "op".to_string(),
                allowed: vec!["add".into(), "remove".into()],
            }),
        }
    }
}

/// Cash balance of one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashDrawer {
    pub id: String,
    pub location_id: String,
    pub merchant_id: String,
    pub amount: Money,
    pub version: i64,
    #[ts(as = "String")]
    pub calculated_at: DateTime<Utc>,
}

/// Append-only cash drawer ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashDrawerAdjustment {
    pub id: String,
    pub cash_drawer_id: String,
    pub op: CashDrawerOp,
    pub amount: Money,
    pub note: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_at() {
        assert!(available_at(&[], "loc-1"));
        assert!(available_at(&["loc-1".to_string()], "loc-1"));
        assert!(!available_at(&["loc-2".to_string()], "loc-1"));
    }

    #[test]
    fn test_order_state_round_trips_as_str() {
        for state in [OrderState::Open, OrderState::Completed, OrderState::Canceled] {
            assert_eq!(state.as_str().parse::<OrderState>().unwrap(), state);
        }
        assert!("paid".parse::<OrderState>().is_err());
    }

    #[test]
    fn test_unknown_ops_are_validation_errors() {
        assert!(matches!(
            "withdraw".parse::<CashDrawerOp>(),
            Err(ValidationError::NotAllowed { .. })
        ));
        assert_eq!("remove_stock".parse::<AdjustmentOp>().unwrap(), AdjustmentOp::RemoveStock);
    }

    #[test]
    fn test_discount_kind_serializes_with_type_tag() {
        let kind = DiscountKind::Percentage {
            percentage: Percentage::from_bps(1000),
        };
        let json = serde_json::to_value(kind).unwrap();
        assert_eq!(json["type"], "percentage");
        assert_eq!(json["percentage"], 1000);
        assert_eq!(kind.discount_type(), DiscountType::Percentage);
    }

    #[test]
    fn test_schema_defaults_optional_lists() {
        let json = r#"{
            "location_id": "loc-1",
            "merchant_id": "m-1",
            "customer_id": null,
            "employee_id": null,
            "currency": "USD",
            "line_items": [{"uid": "a", "variation_id": "v-1", "quantity": 2}]
        }"#;
        let schema: OrderSchema = serde_json::from_str(json).unwrap();
        assert!(schema.taxes.is_empty());
        assert!(schema.discounts.is_empty());
        assert_eq!(schema.line_items[0].quantity, 2);
    }
}
