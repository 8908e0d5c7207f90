//! # meridian-core: Pure Order Fulfillment Logic
//!
//! Prices orders, moves them through their lifecycle and computes the
//! ledger effects of a sale. Everything here is deterministic and free of
//! I/O; storage is reached only through the traits in [`ports`].
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Meridian Back Office: Ordering                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            HTTP layer (outside this workspace)                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   meridian-ordering: OrderingService, ledgers, config           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ meridian-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐  ┌────────────┐  ┌────────────┐  ┌─────────┐  │   │
//! │  │   │ calculator │  │   state    │  │ inventory  │  │  ports  │  │   │
//! │  │   │ allocation │  │  payments  │  │ cash_drawer│  │ (traits)│  │   │
//! │  │   └────────────┘  └────────────┘  └────────────┘  └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                ▲                                        │
//! │  ┌─────────────────────────────┴───────────────────────────────────┐   │
//! │  │      meridian-db: SQLite repositories implementing ports        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money in minor units and basis-point percentages
//! - [`types`] - Catalog, schema, order, payment and ledger types
//! - [`calculator`] - Schema + catalog snapshot → priced order
//! - [`allocation`] - Largest-remainder distribution
//! - [`state`] - Order lifecycle and payment application
//! - [`inventory`] / [`cash_drawer`] - Ledger arithmetic
//! - [`ports`] - Repository traits
//!
//! ## Example Usage
//!
//! ```rust
//! use meridian_core::calculator::{calculate, CatalogSnapshot};
//! use meridian_core::money::{Currency, Money};
//! use meridian_core::types::{CatalogStatus, ItemVariation, OrderSchema, SchemaLineItem};
//!
//! let snapshot = CatalogSnapshot::new().with_variation(ItemVariation {
//!     id: "latte".into(),
//!     item_id: "coffee".into(),
//!     merchant_id: "m-1".into(),
//!     name: "Latte".into(),
//!     price: Money::new(450, Currency::Usd),
//!     location_ids: vec![],
//!     status: CatalogStatus::Active,
//! });
//!
//! let schema = OrderSchema {
//!     location_id: "loc-1".into(),
//!     merchant_id: "m-1".into(),
//!     customer_id: None,
//!     employee_id: None,
//!     currency: Currency::Usd,
//!     line_items: vec![SchemaLineItem {
//!         uid: "a".into(),
//!         variation_id: "latte".into(),
//!         quantity: 2,
//!     }],
//!     taxes: vec![],
//!     discounts: vec![],
//! };
//!
//! let priced = calculate(&schema, &snapshot).unwrap();
//! assert_eq!(priced.total_amount.amount(), 900);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod calculator;
pub mod cash_drawer;
pub mod error;
pub mod inventory;
pub mod money;
pub mod ports;
pub mod state;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use calculator::{calculate, CatalogSnapshot, PricedOrder};
pub use error::{CoreError, CoreResult, ValidationError};
pub use inventory::InventoryPolicy;
pub use money::{Currency, Money, Percentage};
pub use state::{PaymentOutcome, PaymentPolicy};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items in one order schema.
pub const MAX_LINE_ITEMS: usize = 500;

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Catches keying mistakes (10000 instead of 10) before they reach stock.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Maximum length of a uid or entity id.
pub const MAX_UID_LENGTH: usize = 64;

/// Maximum length of a cancellation reason, in characters.
pub const MAX_REASON_LENGTH: usize = 500;
