//! # Repository Module
//!
//! SQLite implementations of the `meridian_core::ports` traits.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  OrderingService                                                        │
//! │       │  Arc<dyn OrderRepository>                                       │
//! │       ▼                                                                 │
//! │  SqliteOrderRepository                                                  │
//! │  ├── insert(&order)                                                     │
//! │  ├── get(merchant_id, id)                                               │
//! │  ├── update(&order, expected_version)  ← WHERE version = ?             │
//! │  └── list(merchant_id, &filter)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (orders, payments, inventory_*, cash_drawer*, catalog tables)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every handle is a cheap clone of the pool. Queries are runtime-checked
//! (`sqlx::query` / `query_as` with `FromRow` records); records convert into
//! domain types with `TryFrom`, failing with `DbError::Decode` on bad rows.
//!
//! ## Available Repositories
//!
//! - [`SqliteCatalogRepository`] - Variations, taxes, discounts, locations
//! - [`SqliteOrderRepository`] - Orders with version-guarded updates
//! - [`SqlitePaymentRepository`] - Payments
//! - [`SqliteInventoryRepository`] - Counts and the adjustment ledger
//! - [`SqliteCashDrawerRepository`] - Drawers and their ledger

pub mod cash_drawer;
pub mod catalog;
pub mod inventory;
pub mod order;
pub mod payment;

pub use cash_drawer::SqliteCashDrawerRepository;
pub use catalog::SqliteCatalogRepository;
pub use inventory::SqliteInventoryRepository;
pub use order::SqliteOrderRepository;
pub use payment::SqlitePaymentRepository;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DbError, DbResult};

/// Encodes a value for a JSON TEXT column.
pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> DbResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decodes a JSON TEXT column, naming the column on failure.
pub(crate) fn from_json<T: DeserializeOwned>(column: &'static str, raw: &str) -> DbResult<T> {
    serde_json::from_str(raw).map_err(|e| DbError::decode(column, e))
}

/// Orders fetched rows by their position in `ids`.
pub(crate) fn sort_by_requested<T>(mut rows: Vec<T>, ids: &[String], id_of: impl Fn(&T) -> &str) -> Vec<T> {
    rows.sort_by_key(|row| {
        ids.iter()
            .position(|id| id == id_of(row))
            .unwrap_or(usize::MAX)
    });
    rows
}
