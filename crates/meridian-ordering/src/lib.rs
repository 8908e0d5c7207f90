//! # meridian-ordering: Order Fulfillment Service
//!
//! Turns order schemas into priced orders and drives them to completion or
//! cancellation, keeping inventory and cash drawers in step.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    HTTP layer (outside this workspace)                  │
//! │                 resolves the acting merchant, maps ErrorKind            │
//! └───────────────────────────────────┬─────────────────────────────────────┘
//!                                     │
//! ┌───────────────────────────────────▼─────────────────────────────────────┐
//! │              ★ meridian-ordering (THIS CRATE) ★                         │
//! │                                                                         │
//! │   OrderingService ──► CatalogLoader ──► calculate()  (meridian-core)    │
//! │         │                                                               │
//! │         ├──────────► InventoryLedger    idempotent, retried on conflict │
//! │         └──────────► CashDrawerLedger   idempotent, retried on conflict │
//! │                                                                         │
//! │   Stores: Arc<dyn Port> per entity, every call under a timeout          │
//! └───────────────────┬─────────────────────────────────┬───────────────────┘
//!                     │                                 │
//!          ┌──────────▼──────────┐           ┌──────────▼──────────┐
//!          │ meridian-db (SQLite)│           │ InMemoryStore        │
//!          └─────────────────────┘           └─────────────────────┘
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use meridian_ordering::{InMemoryStore, OrderingService, OrderingSettings};
//!
//! let store = InMemoryStore::new();
//! let service = OrderingService::new(store.stores(), &OrderingSettings::default());
//! ```

pub mod cash_drawer;
pub mod catalog;
pub mod config;
pub mod error;
pub mod in_memory;
pub mod inventory;
pub mod service;
pub mod stores;
pub mod telemetry;

pub use cash_drawer::CashDrawerLedger;
pub use catalog::CatalogLoader;
pub use config::{ConfigError, DatabaseSettings, OrderingConfig, OrderingSettings};
pub use error::{ErrorKind, OrderingError, OrderingResult};
pub use in_memory::InMemoryStore;
pub use inventory::InventoryLedger;
pub use service::{NewPayment, OrderingService};
pub use stores::Stores;
