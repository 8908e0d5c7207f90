//! # meridian-db: SQLite Persistence for the Ordering Engine
//!
//! Implements the repository ports of `meridian-core` on SQLite, using sqlx
//! for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Meridian Data Flow                               │
//! │                                                                         │
//! │  OrderingService (meridian-ordering)                                    │
//! │       │  Arc<dyn *Repository>                                           │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    meridian-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Catalog       │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ Order/Payment │    │ 001_initial  │  │   │
//! │  │   │               │    │ Inventory     │    │   _schema    │  │   │
//! │  │   │               │    │ CashDrawer    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (or :memory: in tests)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types and their mapping onto port errors
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_core::ports::OrderRepository;
//! use meridian_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/meridian.db")).await?;
//! let order = db.orders().get("m-1", "ord-1").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::{
    SqliteCashDrawerRepository, SqliteCatalogRepository, SqliteInventoryRepository,
    SqliteOrderRepository, SqlitePaymentRepository,
};
