//! # Persistence Ports
//!
//! One capability trait per entity. The ordering service depends only on
//! these; `meridian-db` implements them on SQLite and `meridian-ordering`
//! ships an in-memory implementation for tests and previews.
//!
//! ## Contract shared by every trait
//! - Every read is scoped by `merchant_id`. A missing id and an id owned by
//!   another merchant are indistinguishable: both return `Ok(None)`.
//! - Writes guarded by a `version` fail with [`RepositoryError::Conflict`]
//!   when the stored row moved on. Conflicts are retryable.
//! - Multi-row writes (`put_batch`, `commit`) are all-or-nothing.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{
    CashDrawer, CashDrawerAdjustment, Discount, InventoryAdjustment, InventoryCount,
    ItemVariation, Location, Order, OrderState, Payment, Tax,
};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A version precondition failed or a unique id was already taken.
    #[error("{entity} {id} was modified concurrently")]
    Conflict { entity: &'static str, id: String },

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepositoryError {
    pub fn conflict(entity: &'static str, id: impl Into<String>) -> Self {
        RepositoryError::Conflict {
            entity,
            id: id.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RepositoryError::Conflict { .. })
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

// =============================================================================
// Query / batch inputs
// =============================================================================

/// Filter for [`OrderRepository::list`]. Results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub location_id: Option<String>,
    pub state: Option<OrderState>,
    pub customer_id: Option<String>,
    pub limit: Option<u32>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.location_id
            .as_ref()
            .map_or(true, |l| *l == order.location_id)
            && self.state.map_or(true, |s| s == order.state)
            && self
                .customer_id
                .as_ref()
                .map_or(true, |c| order.customer_id.as_ref() == Some(c))
    }
}

/// Catalog entities written together by [`CatalogRepository::put_batch`].
#[derive(Debug, Clone, Default)]
pub struct CatalogBatch {
    pub locations: Vec<Location>,
    pub variations: Vec<ItemVariation>,
    pub taxes: Vec<Tax>,
    pub discounts: Vec<Discount>,
}

impl CatalogBatch {
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
            && self.variations.is_empty()
            && self.taxes.is_empty()
            && self.discounts.is_empty()
    }
}

// =============================================================================
// Repositories
// =============================================================================

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get_item_variation(
        &self,
        merchant_id: &str,
        id: &str,
    ) -> RepositoryResult<Option<ItemVariation>>;

    /// Returns the taxes among `ids` that exist for the merchant. Missing ids
    /// are omitted.
    async fn list_taxes(&self, merchant_id: &str, ids: &[String]) -> RepositoryResult<Vec<Tax>>;

    async fn list_discounts(
        &self,
        merchant_id: &str,
        ids: &[String],
    ) -> RepositoryResult<Vec<Discount>>;

    async fn get_location(&self, merchant_id: &str, id: &str)
        -> RepositoryResult<Option<Location>>;

    /// Upserts every entity of the batch in one unit. Each variation gets a
    /// zero inventory count at every batch location it is sold at, unless a
    /// count already exists. Rows are stored under `merchant_id`; callers
    /// check entity ownership beforehand.
    async fn put_batch(&self, merchant_id: &str, batch: &CatalogBatch) -> RepositoryResult<()>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Stores a new order. An existing id is a conflict.
    async fn insert(&self, order: &Order) -> RepositoryResult<()>;

    async fn get(&self, merchant_id: &str, id: &str) -> RepositoryResult<Option<Order>>;

    /// Replaces the stored order if its version is still `expected_version`.
    async fn update(&self, order: &Order, expected_version: i64) -> RepositoryResult<()>;

    async fn list(&self, merchant_id: &str, filter: &OrderFilter) -> RepositoryResult<Vec<Order>>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Stores a new payment. An existing id is a conflict.
    async fn insert(&self, payment: &Payment) -> RepositoryResult<()>;

    async fn get(&self, merchant_id: &str, id: &str) -> RepositoryResult<Option<Payment>>;
}

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn get_count(
        &self,
        merchant_id: &str,
        item_variation_id: &str,
        location_id: &str,
    ) -> RepositoryResult<Option<InventoryCount>>;

    /// Returns the subset of `ids` already present in the ledger.
    async fn recorded_adjustment_ids(
        &self,
        merchant_id: &str,
        ids: &[String],
    ) -> RepositoryResult<Vec<String>>;

    /// Ledger entries for one (variation, location) pair, in write order.
    async fn list_adjustments(
        &self,
        merchant_id: &str,
        item_variation_id: &str,
        location_id: &str,
    ) -> RepositoryResult<Vec<InventoryAdjustment>>;

    /// Writes counts and appends adjustments atomically.
    ///
    /// Each count carries its new `version`; the stored row must be at
    /// `version - 1`, or absent when that is 0. Any mismatch, or an
    /// adjustment id already in the ledger, fails the whole commit with
    /// a conflict.
    async fn commit(
        &self,
        counts: &[InventoryCount],
        adjustments: &[InventoryAdjustment],
    ) -> RepositoryResult<()>;
}

#[async_trait]
pub trait CashDrawerRepository: Send + Sync {
    async fn get_drawer(&self, merchant_id: &str, id: &str)
        -> RepositoryResult<Option<CashDrawer>>;

    async fn get_drawer_for_location(
        &self,
        merchant_id: &str,
        location_id: &str,
    ) -> RepositoryResult<Option<CashDrawer>>;

    async fn adjustment_exists(&self, merchant_id: &str, id: &str) -> RepositoryResult<bool>;

    async fn list_adjustments(
        &self,
        merchant_id: &str,
        cash_drawer_id: &str,
    ) -> RepositoryResult<Vec<CashDrawerAdjustment>>;

    /// Writes the drawer and appends the adjustment atomically, with the
    /// same version rule as [`InventoryRepository::commit`].
    async fn commit(
        &self,
        drawer: &CashDrawer,
        adjustment: &CashDrawerAdjustment,
    ) -> RepositoryResult<()>;
}
