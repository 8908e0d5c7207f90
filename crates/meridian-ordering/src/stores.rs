//! Repository handles the service and ledgers share, and the timeout guard
//! every storage call goes through.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use meridian_core::ports::{
    CashDrawerRepository, CatalogRepository, InventoryRepository, OrderRepository,
    PaymentRepository, RepositoryResult,
};
use meridian_db::Database;

use crate::error::{OrderingError, OrderingResult};

/// One handle per port. Cloning shares the underlying stores.
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn CatalogRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub inventory: Arc<dyn InventoryRepository>,
    pub cash_drawers: Arc<dyn CashDrawerRepository>,
}

impl Stores {
    /// SQLite-backed stores sharing one pool.
    pub fn sqlite(db: &Database) -> Self {
        Stores {
            catalog: Arc::new(db.catalog()),
            orders: Arc::new(db.orders()),
            payments: Arc::new(db.payments()),
            inventory: Arc::new(db.inventory()),
            cash_drawers: Arc::new(db.cash_drawers()),
        }
    }
}

/// Runs one storage call under `timeout`, tagging failures with `operation`.
pub(crate) async fn bounded<T, F>(operation: &'static str, timeout: Duration, call: F) -> OrderingResult<T>
where
    F: Future<Output = RepositoryResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(OrderingError::storage(operation, err)),
        Err(_) => Err(OrderingError::Timeout { operation, timeout }),
    }
}
