//! In-memory implementation of every repository port.
//!
//! Used by tests and previews. All state sits behind one lock, so each
//! `commit` and `put_batch` is trivially atomic. Version and conflict rules
//! match the SQLite repositories.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use meridian_core::inventory::count_id;
use meridian_core::ports::{
    CashDrawerRepository, CatalogBatch, CatalogRepository, InventoryRepository, OrderFilter,
    OrderRepository, PaymentRepository, RepositoryError, RepositoryResult,
};
use meridian_core::{
    available_at, CashDrawer, CashDrawerAdjustment, Discount, InventoryAdjustment,
    InventoryCount, InventoryState, ItemVariation, Location, Order, Payment, Tax,
};

use crate::stores::Stores;

/// (merchant_id, id)
type Key = (String, String);

fn key(merchant_id: &str, id: &str) -> Key {
    (merchant_id.to_string(), id.to_string())
}

#[derive(Default)]
struct MemoryState {
    locations: HashMap<Key, Location>,
    variations: HashMap<Key, ItemVariation>,
    taxes: HashMap<Key, Tax>,
    discounts: HashMap<Key, Discount>,
    orders: HashMap<Key, Order>,
    payments: HashMap<Key, Payment>,
    /// Keyed by count id.
    counts: HashMap<Key, InventoryCount>,
    inventory_ledger: Vec<InventoryAdjustment>,
    drawers: HashMap<Key, CashDrawer>,
    /// Cash adjustments carry no merchant; it is kept alongside.
    drawer_ledger: Vec<(String, CashDrawerAdjustment)>,
}

/// Shared in-memory store. Clones see the same data.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every port backed by this store.
    pub fn stores(&self) -> Stores {
        Stores {
            catalog: Arc::new(self.clone()),
            orders: Arc::new(self.clone()),
            payments: Arc::new(self.clone()),
            inventory: Arc::new(self.clone()),
            cash_drawers: Arc::new(self.clone()),
        }
    }
}

/// Checks the version rule shared by count and drawer commits: a new
/// version of 1 must not replace anything, any other must follow the
/// stored one.
fn check_version(
    entity: &'static str,
    id: &str,
    stored: Option<i64>,
    next: i64,
) -> RepositoryResult<()> {
    let ok = match stored {
        None => next <= 1,
        Some(current) => next > 1 && current == next - 1,
    };
    if ok {
        Ok(())
    } else {
        Err(RepositoryError::conflict(entity, id))
    }
}

#[async_trait]
impl CatalogRepository for InMemoryStore {
    async fn get_item_variation(
        &self,
        merchant_id: &str,
        id: &str,
    ) -> RepositoryResult<Option<ItemVariation>> {
        let state = self.state.read().await;
        Ok(state.variations.get(&key(merchant_id, id)).cloned())
    }

    async fn list_taxes(&self, merchant_id: &str, ids: &[String]) -> RepositoryResult<Vec<Tax>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.taxes.get(&key(merchant_id, id)).cloned())
            .collect())
    }

    async fn list_discounts(
        &self,
        merchant_id: &str,
        ids: &[String],
    ) -> RepositoryResult<Vec<Discount>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.discounts.get(&key(merchant_id, id)).cloned())
            .collect())
    }

    async fn get_location(
        &self,
        merchant_id: &str,
        id: &str,
    ) -> RepositoryResult<Option<Location>> {
        let state = self.state.read().await;
        Ok(state.locations.get(&key(merchant_id, id)).cloned())
    }

    async fn put_batch(&self, merchant_id: &str, batch: &CatalogBatch) -> RepositoryResult<()> {
        let mut state = self.state.write().await;

        for location in &batch.locations {
            let mut location = location.clone();
            location.merchant_id = merchant_id.to_string();
            state.locations.insert(key(merchant_id, &location.id), location);
        }
        for variation in &batch.variations {
            let mut variation = variation.clone();
            variation.merchant_id = merchant_id.to_string();
            state.variations.insert(key(merchant_id, &variation.id), variation);
        }
        for tax in &batch.taxes {
            let mut tax = tax.clone();
            tax.merchant_id = merchant_id.to_string();
            state.taxes.insert(key(merchant_id, &tax.id), tax);
        }
        for discount in &batch.discounts {
            let mut discount = discount.clone();
            discount.merchant_id = merchant_id.to_string();
            state.discounts.insert(key(merchant_id, &discount.id), discount);
        }

        let now = Utc::now();
        for variation in &batch.variations {
            for location in &batch.locations {
                if !available_at(&variation.location_ids, &location.id) {
                    continue;
                }
                let id = count_id(&variation.id, &location.id);
                state
                    .counts
                    .entry(key(merchant_id, &id))
                    .or_insert_with(|| InventoryCount {
                        id: id.clone(),
                        item_variation_id: variation.id.clone(),
                        location_id: location.id.clone(),
                        merchant_id: merchant_id.to_string(),
                        quantity: 0,
                        state: InventoryState::Sold,
                        version: 1,
                        calculated_at: now,
                    });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert(&self, order: &Order) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        let k = key(&order.merchant_id, &order.id);
        if state.orders.contains_key(&k) {
            return Err(RepositoryError::conflict("Order", order.id.as_str()));
        }
        state.orders.insert(k, order.clone());
        Ok(())
    }

    async fn get(&self, merchant_id: &str, id: &str) -> RepositoryResult<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&key(merchant_id, id)).cloned())
    }

    async fn update(&self, order: &Order, expected_version: i64) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        match state.orders.get_mut(&key(&order.merchant_id, &order.id)) {
            Some(stored) if stored.version == expected_version => {
                *stored = order.clone();
                Ok(())
            }
            _ => Err(RepositoryError::conflict("Order", order.id.as_str())),
        }
    }

    async fn list(&self, merchant_id: &str, filter: &OrderFilter) -> RepositoryResult<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.merchant_id == merchant_id && filter.matches(o))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            orders.truncate(limit as usize);
        }
        Ok(orders)
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert(&self, payment: &Payment) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        let k = key(&payment.merchant_id, &payment.id);
        if state.payments.contains_key(&k) {
            return Err(RepositoryError::conflict("Payment", payment.id.as_str()));
        }
        state.payments.insert(k, payment.clone());
        Ok(())
    }

    async fn get(&self, merchant_id: &str, id: &str) -> RepositoryResult<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state.payments.get(&key(merchant_id, id)).cloned())
    }
}

#[async_trait]
impl InventoryRepository for InMemoryStore {
    async fn get_count(
        &self,
        merchant_id: &str,
        item_variation_id: &str,
        location_id: &str,
    ) -> RepositoryResult<Option<InventoryCount>> {
        let state = self.state.read().await;
        let id = count_id(item_variation_id, location_id);
        Ok(state.counts.get(&key(merchant_id, &id)).cloned())
    }

    async fn recorded_adjustment_ids(
        &self,
        merchant_id: &str,
        ids: &[String],
    ) -> RepositoryResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .inventory_ledger
            .iter()
            .filter(|a| a.merchant_id == merchant_id && ids.contains(&a.id))
            .map(|a| a.id.clone())
            .collect())
    }

    async fn list_adjustments(
        &self,
        merchant_id: &str,
        item_variation_id: &str,
        location_id: &str,
    ) -> RepositoryResult<Vec<InventoryAdjustment>> {
        let state = self.state.read().await;
        Ok(state
            .inventory_ledger
            .iter()
            .filter(|a| {
                a.merchant_id == merchant_id
                    && a.item_variation_id == item_variation_id
                    && a.location_id == location_id
            })
            .cloned()
            .collect())
    }

    async fn commit(
        &self,
        counts: &[InventoryCount],
        adjustments: &[InventoryAdjustment],
    ) -> RepositoryResult<()> {
        let mut state = self.state.write().await;

        // Check everything before touching anything.
        for count in counts {
            let stored = state
                .counts
                .get(&key(&count.merchant_id, &count.id))
                .map(|c| c.version);
            check_version("InventoryCount", &count.id, stored, count.version)?;
        }
        for (i, adjustment) in adjustments.iter().enumerate() {
            let taken = state
                .inventory_ledger
                .iter()
                .chain(&adjustments[..i])
                .any(|a| a.merchant_id == adjustment.merchant_id && a.id == adjustment.id);
            if taken {
                return Err(RepositoryError::conflict("InventoryAdjustment", adjustment.id.as_str()));
            }
        }

        for count in counts {
            state
                .counts
                .insert(key(&count.merchant_id, &count.id), count.clone());
        }
        state.inventory_ledger.extend(adjustments.iter().cloned());
        Ok(())
    }
}

#[async_trait]
impl CashDrawerRepository for InMemoryStore {
    async fn get_drawer(&self, merchant_id: &str, id: &str) -> RepositoryResult<Option<CashDrawer>> {
        let state = self.state.read().await;
        Ok(state.drawers.get(&key(merchant_id, id)).cloned())
    }

    async fn get_drawer_for_location(
        &self,
        merchant_id: &str,
        location_id: &str,
    ) -> RepositoryResult<Option<CashDrawer>> {
        let state = self.state.read().await;
        Ok(state
            .drawers
            .values()
            .find(|d| d.merchant_id == merchant_id && d.location_id == location_id)
            .cloned())
    }

    async fn adjustment_exists(&self, merchant_id: &str, id: &str) -> RepositoryResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .drawer_ledger
            .iter()
            .any(|(merchant, a)| merchant == merchant_id && a.id == id))
    }

    async fn list_adjustments(
        &self,
        merchant_id: &str,
        cash_drawer_id: &str,
    ) -> RepositoryResult<Vec<CashDrawerAdjustment>> {
        let state = self.state.read().await;
        Ok(state
            .drawer_ledger
            .iter()
            .filter(|(merchant, a)| merchant == merchant_id && a.cash_drawer_id == cash_drawer_id)
            .map(|(_, a)| a.clone())
            .collect())
    }

    async fn commit(
        &self,
        drawer: &CashDrawer,
        adjustment: &CashDrawerAdjustment,
    ) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        let k = key(&drawer.merchant_id, &drawer.id);

        let stored = state.drawers.get(&k).map(|d| d.version);
        check_version("CashDrawer", &drawer.id, stored, drawer.version)?;
        let taken = state
            .drawer_ledger
            .iter()
            .any(|(merchant, a)| *merchant == drawer.merchant_id && a.id == adjustment.id);
        if taken {
            return Err(RepositoryError::conflict("CashDrawerAdjustment", adjustment.id.as_str()));
        }

        state.drawers.insert(k, drawer.clone());
        state
            .drawer_ledger
            .push((drawer.merchant_id.clone(), adjustment.clone()));
        Ok(())
    }
}
