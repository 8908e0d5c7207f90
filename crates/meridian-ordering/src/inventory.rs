//! # Inventory Ledger
//!
//! Applies adjustment batches to inventory counts.
//!
//! ## apply_adjustments
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. validate ids, quantities, merchant; every variation must exist     │
//! │  2. drop adjustments whose id is already in the ledger                 │
//! │  3. group by (variation, location)                                     │
//! │  4. load each count (or start one at 0, sold), replay the group        │
//! │  5. commit counts + adjustments atomically                             │
//! │       └── Conflict? another writer moved a count: back to step 2       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Step 2 makes a batch idempotent: the order service replays the same
//! deterministic ids after a failure without double-counting.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use meridian_core::inventory::group_adjustments;
use meridian_core::ports::{CatalogRepository, InventoryRepository};
use meridian_core::validation::{validate_adjustment_quantity, validate_id};
use meridian_core::{CoreError, InventoryAdjustment, InventoryCount, ValidationError};

use crate::error::{invalid, OrderingError, OrderingResult};
use crate::stores::bounded;

const APPLY: &str = "apply_inventory_adjustments";

#[derive(Clone)]
pub struct InventoryLedger {
    catalog: Arc<dyn CatalogRepository>,
    repo: Arc<dyn InventoryRepository>,
    timeout: Duration,
    max_retries: u32,
}

impl InventoryLedger {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        repo: Arc<dyn InventoryRepository>,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        InventoryLedger {
            catalog,
            repo,
            timeout,
            max_retries,
        }
    }

    /// Applies `adjustments` in the given order and returns the resulting
    /// count of every (variation, location) pair they touch.
    pub async fn apply_adjustments(
        &self,
        merchant_id: &str,
        adjustments: &[InventoryAdjustment],
    ) -> OrderingResult<Vec<InventoryCount>> {
        if adjustments.is_empty() {
            return Ok(Vec::new());
        }
        self.validate(merchant_id, adjustments).await?;

        let mut attempt = 0;
        loop {
            match self.try_apply(merchant_id, adjustments).await {
                Err(err) if err.is_conflict() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        merchant_id = %merchant_id,
                        attempt,
                        error = %err,
                        "Inventory commit lost a race, retrying"
                    );
                }
                result => return result,
            }
        }
    }

    async fn try_apply(
        &self,
        merchant_id: &str,
        adjustments: &[InventoryAdjustment],
    ) -> OrderingResult<Vec<InventoryCount>> {
        let ids: Vec<String> = adjustments.iter().map(|a| a.id.clone()).collect();
        let recorded = bounded(
            APPLY,
            self.timeout,
            self.repo.recorded_adjustment_ids(merchant_id, &ids),
        )
        .await?;

        let pending: Vec<InventoryAdjustment> = adjustments
            .iter()
            .filter(|a| !recorded.contains(&a.id))
            .cloned()
            .collect();
        if pending.len() < adjustments.len() {
            debug!(
                merchant_id = %merchant_id,
                skipped = adjustments.len() - pending.len(),
                "Skipping adjustments already in the ledger"
            );
        }

        let now = Utc::now();
        let mut counts = Vec::new();
        for ((variation_id, location_id), group) in group_adjustments(adjustments) {
            let mut count = self.load_or_start(merchant_id, &variation_id, &location_id).await?;
            let fresh: Vec<&InventoryAdjustment> =
                group.iter().filter(|a| !recorded.contains(&a.id)).collect();
            if !fresh.is_empty() {
                for adjustment in fresh {
                    count.apply(adjustment, now);
                }
                count.version += 1;
            }
            counts.push(count);
        }

        if pending.is_empty() {
            return Ok(counts);
        }

        let touches = |c: &InventoryCount| {
            pending
                .iter()
                .any(|a| a.item_variation_id == c.item_variation_id && a.location_id == c.location_id)
        };
        let changed: Vec<InventoryCount> = counts.iter().filter(|&c| touches(c)).cloned().collect();
        bounded(APPLY, self.timeout, self.repo.commit(&changed, &pending)).await?;

        info!(
            merchant_id = %merchant_id,
            adjustments = pending.len(),
            counts = changed.len(),
            "Inventory adjusted"
        );
        Ok(counts)
    }

    async fn load_or_start(
        &self,
        merchant_id: &str,
        variation_id: &str,
        location_id: &str,
    ) -> OrderingResult<InventoryCount> {
        let stored = bounded(
            APPLY,
            self.timeout,
            self.repo.get_count(merchant_id, variation_id, location_id),
        )
        .await?;
        Ok(stored.unwrap_or_else(|| InventoryCount::empty(merchant_id, variation_id, location_id, Utc::now())))
    }

    async fn validate(&self, merchant_id: &str, adjustments: &[InventoryAdjustment]) -> OrderingResult<()> {
        let mut seen: Vec<&str> = Vec::with_capacity(adjustments.len());
        let mut variations: Vec<&str> = Vec::new();

        for adjustment in adjustments {
            validate_id("id", &adjustment.id).map_err(|e| OrderingError::validation(APPLY, e))?;
            validate_adjustment_quantity(adjustment.quantity)
                .map_err(|e| OrderingError::validation(APPLY, e))?;

            if adjustment.merchant_id != merchant_id {
                return Err(invalid(
                    APPLY,
                    "merchant_id",
                    format!("adjustment {} belongs to merchant {}", adjustment.id, adjustment.merchant_id),
                ));
            }
            if seen.contains(&adjustment.id.as_str()) {
                return Err(OrderingError::validation(
                    APPLY,
                    ValidationError::Duplicate {
                        field: "id".to_string(),
                        value: adjustment.id.clone(),
                    },
                ));
            }
            seen.push(&adjustment.id);

            if !variations.contains(&adjustment.item_variation_id.as_str()) {
                variations.push(&adjustment.item_variation_id);
            }
        }

        for variation_id in variations {
            let known = bounded(
                APPLY,
                self.timeout,
                self.catalog.get_item_variation(merchant_id, variation_id),
            )
            .await?;
            if known.is_none() {
                return Err(OrderingError::validation(
                    APPLY,
                    CoreError::UnknownVariation(variation_id.to_string()),
                ));
            }
        }
        Ok(())
    }

    /// Current count of one (variation, location) pair.
    pub async fn count(
        &self,
        merchant_id: &str,
        variation_id: &str,
        location_id: &str,
    ) -> OrderingResult<InventoryCount> {
        const OP: &str = "get_inventory_count";
        bounded(OP, self.timeout, self.repo.get_count(merchant_id, variation_id, location_id))
            .await?
            .ok_or_else(|| {
                OrderingError::not_found(
                    OP,
                    "InventoryCount",
                    meridian_core::inventory::count_id(variation_id, location_id),
                )
            })
    }

    /// Ledger of one (variation, location) pair, oldest first.
    pub async fn history(
        &self,
        merchant_id: &str,
        variation_id: &str,
        location_id: &str,
    ) -> OrderingResult<Vec<InventoryAdjustment>> {
        bounded(
            "get_inventory_history",
            self.timeout,
            self.repo.list_adjustments(merchant_id, variation_id, location_id),
        )
        .await
    }
}
