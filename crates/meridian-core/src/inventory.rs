//! # Inventory Arithmetic
//!
//! Pure half of the inventory ledger: how an adjustment moves a count, and
//! which adjustments an order produces.
//!
//! ```text
//!   adjustments (append-only)              count (materialized view)
//!   ─────────────────────────              ─────────────────────────
//!   reset_stock 10   ──► 10                quantity = replay(ledger)
//!   remove_stock 3   ──►  7                state    = sold iff quantity == 0
//!   add_stock 1      ──►  8  ────────────► 8, in_stock
//! ```
//!
//! Negative quantities are allowed; oversell is not blocked here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{AdjustmentOp, InventoryAdjustment, InventoryCount, InventoryState, Order};

/// When a sale takes stock out of inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InventoryPolicy {
    /// Stock moves when the order completes.
    #[default]
    OnPayment,
    /// Stock moves when the order is created; cancel puts it back.
    OnCreation,
}

/// Applies one operation to a quantity.
pub fn apply_op(quantity: i64, op: AdjustmentOp, amount: i64) -> i64 {
    match op {
        AdjustmentOp::AddStock => quantity.saturating_add(amount),
        AdjustmentOp::RemoveStock => quantity.saturating_sub(amount),
        AdjustmentOp::ResetStock => amount,
    }
}

pub fn state_for(quantity: i64) -> InventoryState {
    if quantity == 0 {
        InventoryState::Sold
    } else {
        InventoryState::InStock
    }
}

/// Replays a ledger from zero. Equal to the count's quantity when the
/// ledger is complete.
///
/// ```rust
/// use chrono::Utc;
/// use meridian_core::inventory::replay;
/// use meridian_core::types::{AdjustmentOp, InventoryAdjustment};
///
/// let adj = |op, quantity| InventoryAdjustment {
///     id: format!("{:?}-{}", op, quantity),
///     item_variation_id: "v-1".into(),
///     location_id: "loc-1".into(),
///     merchant_id: "m-1".into(),
///     op,
///     quantity,
///     created_at: Utc::now(),
/// };
/// let ledger = [
///     adj(AdjustmentOp::ResetStock, 10),
///     adj(AdjustmentOp::RemoveStock, 3),
///     adj(AdjustmentOp::AddStock, 1),
/// ];
/// assert_eq!(replay(&ledger), 8);
/// ```
pub fn replay(adjustments: &[InventoryAdjustment]) -> i64 {
    adjustments
        .iter()
        .fold(0, |qty, adj| apply_op(qty, adj.op, adj.quantity))
}

impl InventoryCount {
    /// A fresh count at zero. `version` 0 means "not yet stored".
    pub fn empty(
        merchant_id: &str,
        item_variation_id: &str,
        location_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        InventoryCount {
            id: count_id(item_variation_id, location_id),
            item_variation_id: item_variation_id.to_string(),
            location_id: location_id.to_string(),
            merchant_id: merchant_id.to_string(),
            quantity: 0,
            state: InventoryState::Sold,
            version: 0,
            calculated_at: now,
        }
    }

    pub fn is_stored(&self) -> bool {
        self.version > 0
    }

    /// Moves the count by one adjustment. The caller bumps `version`.
    pub fn apply(&mut self, adjustment: &InventoryAdjustment, now: DateTime<Utc>) {
        self.quantity = apply_op(self.quantity, adjustment.op, adjustment.quantity);
        self.state = state_for(self.quantity);
        self.calculated_at = now;
    }
}

/// Count ids are derived so a (variation, location) pair maps to one row.
pub fn count_id(item_variation_id: &str, location_id: &str) -> String {
    format!("{}@{}", item_variation_id, location_id)
}

/// Groups adjustments by (variation, location), keeping first-seen group
/// order and the given order inside each group.
pub fn group_adjustments(
    adjustments: &[InventoryAdjustment],
) -> Vec<((String, String), Vec<InventoryAdjustment>)> {
    let mut groups: Vec<((String, String), Vec<InventoryAdjustment>)> = Vec::new();
    for adj in adjustments {
        let key = (adj.item_variation_id.clone(), adj.location_id.clone());
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, list)) => list.push(adj.clone()),
            None => groups.push((key, vec![adj.clone()])),
        }
    }
    groups
}

// Order-driven ids carry the order version the effect was computed
// against. Two writers racing from the same version share ids; a write
// voided after a lost race never shadows a later attempt.

pub fn sale_adjustment_id(order_id: &str, item_uid: &str, version: i64) -> String {
    format!("{}:{}:sale:v{}", order_id, item_uid, version)
}

pub fn restock_adjustment_id(order_id: &str, item_uid: &str, version: i64) -> String {
    format!("{}:{}:restock:v{}", order_id, item_uid, version)
}

/// One `remove_stock` per order item, at the order's location.
pub fn sale_adjustments(order: &Order, now: DateTime<Utc>) -> Vec<InventoryAdjustment> {
    order_adjustments(order, AdjustmentOp::RemoveStock, now)
}

/// Compensation for [`sale_adjustments`].
pub fn restock_adjustments(order: &Order, now: DateTime<Utc>) -> Vec<InventoryAdjustment> {
    order_adjustments(order, AdjustmentOp::AddStock, now)
}

/// Mirrors each add/remove under a `:void` id. Resets cannot be undone
/// and are left out.
pub fn void_adjustments(
    adjustments: &[InventoryAdjustment],
    now: DateTime<Utc>,
) -> Vec<InventoryAdjustment> {
    adjustments
        .iter()
        .filter_map(|adjustment| {
            let op = match adjustment.op {
                AdjustmentOp::AddStock => AdjustmentOp::RemoveStock,
                AdjustmentOp::RemoveStock => AdjustmentOp::AddStock,
                AdjustmentOp::ResetStock => return None,
            };
            Some(InventoryAdjustment {
                id: format!("{}:void", adjustment.id),
                op,
                created_at: now,
                ..adjustment.clone()
            })
        })
        .collect()
}

fn order_adjustments(
    order: &Order,
    op: AdjustmentOp,
    now: DateTime<Utc>,
) -> Vec<InventoryAdjustment> {
    order
        .items
        .iter()
        .map(|item| InventoryAdjustment {
            id: match op {
                AdjustmentOp::AddStock => restock_adjustment_id(&order.id, &item.uid, order.version),
                _ => sale_adjustment_id(&order.id, &item.uid, order.version),
            },
            item_variation_id: item.variation_id.clone(),
            location_id: order.location_id.clone(),
            merchant_id: order.merchant_id.clone(),
            op,
            quantity: item.quantity,
            created_at: now,
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn adj(id: &str, var: &str, op: AdjustmentOp, quantity: i64) -> InventoryAdjustment {
        InventoryAdjustment {
            id: id.to_string(),
            item_variation_id: var.to_string(),
            location_id: "loc-1".to_string(),
            merchant_id: "m-1".to_string(),
            op,
            quantity,
            created_at: Utc::now(),
        }
    }

    fn run(ops: &[(AdjustmentOp, i64)]) -> InventoryCount {
        let mut count = InventoryCount::empty("m-1", "v-1", "loc-1", Utc::now());
        for (n, (op, qty)) in ops.iter().enumerate() {
            count.apply(&adj(&n.to_string(), "v-1", *op, *qty), Utc::now());
        }
        count
    }

    #[test]
    fn test_reset_remove_add() {
        let count = run(&[
            (AdjustmentOp::ResetStock, 10),
            (AdjustmentOp::RemoveStock, 3),
            (AdjustmentOp::AddStock, 1),
        ]);
        assert_eq!(count.quantity, 8);
        assert_eq!(count.state, InventoryState::InStock);
    }

    #[test]
    fn test_sold_iff_zero() {
        let count = run(&[(AdjustmentOp::ResetStock, 5), (AdjustmentOp::RemoveStock, 5)]);
        assert_eq!(count.quantity, 0);
        assert_eq!(count.state, InventoryState::Sold);
    }

    #[test]
    fn test_oversell_goes_negative() {
        let count = run(&[(AdjustmentOp::AddStock, 1), (AdjustmentOp::RemoveStock, 3)]);
        assert_eq!(count.quantity, -2);
        assert_eq!(count.state, InventoryState::InStock);
    }

    #[test]
    fn test_replay_matches_count() {
        let ledger = vec![
            adj("1", "v-1", AdjustmentOp::AddStock, 4),
            adj("2", "v-1", AdjustmentOp::ResetStock, 12),
            adj("3", "v-1", AdjustmentOp::RemoveStock, 2),
        ];
        let mut count = InventoryCount::empty("m-1", "v-1", "loc-1", Utc::now());
        for a in &ledger {
            count.apply(a, Utc::now());
        }
        assert_eq!(replay(&ledger), count.quantity);
        assert_eq!(count.quantity, 10);
    }

    #[test]
    fn test_group_adjustments_preserves_order() {
        let list = vec![
            adj("1", "v-2", AdjustmentOp::AddStock, 1),
            adj("2", "v-1", AdjustmentOp::AddStock, 1),
            adj("3", "v-2", AdjustmentOp::RemoveStock, 1),
        ];
        let groups = group_adjustments(&list);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0 .0, "v-2");
        let ids: Vec<&str> = groups[0].1.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_empty_count_is_unstored() {
        let count = InventoryCount::empty("m-1", "v-1", "loc-1", Utc::now());
        assert!(!count.is_stored());
        assert_eq!(count.id, "v-1@loc-1");
        assert_eq!(count.state, InventoryState::Sold);
    }

    #[test]
    fn test_adjustment_ids_are_deterministic() {
        assert_eq!(sale_adjustment_id("ord-1", "a", 1), "ord-1:a:sale:v1");
        assert_eq!(restock_adjustment_id("ord-1", "a", 3), "ord-1:a:restock:v3");
    }

    #[test]
    fn test_void_adjustments_cancel_out() {
        let ledger = vec![
            adj("seed", "v-1", AdjustmentOp::ResetStock, 10),
            adj("sale", "v-1", AdjustmentOp::RemoveStock, 3),
            adj("back", "v-1", AdjustmentOp::AddStock, 1),
        ];
        let voids = void_adjustments(&ledger, Utc::now());

        let ids: Vec<&str> = voids.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["sale:void", "back:void"]);
        assert_eq!(voids[0].op, AdjustmentOp::AddStock);
        assert_eq!(voids[0].quantity, 3);

        let mut all = ledger.clone();
        all.extend(voids);
        assert_eq!(replay(&all), 10);
    }
}
