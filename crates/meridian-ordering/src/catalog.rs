//! # Catalog Snapshot Loader
//!
//! Resolves the catalog entities a schema references into an owned
//! [`CatalogSnapshot`] for the calculator.
//!
//! ```text
//!   OrderSchema ──► location exists? ──► variations (one get per distinct id)
//!                                   ├──► taxes     (one list call)
//!                                   └──► discounts (one list call)
//!                                              │
//!                                              ▼
//!                                       CatalogSnapshot
//! ```
//!
//! Missing entities are left out of the snapshot; the calculator reports
//! them as unknown references.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use meridian_core::ports::{CatalogBatch, CatalogRepository};
use meridian_core::{CatalogSnapshot, Location, OrderSchema};

use crate::error::{invalid, OrderingResult};
use crate::stores::bounded;

#[derive(Clone)]
pub struct CatalogLoader {
    repo: Arc<dyn CatalogRepository>,
    timeout: Duration,
}

impl CatalogLoader {
    pub fn new(repo: Arc<dyn CatalogRepository>, timeout: Duration) -> Self {
        CatalogLoader { repo, timeout }
    }

    /// Loads the snapshot for `schema` under `merchant_id`.
    pub async fn load(
        &self,
        operation: &'static str,
        merchant_id: &str,
        schema: &OrderSchema,
    ) -> OrderingResult<CatalogSnapshot> {
        self.location(operation, merchant_id, &schema.location_id)
            .await?
            .ok_or_else(|| {
                invalid(
                    operation,
                    "location_id",
                    format!("unknown location {}", schema.location_id),
                )
            })?;

        let mut snapshot = CatalogSnapshot::new();

        let mut variation_ids: Vec<&str> = Vec::new();
        for item in &schema.line_items {
            if !variation_ids.contains(&item.variation_id.as_str()) {
                variation_ids.push(&item.variation_id);
            }
        }
        for id in variation_ids {
            let found = bounded(operation, self.timeout, self.repo.get_item_variation(merchant_id, id)).await?;
            if let Some(variation) = found {
                snapshot = snapshot.with_variation(variation);
            }
        }

        let tax_ids = distinct(schema.taxes.iter().map(|t| t.tax_id.as_str()));
        if !tax_ids.is_empty() {
            for tax in bounded(operation, self.timeout, self.repo.list_taxes(merchant_id, &tax_ids)).await? {
                snapshot = snapshot.with_tax(tax);
            }
        }

        let discount_ids = distinct(schema.discounts.iter().map(|d| d.discount_id.as_str()));
        if !discount_ids.is_empty() {
            for discount in
                bounded(operation, self.timeout, self.repo.list_discounts(merchant_id, &discount_ids)).await?
            {
                snapshot = snapshot.with_discount(discount);
            }
        }

        debug!(
            merchant_id = %merchant_id,
            variations = snapshot.variations.len(),
            taxes = snapshot.taxes.len(),
            discounts = snapshot.discounts.len(),
            "Catalog snapshot loaded"
        );
        Ok(snapshot)
    }

    pub async fn location(
        &self,
        operation: &'static str,
        merchant_id: &str,
        location_id: &str,
    ) -> OrderingResult<Option<Location>> {
        bounded(operation, self.timeout, self.repo.get_location(merchant_id, location_id)).await
    }

    /// Writes a catalog batch after checking every entity belongs to
    /// `merchant_id`.
    pub async fn put_batch(&self, merchant_id: &str, batch: &CatalogBatch) -> OrderingResult<()> {
        const OP: &str = "put_catalog";

        let owners = batch
            .locations
            .iter()
            .map(|l| (&l.merchant_id, &l.id))
            .chain(batch.variations.iter().map(|v| (&v.merchant_id, &v.id)))
            .chain(batch.taxes.iter().map(|t| (&t.merchant_id, &t.id)))
            .chain(batch.discounts.iter().map(|d| (&d.merchant_id, &d.id)));
        for (owner, id) in owners {
            if owner != merchant_id {
                return Err(invalid(OP, "merchant_id", format!("{} belongs to merchant {}", id, owner)));
            }
        }

        bounded(OP, self.timeout, self.repo.put_batch(merchant_id, batch)).await
    }
}

fn distinct<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for id in ids {
        if !out.iter().any(|seen| seen == id) {
            out.push(id.to_string());
        }
    }
    out
}
