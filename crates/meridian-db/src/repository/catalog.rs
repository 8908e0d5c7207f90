//! # Catalog Repository
//!
//! Read side of the catalog used to build calculator snapshots, plus the
//! atomic batch upsert used by seeding.
//!
//! ## put_batch
//! ```text
//! BEGIN
//!   upsert locations ─► upsert variations ─► upsert taxes ─► upsert discounts
//!   seed inventory_counts (0, sold) for every variation × batch location
//!   it is sold at, keeping counts that already exist
//! COMMIT            (any failure rolls the whole batch back)
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use meridian_core::inventory::count_id;
use meridian_core::ports::{CatalogBatch, CatalogRepository, RepositoryResult};
use meridian_core::{
    available_at, CatalogStatus, Currency, Discount, DiscountKind, DiscountType, InventoryState,
    ItemVariation, Location, Money, Percentage, Tax, TaxScope,
};

use super::{from_json, sort_by_requested, to_json};
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct SqliteCatalogRepository {
    pool: SqlitePool,
}

impl SqliteCatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteCatalogRepository { pool }
    }

    async fn fetch_variation(&self, merchant_id: &str, id: &str) -> DbResult<Option<ItemVariation>> {
        let record = sqlx::query_as::<_, VariationRecord>(
            r#"
            SELECT id, merchant_id, item_id, name, price_amount, currency, location_ids, status
            FROM item_variations
            WHERE merchant_id = ?1 AND id = ?2
            "#,
        )
        .bind(merchant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(ItemVariation::try_from).transpose()
    }

    async fn fetch_taxes(&self, merchant_id: &str, ids: &[String]) -> DbResult<Vec<Tax>> {
        let records = sqlx::query_as::<_, TaxRecord>(
            r#"
            SELECT id, merchant_id, name, percentage_bps, scope, location_ids, status
            FROM taxes
            WHERE merchant_id = ?1 AND id IN (SELECT value FROM json_each(?2))
            "#,
        )
        .bind(merchant_id)
        .bind(to_json(ids)?)
        .fetch_all(&self.pool)
        .await?;

        let taxes = records
            .into_iter()
            .map(Tax::try_from)
            .collect::<DbResult<Vec<_>>>()?;
        Ok(sort_by_requested(taxes, ids, |t| t.id.as_str()))
    }

    async fn fetch_discounts(&self, merchant_id: &str, ids: &[String]) -> DbResult<Vec<Discount>> {
        let records = sqlx::query_as::<_, DiscountRecord>(
            r#"
            SELECT id, merchant_id, name, discount_type, percentage_bps, fixed_amount,
                   currency, location_ids, status
            FROM discounts
            WHERE merchant_id = ?1 AND id IN (SELECT value FROM json_each(?2))
            "#,
        )
        .bind(merchant_id)
        .bind(to_json(ids)?)
        .fetch_all(&self.pool)
        .await?;

        let discounts = records
            .into_iter()
            .map(Discount::try_from)
            .collect::<DbResult<Vec<_>>>()?;
        Ok(sort_by_requested(discounts, ids, |d| d.id.as_str()))
    }

    async fn fetch_location(&self, merchant_id: &str, id: &str) -> DbResult<Option<Location>> {
        let location = sqlx::query_as::<_, LocationRecord>(
            r#"
            SELECT id, merchant_id, name, currency, status
            FROM locations
            WHERE merchant_id = ?1 AND id = ?2
            "#,
        )
        .bind(merchant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(location.map(Location::from))
    }

    async fn write_batch(&self, merchant_id: &str, batch: &CatalogBatch) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        for location in &batch.locations {
            upsert_location(&mut tx, merchant_id, location).await?;
        }
        for variation in &batch.variations {
            upsert_variation(&mut tx, merchant_id, variation).await?;
        }
        for tax in &batch.taxes {
            upsert_tax(&mut tx, merchant_id, tax).await?;
        }
        for discount in &batch.discounts {
            upsert_discount(&mut tx, merchant_id, discount).await?;
        }

        let now = Utc::now();
        let mut seeded = 0u64;
        for variation in &batch.variations {
            for location in &batch.locations {
                if !available_at(&variation.location_ids, &location.id) {
                    continue;
                }
                let result = sqlx::query(
                    r#"
                    INSERT INTO inventory_counts (
                        merchant_id, item_variation_id, location_id, id,
                        quantity, state, version, calculated_at
                    ) VALUES (?1, ?2, ?3, ?4, 0, ?5, 1, ?6)
                    ON CONFLICT (merchant_id, item_variation_id, location_id) DO NOTHING
                    "#,
                )
                .bind(merchant_id)
                .bind(&variation.id)
                .bind(&location.id)
                .bind(count_id(&variation.id, &location.id))
                .bind(InventoryState::Sold)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                seeded += result.rows_affected();
            }
        }

        tx.commit().await?;

        info!(
            merchant_id = %merchant_id,
            locations = batch.locations.len(),
            variations = batch.variations.len(),
            taxes = batch.taxes.len(),
            discounts = batch.discounts.len(),
            counts_seeded = seeded,
            "Catalog batch written"
        );
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn get_item_variation(
        &self,
        merchant_id: &str,
        id: &str,
    ) -> RepositoryResult<Option<ItemVariation>> {
        Ok(self.fetch_variation(merchant_id, id).await?)
    }

    async fn list_taxes(&self, merchant_id: &str, ids: &[String]) -> RepositoryResult<Vec<Tax>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.fetch_taxes(merchant_id, ids).await?)
    }

    async fn list_discounts(
        &self,
        merchant_id: &str,
        ids: &[String],
    ) -> RepositoryResult<Vec<Discount>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.fetch_discounts(merchant_id, ids).await?)
    }

    async fn get_location(
        &self,
        merchant_id: &str,
        id: &str,
    ) -> RepositoryResult<Option<Location>> {
        Ok(self.fetch_location(merchant_id, id).await?)
    }

    async fn put_batch(&self, merchant_id: &str, batch: &CatalogBatch) -> RepositoryResult<()> {
        debug!(merchant_id = %merchant_id, "Writing catalog batch");
        Ok(self.write_batch(merchant_id, batch).await?)
    }
}

// =============================================================================
// Upserts
// =============================================================================

async fn upsert_location(
    tx: &mut Transaction<'_, Sqlite>,
    merchant_id: &str,
    location: &Location,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO locations (merchant_id, id, name, currency, status)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT (merchant_id, id) DO UPDATE SET
            name = excluded.name,
            currency = excluded.currency,
            status = excluded.status
        "#,
    )
    .bind(merchant_id)
    .bind(&location.id)
    .bind(&location.name)
    .bind(location.currency)
    .bind(location.status)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn upsert_variation(
    tx: &mut Transaction<'_, Sqlite>,
    merchant_id: &str,
    variation: &ItemVariation,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO item_variations (
            merchant_id, id, item_id, name, price_amount, currency, location_ids, status
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT (merchant_id, id) DO UPDATE SET
            item_id = excluded.item_id,
            name = excluded.name,
            price_amount = excluded.price_amount,
            currency = excluded.currency,
            location_ids = excluded.location_ids,
            status = excluded.status
        "#,
    )
    .bind(merchant_id)
    .bind(&variation.id)
    .bind(&variation.item_id)
    .bind(&variation.name)
    .bind(variation.price.amount())
    .bind(variation.price.currency())
    .bind(to_json(&variation.location_ids)?)
    .bind(variation.status)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn upsert_tax(tx: &mut Transaction<'_, Sqlite>, merchant_id: &str, tax: &Tax) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO taxes (merchant_id, id, name, percentage_bps, scope, location_ids, status)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT (merchant_id, id) DO UPDATE SET
            name = excluded.name,
            percentage_bps = excluded.percentage_bps,
            scope = excluded.scope,
            location_ids = excluded.location_ids,
            status = excluded.status
        "#,
    )
    .bind(merchant_id)
    .bind(&tax.id)
    .bind(&tax.name)
    .bind(tax.percentage.bps() as i64)
    .bind(tax.scope)
    .bind(to_json(&tax.location_ids)?)
    .bind(tax.status)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn upsert_discount(
    tx: &mut Transaction<'_, Sqlite>,
    merchant_id: &str,
    discount: &Discount,
) -> DbResult<()> {
    let (percentage_bps, fixed_amount, currency) = match discount.kind {
        DiscountKind::Percentage { percentage } => (Some(percentage.bps() as i64), None, None),
        DiscountKind::Fixed { amount } => (None, Some(amount.amount()), Some(amount.currency())),
    };

    sqlx::query(
        r#"
        INSERT INTO discounts (
            merchant_id, id, name, discount_type, percentage_bps, fixed_amount,
            currency, location_ids, status
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT (merchant_id, id) DO UPDATE SET
            name = excluded.name,
            discount_type = excluded.discount_type,
            percentage_bps = excluded.percentage_bps,
            fixed_amount = excluded.fixed_amount,
            currency = excluded.currency,
            location_ids = excluded.location_ids,
            status = excluded.status
        "#,
    )
    .bind(merchant_id)
    .bind(&discount.id)
    .bind(&discount.name)
    .bind(discount.kind.discount_type())
    .bind(percentage_bps)
    .bind(fixed_amount)
    .bind(currency)
    .bind(to_json(&discount.location_ids)?)
    .bind(discount.status)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// =============================================================================
// Record Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct LocationRecord {
    id: String,
    merchant_id: String,
    name: String,
    currency: Currency,
    status: CatalogStatus,
}

impl From<LocationRecord> for Location {
    fn from(r: LocationRecord) -> Self {
        Location {
            id: r.id,
            merchant_id: r.merchant_id,
            name: r.name,
            currency: r.currency,
            status: r.status,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VariationRecord {
    id: String,
    merchant_id: String,
    item_id: String,
    name: String,
    price_amount: i64,
    currency: Currency,
    location_ids: String,
    status: CatalogStatus,
}

impl TryFrom<VariationRecord> for ItemVariation {
    type Error = DbError;

    fn try_from(r: VariationRecord) -> DbResult<Self> {
        Ok(ItemVariation {
            location_ids: from_json("item_variations.location_ids", &r.location_ids)?,
            id: r.id,
            item_id: r.item_id,
            merchant_id: r.merchant_id,
            name: r.name,
            price: Money::new(r.price_amount, r.currency),
            status: r.status,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TaxRecord {
    id: String,
    merchant_id: String,
    name: String,
    percentage_bps: i64,
    scope: TaxScope,
    location_ids: String,
    status: CatalogStatus,
}

impl TryFrom<TaxRecord> for Tax {
    type Error = DbError;

    fn try_from(r: TaxRecord) -> DbResult<Self> {
        let bps = u32::try_from(r.percentage_bps)
            .map_err(|e| DbError::decode("taxes.percentage_bps", e))?;
        Ok(Tax {
            location_ids: from_json("taxes.location_ids", &r.location_ids)?,
            id: r.id,
            merchant_id: r.merchant_id,
            name: r.name,
            percentage: Percentage::from_bps(bps),
            scope: r.scope,
            status: r.status,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DiscountRecord {
    id: String,
    merchant_id: String,
    name: String,
    discount_type: DiscountType,
    percentage_bps: Option<i64>,
    fixed_amount: Option<i64>,
    currency: Option<Currency>,
    location_ids: String,
    status: CatalogStatus,
}

impl TryFrom<DiscountRecord> for Discount {
    type Error = DbError;

    fn try_from(r: DiscountRecord) -> DbResult<Self> {
        let kind = match (r.discount_type, r.percentage_bps, r.fixed_amount, r.currency) {
            (DiscountType::Percentage, Some(bps), _, _) => DiscountKind::Percentage {
                percentage: Percentage::from_bps(
                    u32::try_from(bps).map_err(|e| DbError::decode("discounts.percentage_bps", e))?,
                ),
            },
            (DiscountType::Fixed, _, Some(amount), Some(currency)) => DiscountKind::Fixed {
                amount: Money::new(amount, currency),
            },
            (discount_type, ..) => {
                return Err(DbError::decode(
                    "discounts.discount_type",
                    format!("{:?} discount {} is missing its value", discount_type, r.id),
                ))
            }
        };
        Ok(Discount {
            location_ids: from_json("discounts.location_ids", &r.location_ids)?,
            id: r.id,
            merchant_id: r.merchant_id,
            name: r.name,
            kind,
            status: r.status,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use meridian_core::ports::InventoryRepository;

    const MERCHANT: &str = "m-1";

    fn usd(amount: i64) -> Money {
        Money::new(amount, Currency::Usd)
    }

    fn batch() -> CatalogBatch {
        CatalogBatch {
            locations: vec![
                Location {
                    id: "loc-1".to_string(),
                    merchant_id: MERCHANT.to_string(),
                    name: "Downtown".to_string(),
                    currency: Currency::Usd,
                    status: CatalogStatus::Active,
                },
                Location {
                    id: "loc-2".to_string(),
                    merchant_id: MERCHANT.to_string(),
                    name: "Airport".to_string(),
                    currency: Currency::Usd,
                    status: CatalogStatus::Active,
                },
            ],
            variations: vec![
                ItemVariation {
                    id: "latte".to_string(),
                    item_id: "coffee".to_string(),
                    merchant_id: MERCHANT.to_string(),
                    name: "Latte".to_string(),
                    price: usd(450),
                    location_ids: vec![],
                    status: CatalogStatus::Active,
                },
                ItemVariation {
                    id: "pretzel".to_string(),
                    item_id: "bakery".to_string(),
                    merchant_id: MERCHANT.to_string(),
                    name: "Pretzel".to_string(),
                    price: usd(325),
                    location_ids: vec!["loc-2".to_string()],
                    status: CatalogStatus::Active,
                },
            ],
            taxes: vec![
                Tax {
                    id: "state".to_string(),
                    merchant_id: MERCHANT.to_string(),
                    name: "State tax".to_string(),
                    percentage: Percentage::from_bps(625),
                    scope: TaxScope::Item,
                    location_ids: vec![],
                    status: CatalogStatus::Active,
                },
                Tax {
                    id: "city".to_string(),
                    merchant_id: MERCHANT.to_string(),
                    name: "City tax".to_string(),
                    percentage: Percentage::from_bps(200),
                    scope: TaxScope::Order,
                    location_ids: vec!["loc-1".to_string()],
                    status: CatalogStatus::Active,
                },
            ],
            discounts: vec![
                Discount {
                    id: "happy-hour".to_string(),
                    merchant_id: MERCHANT.to_string(),
                    name: "Happy hour".to_string(),
                    kind: DiscountKind::Percentage {
                        percentage: Percentage::from_bps(1000),
                    },
                    location_ids: vec![],
                    status: CatalogStatus::Active,
                },
                Discount {
                    id: "coupon".to_string(),
                    merchant_id: MERCHANT.to_string(),
                    name: "Coupon".to_string(),
                    kind: DiscountKind::Fixed { amount: usd(100) },
                    location_ids: vec![],
                    status: CatalogStatus::Inactive,
                },
            ],
        }
    }

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.catalog().put_batch(MERCHANT, &batch()).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_put_batch_round_trips_entities() {
        let db = seeded().await;
        let repo = db.catalog();
        let expected = batch();

        let latte = repo.get_item_variation(MERCHANT, "latte").await.unwrap().unwrap();
        assert_eq!(latte, expected.variations[0]);

        let taxes = repo
            .list_taxes(MERCHANT, &["city".to_string(), "state".to_string()])
            .await
            .unwrap();
        assert_eq!(taxes, vec![expected.taxes[1].clone(), expected.taxes[0].clone()]);

        let discounts = repo
            .list_discounts(MERCHANT, &["coupon".to_string(), "happy-hour".to_string()])
            .await
            .unwrap();
        assert_eq!(discounts[0], expected.discounts[1]);
        assert_eq!(discounts[1], expected.discounts[0]);

        let location = repo.get_location(MERCHANT, "loc-2").await.unwrap().unwrap();
        assert_eq!(location.name, "Airport");
    }

    #[tokio::test]
    async fn test_cross_tenant_reads_find_nothing() {
        let db = seeded().await;
        let repo = db.catalog();

        assert!(repo.get_item_variation("m-2", "latte").await.unwrap().is_none());
        assert!(repo
            .list_taxes("m-2", &["state".to_string()])
            .await
            .unwrap()
            .is_empty());
        assert!(repo.get_location("m-2", "loc-1").await.unwrap().is_none());
        assert!(repo.get_item_variation(MERCHANT, "ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_batch_seeds_counts_where_sold() {
        let db = seeded().await;
        let inventory = db.inventory();

        let latte_1 = inventory.get_count(MERCHANT, "latte", "loc-1").await.unwrap().unwrap();
        assert_eq!(latte_1.quantity, 0);
        assert_eq!(latte_1.state, InventoryState::Sold);
        assert!(inventory.get_count(MERCHANT, "latte", "loc-2").await.unwrap().is_some());

        // pretzel is only sold at loc-2
        assert!(inventory.get_count(MERCHANT, "pretzel", "loc-1").await.unwrap().is_none());
        assert!(inventory.get_count(MERCHANT, "pretzel", "loc-2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_put_batch_is_idempotent_upsert() {
        let db = seeded().await;
        let mut again = batch();
        again.variations[0].price = usd(475);
        db.catalog().put_batch(MERCHANT, &again).await.unwrap();

        let latte = db.catalog().get_item_variation(MERCHANT, "latte").await.unwrap().unwrap();
        assert_eq!(latte.price, usd(475));
    }

    #[tokio::test]
    async fn test_put_batch_rolls_back_on_failure() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut bad = batch();
        // 150% violates the percentage CHECK constraint after the variations
        // were already written inside the transaction.
        bad.taxes[0].percentage = Percentage::from_bps(15_000);

        assert!(db.catalog().put_batch(MERCHANT, &bad).await.is_err());
        assert!(db
            .catalog()
            .get_item_variation(MERCHANT, "latte")
            .await
            .unwrap()
            .is_none());
        assert!(db
            .inventory()
            .get_count(MERCHANT, "latte", "loc-1")
            .await
            .unwrap()
            .is_none());
    }
}
