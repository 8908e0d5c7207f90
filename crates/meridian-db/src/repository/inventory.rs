//! # Inventory Repository
//!
//! Counts are a materialized view over the append-only adjustment ledger.
//! `commit` writes both in one transaction:
//!
//! ```text
//! BEGIN
//!   for count:  version == 1 → INSERT            (taken pair → Conflict)
//!               version  > 1 → UPDATE ... WHERE version = :version - 1
//!                                                (0 rows     → Conflict)
//!   for adjustment: INSERT                       (known id   → Conflict)
//! COMMIT
//! ```
//!
//! Adjustments keep their insertion order through `seq`, which is what
//! `list_adjustments` replays in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use meridian_core::ports::{InventoryRepository, RepositoryResult};
use meridian_core::{AdjustmentOp, InventoryAdjustment, InventoryCount, InventoryState};

use super::to_json;
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct SqliteInventoryRepository {
    pool: SqlitePool,
}

impl SqliteInventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteInventoryRepository { pool }
    }

    async fn fetch_count(
        &self,
        merchant_id: &str,
        item_variation_id: &str,
        location_id: &str,
    ) -> DbResult<Option<InventoryCount>> {
        let record = sqlx::query_as::<_, CountRecord>(
            r#"
            SELECT merchant_id, item_variation_id, location_id, id,
                   quantity, state, version, calculated_at
            FROM inventory_counts
            WHERE merchant_id = ?1 AND item_variation_id = ?2 AND location_id = ?3
            "#,
        )
        .bind(merchant_id)
        .bind(item_variation_id)
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(InventoryCount::from))
    }

    async fn fetch_recorded_ids(&self, merchant_id: &str, ids: &[String]) -> DbResult<Vec<String>> {
        let recorded: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT id FROM inventory_adjustments
            WHERE merchant_id = ?1 AND id IN (SELECT value FROM json_each(?2))
            "#,
        )
        .bind(merchant_id)
        .bind(to_json(ids)?)
        .fetch_all(&self.pool)
        .await?;

        Ok(recorded.into_iter().map(|(id,)| id).collect())
    }

    async fn fetch_adjustments(
        &self,
        merchant_id: &str,
        item_variation_id: &str,
        location_id: &str,
    ) -> DbResult<Vec<InventoryAdjustment>> {
        let records = sqlx::query_as::<_, AdjustmentRecord>(
            r#"
            SELECT merchant_id, id, item_variation_id, location_id, op, quantity, created_at
            FROM inventory_adjustments
            WHERE merchant_id = ?1 AND item_variation_id = ?2 AND location_id = ?3
            ORDER BY seq ASC
            "#,
        )
        .bind(merchant_id)
        .bind(item_variation_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(InventoryAdjustment::from).collect())
    }

    async fn write(&self, counts: &[InventoryCount], adjustments: &[InventoryAdjustment]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        for count in counts {
            write_count(&mut tx, count).await?;
        }
        for adjustment in adjustments {
            insert_adjustment(&mut tx, adjustment).await?;
        }

        tx.commit().await?;

        debug!(
            counts = counts.len(),
            adjustments = adjustments.len(),
            "Inventory committed"
        );
        Ok(())
    }
}

#[async_trait]
impl InventoryRepository for SqliteInventoryRepository {
    async fn get_count(
        &self,
        merchant_id: &str,
        item_variation_id: &str,
        location_id: &str,
    ) -> RepositoryResult<Option<InventoryCount>> {
        Ok(self
            .fetch_count(merchant_id, item_variation_id, location_id)
            .await?)
    }

    async fn recorded_adjustment_ids(
        &self,
        merchant_id: &str,
        ids: &[String],
    ) -> RepositoryResult<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.fetch_recorded_ids(merchant_id, ids).await?)
    }

    async fn list_adjustments(
        &self,
        merchant_id: &str,
        item_variation_id: &str,
        location_id: &str,
    ) -> RepositoryResult<Vec<InventoryAdjustment>> {
        Ok(self
            .fetch_adjustments(merchant_id, item_variation_id, location_id)
            .await?)
    }

    async fn commit(
        &self,
        counts: &[InventoryCount],
        adjustments: &[InventoryAdjustment],
    ) -> RepositoryResult<()> {
        if counts.is_empty() && adjustments.is_empty() {
            return Ok(());
        }
        Ok(self.write(counts, adjustments).await?)
    }
}

async fn write_count(tx: &mut Transaction<'_, Sqlite>, count: &InventoryCount) -> DbResult<()> {
    if count.version <= 1 {
        sqlx::query(
            r#"
            INSERT INTO inventory_counts (
                merchant_id, item_variation_id, location_id, id,
                quantity, state, version, calculated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&count.merchant_id)
        .bind(&count.item_variation_id)
        .bind(&count.location_id)
        .bind(&count.id)
        .bind(count.quantity)
        .bind(count.state)
        .bind(count.version)
        .bind(count.calculated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::stale("InventoryCount", &count.id),
            other => other,
        })?;
        return Ok(());
    }

    let result = sqlx::query(
        r#"
        UPDATE inventory_counts SET
            quantity = ?4,
            state = ?5,
            version = ?6,
            calculated_at = ?7
        WHERE merchant_id = ?1 AND item_variation_id = ?2 AND location_id = ?3
          AND version = ?8
        "#,
    )
    .bind(&count.merchant_id)
    .bind(&count.item_variation_id)
    .bind(&count.location_id)
    .bind(count.quantity)
    .bind(count.state)
    .bind(count.version)
    .bind(count.calculated_at)
    .bind(count.version - 1)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::stale("InventoryCount", &count.id));
    }
    Ok(())
}

async fn insert_adjustment(
    tx: &mut Transaction<'_, Sqlite>,
    adjustment: &InventoryAdjustment,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO inventory_adjustments (
            merchant_id, id, item_variation_id, location_id, op, quantity, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&adjustment.merchant_id)
    .bind(&adjustment.id)
    .bind(&adjustment.item_variation_id)
    .bind(&adjustment.location_id)
    .bind(adjustment.op)
    .bind(adjustment.quantity)
    .bind(adjustment.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &adjustment.id),
        other => other,
    })?;
    Ok(())
}

// =============================================================================
// Record Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CountRecord {
    merchant_id: String,
    item_variation_id: String,
    location_id: String,
    id: String,
    quantity: i64,
    state: InventoryState,
    version: i64,
    calculated_at: DateTime<Utc>,
}

impl From<CountRecord> for InventoryCount {
    fn from(r: CountRecord) -> Self {
        InventoryCount {
            id: r.id,
            item_variation_id: r.item_variation_id,
            location_id: r.location_id,
            merchant_id: r.merchant_id,
            quantity: r.quantity,
            state: r.state,
            version: r.version,
            calculated_at: r.calculated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdjustmentRecord {
    merchant_id: String,
    id: String,
    item_variation_id: String,
    location_id: String,
    op: AdjustmentOp,
    quantity: i64,
    created_at: DateTime<Utc>,
}

impl From<AdjustmentRecord> for InventoryAdjustment {
    fn from(r: AdjustmentRecord) -> Self {
        InventoryAdjustment {
            id: r.id,
            item_variation_id: r.item_variation_id,
            location_id: r.location_id,
            merchant_id: r.merchant_id,
            op: r.op,
            quantity: r.quantity,
            created_at: r.created_at,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
