//! Cash drawer repository. Same commit protocol as the inventory ledger:
//! the drawer row is version-guarded and the adjustment insert fails on a
//! known id, both inside one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use meridian_core::ports::{CashDrawerRepository, RepositoryResult};
use meridian_core::{CashDrawer, CashDrawerAdjustment, CashDrawerOp, Currency, Money};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct SqliteCashDrawerRepository {
    pool: SqlitePool,
}

impl SqliteCashDrawerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteCashDrawerRepository { pool }
    }

    async fn fetch_drawer(&self, merchant_id: &str, column: DrawerKey, value: &str) -> DbResult<Option<CashDrawer>> {
        let sql = format!(
            r#"
            SELECT merchant_id, id, location_id, amount, currency, version, calculated_at
            FROM cash_drawers
            WHERE merchant_id = ?1 AND {} = ?2
            "#,
            column.as_str()
        );
        let record = sqlx::query_as::<_, DrawerRecord>(&sql)
            .bind(merchant_id)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(CashDrawer::from))
    }

    async fn exists(&self, merchant_id: &str, id: &str) -> DbResult<bool> {
        let found: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM cash_drawer_adjustments WHERE merchant_id = ?1 AND id = ?2",
        )
        .bind(merchant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    async fn fetch_adjustments(
        &self,
        merchant_id: &str,
        cash_drawer_id: &str,
    ) -> DbResult<Vec<CashDrawerAdjustment>> {
        let records = sqlx::query_as::<_, AdjustmentRecord>(
            r#"
            SELECT id, cash_drawer_id, op, amount, currency, note, created_at
            FROM cash_drawer_adjustments
            WHERE merchant_id = ?1 AND cash_drawer_id = ?2
            ORDER BY seq ASC
            "#,
        )
        .bind(merchant_id)
        .bind(cash_drawer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(CashDrawerAdjustment::from).collect())
    }

    async fn write(&self, drawer: &CashDrawer, adjustment: &CashDrawerAdjustment) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        if drawer.version <= 1 {
            sqlx::query(
                r#"
                INSERT INTO cash_drawers (
                    merchant_id, id, location_id, amount, currency, version, calculated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&drawer.merchant_id)
            .bind(&drawer.id)
            .bind(&drawer.location_id)
            .bind(drawer.amount.amount())
            .bind(drawer.amount.currency())
            .bind(drawer.version)
            .bind(drawer.calculated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { .. } => DbError::stale("CashDrawer", &drawer.id),
                other => other,
            })?;
        } else {
            let result = sqlx::query(
                r#"
                UPDATE cash_drawers SET
                    amount = ?3,
                    version = ?4,
                    calculated_at = ?5
                WHERE merchant_id = ?1 AND id = ?2 AND version = ?6
                "#,
            )
            .bind(&drawer.merchant_id)
            .bind(&drawer.id)
            .bind(drawer.amount.amount())
            .bind(drawer.version)
            .bind(drawer.calculated_at)
            .bind(drawer.version - 1)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(DbError::stale("CashDrawer", &drawer.id));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO cash_drawer_adjustments (
                merchant_id, id, cash_drawer_id, op, amount, currency, note, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&drawer.merchant_id)
        .bind(&adjustment.id)
        .bind(&adjustment.cash_drawer_id)
        .bind(adjustment.op)
        .bind(adjustment.amount.amount())
        .bind(adjustment.amount.currency())
        .bind(&adjustment.note)
        .bind(adjustment.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &adjustment.id),
            other => other,
        })?;

        tx.commit().await?;

        debug!(
            drawer_id = %drawer.id,
            adjustment_id = %adjustment.id,
            balance = drawer.amount.amount(),
            "Cash drawer committed"
        );
        Ok(())
    }
}

/// Columns a drawer can be looked up by.
#[derive(Debug, Clone, Copy)]
enum DrawerKey {
    Id,
    Location,
}

impl DrawerKey {
    fn as_str(self) -> &'static str {
        match self {
            DrawerKey::Id => "id",
            DrawerKey::Location => "location_id",
        }
    }
}

#[async_trait]
impl CashDrawerRepository for SqliteCashDrawerRepository {
    async fn get_drawer(&self, merchant_id: &str, id: &str) -> RepositoryResult<Option<CashDrawer>> {
        Ok(self.fetch_drawer(merchant_id, DrawerKey::Id, id).await?)
    }

    async fn get_drawer_for_location(
        &self,
        merchant_id: &str,
        location_id: &str,
    ) -> RepositoryResult<Option<CashDrawer>> {
        Ok(self
            .fetch_drawer(merchant_id, DrawerKey::Location, location_id)
            .await?)
    }

    async fn adjustment_exists(&self, merchant_id: &str, id: &str) -> RepositoryResult<bool> {
        Ok(self.exists(merchant_id, id).await?)
    }

    async fn list_adjustments(
        &self,
        merchant_id: &str,
        cash_drawer_id: &str,
    ) -> RepositoryResult<Vec<CashDrawerAdjustment>> {
        Ok(self.fetch_adjustments(merchant_id, cash_drawer_id).await?)
    }

    async fn commit(
        &self,
        drawer: &CashDrawer,
        adjustment: &CashDrawerAdjustment,
    ) -> RepositoryResult<()> {
        Ok(self.write(drawer, adjustment).await?)
    }
}

// =============================================================================
// Record Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct DrawerRecord {
    merchant_id: String,
    id: String,
    location_id: String,
    amount: i64,
    currency: Currency,
    version: i64,
    calculated_at: DateTime<Utc>,
}

impl From<DrawerRecord> for CashDrawer {
    fn from(r: DrawerRecord) -> Self {
        CashDrawer {
            id: r.id,
            location_id: r.location_id,
            merchant_id: r.merchant_id,
            amount: Money::new(r.amount, r.currency),
            version: r.version,
            calculated_at: r.calculated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdjustmentRecord {
    id: String,
    cash_drawer_id: String,
    op: CashDrawerOp,
    amount: i64,
    currency: Currency,
    note: String,
    created_at: DateTime<Utc>,
}

impl From<AdjustmentRecord> for CashDrawerAdjustment {
    fn from(r: AdjustmentRecord) -> Self {
        CashDrawerAdjustment {
            id: r.id,
            cash_drawer_id: r.cash_drawer_id,
            op: r.op,
            amount: Money::new(r.amount, r.currency),
            note: r.note,
            created_at: r.created_at,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
