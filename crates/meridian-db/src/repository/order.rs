//! # Order Repository
//!
//! Orders are written once by `insert` and afterwards only through
//! `update`, which is guarded by the row version:
//!
//! ```text
//! UPDATE orders SET ..., version = :new
//! WHERE merchant_id = :m AND id = :id AND version = :expected
//!                                          └── 0 rows → Conflict
//! ```
//!
//! Line items, taxes and discounts are snapshots, stored as JSON columns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use meridian_core::ports::{OrderFilter, OrderRepository, RepositoryResult};
use meridian_core::{Currency, Money, Order, OrderState};

use super::{from_json, to_json};
use crate::error::{DbError, DbResult};

const ORDER_COLUMNS: &str = r#"
    merchant_id, id, location_id, customer_id, employee_id, state, currency,
    items, taxes, discounts,
    total_discount_amount, total_tax_amount, total_amount,
    payment_types, payment_ids, amount_paid, cancel_reason,
    version, created_at, updated_at, closed_at
"#;

#[derive(Debug, Clone)]
pub struct SqliteOrderRepository {
    pool: SqlitePool,
}

impl SqliteOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteOrderRepository { pool }
    }

    async fn insert_order(&self, order: &Order) -> DbResult<()> {
        debug!(order_id = %order.id, merchant_id = %order.merchant_id, "Inserting order");

        let sql = format!(
            r#"
            INSERT INTO orders ({})
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                    ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
            "#,
            ORDER_COLUMNS
        );

        sqlx::query(&sql)
            .bind(&order.merchant_id)
            .bind(&order.id)
            .bind(&order.location_id)
            .bind(&order.customer_id)
            .bind(&order.employee_id)
            .bind(order.state)
            .bind(order.currency)
            .bind(to_json(&order.items)?)
            .bind(to_json(&order.taxes)?)
            .bind(to_json(&order.discounts)?)
            .bind(order.total_discount_amount.amount())
            .bind(order.total_tax_amount.amount())
            .bind(order.total_amount.amount())
            .bind(to_json(&order.payment_types)?)
            .bind(to_json(&order.payment_ids)?)
            .bind(order.amount_paid.amount())
            .bind(&order.cancel_reason)
            .bind(order.version)
            .bind(order.created_at)
            .bind(order.updated_at)
            .bind(order.closed_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &order.id),
                other => other,
            })?;

        Ok(())
    }

    async fn fetch(&self, merchant_id: &str, id: &str) -> DbResult<Option<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE merchant_id = ?1 AND id = ?2",
            ORDER_COLUMNS
        );
        let record = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(merchant_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        record.map(Order::try_from).transpose()
    }

    async fn update_order(&self, order: &Order, expected_version: i64) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                state = ?3,
                payment_types = ?4,
                payment_ids = ?5,
                amount_paid = ?6,
                cancel_reason = ?7,
                version = ?8,
                updated_at = ?9,
                closed_at = ?10
            WHERE merchant_id = ?1 AND id = ?2 AND version = ?11
            "#,
        )
        .bind(&order.merchant_id)
        .bind(&order.id)
        .bind(order.state)
        .bind(to_json(&order.payment_types)?)
        .bind(to_json(&order.payment_ids)?)
        .bind(order.amount_paid.amount())
        .bind(&order.cancel_reason)
        .bind(order.version)
        .bind(order.updated_at)
        .bind(order.closed_at)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::stale("Order", &order.id));
        }

        debug!(
            order_id = %order.id,
            state = %order.state,
            version = order.version,
            "Order updated"
        );
        Ok(())
    }

    async fn fetch_list(&self, merchant_id: &str, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT {} FROM orders
            WHERE merchant_id = ?1
              AND (?2 IS NULL OR location_id = ?2)
              AND (?3 IS NULL OR state = ?3)
              AND (?4 IS NULL OR customer_id = ?4)
            ORDER BY julianday(created_at) DESC, id DESC
            LIMIT ?5
            "#,
            ORDER_COLUMNS
        );

        // SQLite treats a negative LIMIT as "no limit".
        let limit = filter.limit.map_or(-1, i64::from);

        let records = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(merchant_id)
            .bind(&filter.location_id)
            .bind(filter.state)
            .bind(&filter.customer_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        records.into_iter().map(Order::try_from).collect()
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn insert(&self, order: &Order) -> RepositoryResult<()> {
        Ok(self.insert_order(order).await?)
    }

    async fn get(&self, merchant_id: &str, id: &str) -> RepositoryResult<Option<Order>> {
        Ok(self.fetch(merchant_id, id).await?)
    }

    async fn update(&self, order: &Order, expected_version: i64) -> RepositoryResult<()> {
        Ok(self.update_order(order, expected_version).await?)
    }

    async fn list(&self, merchant_id: &str, filter: &OrderFilter) -> RepositoryResult<Vec<Order>> {
        Ok(self.fetch_list(merchant_id, filter).await?)
    }
}

// =============================================================================
// Record Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRecord {
    merchant_id: String,
    id: String,
    location_id: String,
    customer_id: Option<String>,
    employee_id: Option<String>,
    state: OrderState,
    currency: Currency,
    items: String,
    taxes: String,
    discounts: String,
    total_discount_amount: i64,
    total_tax_amount: i64,
    total_amount: i64,
    payment_types: String,
    payment_ids: String,
    amount_paid: i64,
    cancel_reason: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRecord> for Order {
    type Error = DbError;

    fn try_from(r: OrderRecord) -> DbResult<Self> {
        let money = |amount| Money::new(amount, r.currency);
        Ok(Order {
            items: from_json("orders.items", &r.items)?,
            taxes: from_json("orders.taxes", &r.taxes)?,
            discounts: from_json("orders.discounts", &r.discounts)?,
            payment_types: from_json("orders.payment_types", &r.payment_types)?,
            payment_ids: from_json("orders.payment_ids", &r.payment_ids)?,
            total_discount_amount: money(r.total_discount_amount),
            total_tax_amount: money(r.total_tax_amount),
            total_amount: money(r.total_amount),
            amount_paid: money(r.amount_paid),
            id: r.id,
            merchant_id: r.merchant_id,
            location_id: r.location_id,
            customer_id: r.customer_id,
            employee_id: r.employee_id,
            state: r.state,
            currency: r.currency,
            cancel_reason: r.cancel_reason,
            version: r.version,
            created_at: r.created_at,
            updated_at: r.updated_at,
            closed_at: r.closed_at,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
