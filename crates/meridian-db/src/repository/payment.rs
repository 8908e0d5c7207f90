//! Payment repository. Payments are immutable once inserted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use meridian_core::ports::{PaymentRepository, RepositoryResult};
use meridian_core::{Currency, Money, Payment, PaymentType};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SqlitePaymentRepository { pool }
    }

    async fn insert_payment(&self, payment: &Payment) -> DbResult<()> {
        debug!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            amount = payment.amount.amount(),
            "Inserting payment"
        );

        sqlx::query(
            r#"
            INSERT INTO payments (
                merchant_id, id, order_id, payment_type, amount, tip_amount, currency, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&payment.merchant_id)
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(payment.payment_type)
        .bind(payment.amount.amount())
        .bind(payment.tip_amount.amount())
        .bind(payment.amount.currency())
        .bind(payment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &payment.id),
            other => other,
        })?;

        Ok(())
    }

    async fn fetch(&self, merchant_id: &str, id: &str) -> DbResult<Option<Payment>> {
        let record = sqlx::query_as::<_, PaymentRecord>(
            r#"
            SELECT merchant_id, id, order_id, payment_type, amount, tip_amount, currency, created_at
            FROM payments
            WHERE merchant_id = ?1 AND id = ?2
            "#,
        )
        .bind(merchant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Payment::from))
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn insert(&self, payment: &Payment) -> RepositoryResult<()> {
        Ok(self.insert_payment(payment).await?)
    }

    async fn get(&self, merchant_id: &str, id: &str) -> RepositoryResult<Option<Payment>> {
        Ok(self.fetch(merchant_id, id).await?)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRecord {
    merchant_id: String,
    id: String,
    order_id: String,
    payment_type: PaymentType,
    amount: i64,
    tip_amount: i64,
    currency: Currency,
    created_at: DateTime<Utc>,
}

impl From<PaymentRecord> for Payment {
    fn from(r: PaymentRecord) -> Self {
        Payment {
            id: r.id,
            merchant_id: r.merchant_id,
            order_id: r.order_id,
            payment_type: r.payment_type,
            amount: Money::new(r.amount, r.currency),
            tip_amount: Money::new(r.tip_amount, r.currency),
            created_at: r.created_at,
        }
    }
}
