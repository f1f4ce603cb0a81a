//! PostgreSQL-backed payment ledger
//!
//! One row per recorded payment. Rows are only ever inserted, or deleted by
//! the operator prune command.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::{PaymentRecord, PaymentStatus, WalletAddress};
use crate::infra::{PaymentLedger, RelayError, Result};

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: Uuid,
    address: String,
    transaction_id: String,
    amount: f64,
    currency: String,
    paid_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    status: String,
}

impl PaymentRow {
    fn into_record(self) -> Result<PaymentRecord> {
        let address = WalletAddress::parse(&self.address).ok_or_else(|| {
            RelayError::Internal(format!("payment {} has a blank address", self.id))
        })?;
        let status: PaymentStatus = self.status.parse().map_err(RelayError::Internal)?;

        Ok(PaymentRecord {
            id: self.id,
            address,
            transaction_id: self.transaction_id,
            amount: self.amount,
            currency: self.currency,
            timestamp: self.paid_at,
            expires_at: self.expires_at,
            status,
        })
    }
}

/// Postgres [`PaymentLedger`]
#[derive(Clone)]
pub struct PgPaymentLedger {
    pool: PgPool,
}

impl PgPaymentLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentLedger for PgPaymentLedger {
    #[instrument(skip(self, record), fields(address = %record.address, payment_id = %record.id))]
    async fn append(&self, record: PaymentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO premium_payments
                (id, address, transaction_id, amount, currency, paid_at, expires_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.address.as_str())
        .bind(&record.transaction_id)
        .bind(record.amount)
        .bind(&record.currency)
        .bind(record.timestamp)
        .bind(record.expires_at)
        .bind(record.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query_by_address(&self, address: &WalletAddress) -> Result<Vec<PaymentRecord>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, address, transaction_id, amount, currency, paid_at, expires_at, status
            FROM premium_payments
            WHERE address = $1
            ORDER BY paid_at ASC, created_at ASC
            "#,
        )
        .bind(address.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PaymentRow::into_record).collect()
    }

    async fn transaction_seen(&self, transaction_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM premium_payments WHERE transaction_id = $1)",
        )
        .bind(transaction_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    #[instrument(skip(self))]
    async fn prune_expired(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM premium_payments WHERE expires_at <= $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_expired(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM premium_payments WHERE expires_at <= $1")
                .bind(cutoff)
                .fetch_one(&self.pool)
                .await?;

        Ok(count.max(0) as u64)
    }
}
