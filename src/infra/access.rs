//! Premium access: payment recording and time-boxed grant checks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::domain::{evaluate_access, PaymentRecord, PremiumAccess, WalletAddress, PREMIUM_PRICE};
use crate::metrics::{metric_names, MetricsRegistry};

use super::{PaymentLedger, RelayError, Result};

pub struct PremiumAccessService {
    ledger: Arc<dyn PaymentLedger>,
    metrics: Arc<MetricsRegistry>,
    price: f64,
}

fn require_address(raw: &str) -> Result<WalletAddress> {
    WalletAddress::parse(raw).ok_or_else(|| RelayError::validation("address", "address is required"))
}

impl PremiumAccessService {
    pub fn new(ledger: Arc<dyn PaymentLedger>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            ledger,
            metrics,
            price: PREMIUM_PRICE,
        }
    }

    /// Append a confirmed payment for `address`. `amount` defaults to the
    /// premium price. Returns the new record and the resulting access.
    pub async fn record_payment(
        &self,
        address: &str,
        transaction_id: &str,
        amount: Option<f64>,
    ) -> Result<(PaymentRecord, PremiumAccess)> {
        self.record_payment_at(address, transaction_id, amount, Utc::now())
            .await
    }

    #[instrument(skip(self))]
    pub async fn record_payment_at(
        &self,
        address: &str,
        transaction_id: &str,
        amount: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<(PaymentRecord, PremiumAccess)> {
        let address = require_address(address)?;
        let transaction_id = transaction_id.trim();
        if transaction_id.is_empty() {
            return Err(RelayError::validation(
                "transactionId",
                "transactionId is required",
            ));
        }
        let amount = amount.unwrap_or(self.price);
        if !amount.is_finite() || amount <= 0.0 {
            return Err(RelayError::validation("amount", "amount must be a positive number"));
        }

        if self.ledger.transaction_seen(transaction_id).await? {
            warn!(
                address = %address,
                transaction_id,
                "Transaction id already recorded; granting a fresh window"
            );
        }

        let record = PaymentRecord::confirmed(address.clone(), transaction_id, amount, now);
        self.ledger.append(record.clone()).await?;
        self.metrics
            .inc_counter(metric_names::PAYMENTS_RECORDED)
            .await;

        let records = self.ledger.query_by_address(&address).await?;
        let access = evaluate_access(&records, now, self.price);
        info!(
            address = %address,
            amount,
            expires_at = %record.expires_at,
            has_access = access.has_access,
            "Payment recorded"
        );
        Ok((record, access))
    }

    /// Pure query. Blank addresses have no access.
    pub async fn check_access(&self, address: &str) -> Result<PremiumAccess> {
        self.check_access_at(address, Utc::now()).await
    }

    pub async fn check_access_at(&self, address: &str, now: DateTime<Utc>) -> Result<PremiumAccess> {
        let Some(address) = WalletAddress::parse(address) else {
            return Ok(PremiumAccess::denied());
        };
        let records = self.ledger.query_by_address(&address).await?;
        let access = evaluate_access(&records, now, self.price);

        let counter = if access.has_access {
            metric_names::ACCESS_GRANTED
        } else {
            metric_names::ACCESS_DENIED
        };
        self.metrics.inc_counter(counter).await;
        Ok(access)
    }

    /// Every record held for `address`, oldest first.
    pub async fn payment_history(&self, address: &str) -> Result<Vec<PaymentRecord>> {
        let address = require_address(address)?;
        self.ledger.query_by_address(&address).await
    }

    /// Remove records whose window ended at or before `now`. With `dry_run`
    /// only counts them.
    #[instrument(skip(self))]
    pub async fn prune_expired_at(&self, now: DateTime<Utc>, dry_run: bool) -> Result<u64> {
        let count = if dry_run {
            self.ledger.count_expired(now).await?
        } else {
            self.ledger.prune_expired(now).await?
        };
        info!(count, dry_run, "Pruned expired payments");
        Ok(count)
    }
}
