//! In-memory payment ledger.
//!
//! Records live for the process lifetime. The write lock is held for the
//! whole per-address append, so concurrent payments for the same address
//! never lose each other.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{PaymentRecord, WalletAddress};

use super::{PaymentLedger, Result};

#[derive(Debug, Default)]
pub struct InMemoryPaymentLedger {
    records: RwLock<HashMap<WalletAddress, Vec<PaymentRecord>>>,
}

impl InMemoryPaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all addresses.
    pub async fn len(&self) -> usize {
        self.records.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PaymentLedger for InMemoryPaymentLedger {
    async fn append(&self, record: PaymentRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records
            .entry(record.address.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn query_by_address(&self, address: &WalletAddress) -> Result<Vec<PaymentRecord>> {
        Ok(self
            .records
            .read()
            .await
            .get(address)
            .cloned()
            .unwrap_or_default())
    }

    async fn transaction_seen(&self, transaction_id: &str) -> Result<bool> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .flatten()
            .any(|r| r.transaction_id == transaction_id))
    }

    async fn prune_expired(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut records = self.records.write().await;
        let mut removed = 0u64;
        for list in records.values_mut() {
            let before = list.len();
            list.retain(|r| r.expires_at > cutoff);
            removed += (before - list.len()) as u64;
        }
        records.retain(|_, list| !list.is_empty());
        Ok(removed)
    }

    async fn count_expired(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .flatten()
            .filter(|r| r.expires_at <= cutoff)
            .count() as u64)
    }
}
