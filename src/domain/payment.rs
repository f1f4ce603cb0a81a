//! Payment records and premium access evaluation.
//!
//! Access is derived purely from the ledger contents and the current time so
//! it can be evaluated without touching storage.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::WalletAddress;

/// Price of one premium window, in USDC.
pub const PREMIUM_PRICE: f64 = 5.0;

/// Length of the access window granted by one payment.
pub const PREMIUM_DURATION_DAYS: i64 = 30;

pub const PREMIUM_CURRENCY: &str = "USDC";

/// Milliseconds in one day.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Expired => "expired",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// One append-only ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: Uuid,
    pub address: WalletAddress,
    pub transaction_id: String,
    pub amount: f64,
    pub currency: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    pub status: PaymentStatus,
}

impl PaymentRecord {
    /// A confirmed payment made at `now`, valid for the standard window.
    pub fn confirmed(
        address: WalletAddress,
        transaction_id: impl Into<String>,
        amount: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            address,
            transaction_id: transaction_id.into(),
            amount,
            currency: PREMIUM_CURRENCY.to_string(),
            timestamp: now,
            expires_at: now + Duration::days(PREMIUM_DURATION_DAYS),
            status: PaymentStatus::Confirmed,
        }
    }

    /// Whether this record alone grants access at `now`.
    pub fn grants_access(&self, now: DateTime<Utc>, price: f64) -> bool {
        self.status == PaymentStatus::Confirmed && self.amount >= price && self.expires_at > now
    }
}

/// Result of an access check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumAccess {
    pub has_access: bool,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
}

impl PremiumAccess {
    pub fn denied() -> Self {
        Self {
            has_access: false,
            expires_at: None,
            days_remaining: None,
        }
    }

    pub fn granted(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            has_access: true,
            expires_at: Some(expires_at),
            days_remaining: Some(days_remaining(expires_at, now)),
        }
    }
}

/// Whole days left, rounded up.
pub fn days_remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let ms = (expires_at - now).num_milliseconds();
    if ms <= 0 {
        return 0;
    }
    (ms + DAY_MS - 1) / DAY_MS
}

/// Evaluate access from every record held for one address. The furthest
/// qualifying expiry wins.
pub fn evaluate_access(records: &[PaymentRecord], now: DateTime<Utc>, price: f64) -> PremiumAccess {
    records
        .iter()
        .filter(|r| r.grants_access(now, price))
        .map(|r| r.expires_at)
        .max()
        .map(|expires_at| PremiumAccess::granted(expires_at, now))
        .unwrap_or_else(PremiumAccess::denied)
}
