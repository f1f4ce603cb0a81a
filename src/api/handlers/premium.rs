//! Premium tier handlers
//!
//! # Endpoints
//!
//! - `POST /api/v1/premium/payments` - Record a confirmed payment
//! - `GET /api/v1/premium/payments?address=` - Payment history for a wallet
//! - `GET /api/v1/premium/access?address=` - Current access for a wallet
//! - `GET /api/v1/premium/analytics?address=` - Aggregate analytics, paywalled

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use tracing::{info, instrument};

use crate::api::error::{missing_field, premium_required, ApiError};
use crate::api::types::{
    AccessWindow, AddressQuery, PaymentHistoryResponse, PremiumAnalyticsResponse,
    RecordPaymentRequest, RecordPaymentResponse,
};
use crate::domain::{days_remaining, AnalyticsReport, PremiumAccess};
use crate::server::AppState;

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| missing_field(field))
}

/// Record a payment and grant a fresh 30-day window
///
/// # Request
///
/// ```json
/// { "address": "0xabc...", "transactionId": "0x123...", "amount": 5 }
/// ```
#[instrument(skip_all)]
pub async fn record_payment(
    State(state): State<AppState>,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<Json<RecordPaymentResponse>, ApiError> {
    let address = required(payload.address, "address")?;
    let transaction_id = required(payload.transaction_id, "transactionId")?;

    let (record, _) = state
        .access
        .record_payment(&address, &transaction_id, payload.amount)
        .await
        .map_err(|e| ApiError::from_relay(e, "Failed to record payment"))?;

    Ok(Json(RecordPaymentResponse {
        success: true,
        message: "Payment recorded successfully".to_string(),
        payment: AccessWindow {
            expires_at: Some(record.expires_at),
            days_remaining: Some(days_remaining(record.expires_at, record.timestamp)),
        },
    }))
}

/// Every payment recorded for a wallet, oldest first
#[instrument(skip_all)]
pub async fn payment_history(
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> Result<Json<PaymentHistoryResponse>, ApiError> {
    let address = required(query.address, "address")?;
    let payments = state
        .access
        .payment_history(&address)
        .await
        .map_err(|e| ApiError::from_relay(e, "Failed to load payments"))?;
    Ok(Json(PaymentHistoryResponse {
        success: true,
        payments,
    }))
}

/// Current premium access. A missing address simply has no access.
#[instrument(skip_all)]
pub async fn check_access(
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> Result<Json<PremiumAccess>, ApiError> {
    let address = query.address.unwrap_or_default();
    let access = state
        .access
        .check_access(&address)
        .await
        .map_err(|e| ApiError::from_relay(e, "Failed to check access"))?;
    Ok(Json(access))
}

/// Aggregate analytics over the live incident set
///
/// Returns `403` with `premiumRequired: true` when the wallet has no active
/// grant.
#[instrument(skip_all)]
pub async fn premium_analytics(
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> Result<Json<PremiumAnalyticsResponse>, ApiError> {
    let address = required(query.address, "address")?;
    let access = state
        .access
        .check_access(&address)
        .await
        .map_err(|e| ApiError::from_relay(e, "Failed to fetch analytics data"))?;
    if !access.has_access {
        return Err(premium_required());
    }

    let loaded = state
        .directory
        .load_incidents()
        .await
        .map_err(|e| ApiError::from_relay(e, "Failed to fetch analytics data"))?;
    let report = AnalyticsReport::compute(loaded.incidents.iter().map(|i| &i.report), Utc::now());

    info!(
        incidents = report.totals.all,
        skipped = loaded.skipped,
        "Served premium analytics"
    );
    Ok(Json(PremiumAnalyticsResponse {
        success: true,
        data: report,
        premium_access: AccessWindow::from(&access),
    }))
}
