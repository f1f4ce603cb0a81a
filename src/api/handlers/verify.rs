//! Proof-of-personhood verification handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::api::error::{missing_field, validation_error, ApiError};
use crate::api::types::VerifyRequest;
use crate::infra::RelayError;
use crate::metrics::metric_names;
use crate::server::AppState;

/// `{success, ...provider body}`. Non-object bodies are kept under `response`.
fn merge_success(success: bool, body: Value) -> Value {
    let mut merged = match body {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("response".to_string(), other);
            map
        }
    };
    merged.insert("success".to_string(), Value::Bool(success));
    Value::Object(merged)
}

/// Forward a proof to the verification provider
///
/// Provider acceptance yields `200 {success: true, ...}`; a rejection yields
/// `400 {success: false, ...}` with the provider body passed through.
#[instrument(skip_all)]
pub async fn verify_proof(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let proof = payload.proof.ok_or_else(|| missing_field("proof"))?;
    if !proof.is_object() {
        return Err(validation_error("proof", "proof must be a JSON object"));
    }
    let action = payload
        .action
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .ok_or_else(|| missing_field("action"))?;

    let verifier = state.verifier.clone().ok_or_else(|| {
        ApiError::from(RelayError::Configuration(
            "proof verification credentials are not configured".into(),
        ))
    })?;

    let verdict = verifier
        .verify(proof, &action)
        .await
        .map_err(|e| ApiError::from_relay(e, "Verification failed"))?;

    if verdict.verified {
        state.metrics.inc_counter(metric_names::VERIFY_SUCCESS).await;
        info!(action = %action, "Proof verified");
        Ok((StatusCode::OK, Json(merge_success(true, verdict.body))))
    } else {
        state.metrics.inc_counter(metric_names::VERIFY_FAILURE).await;
        warn!(action = %action, body = %verdict.body, "Proof rejected by provider");
        Ok((StatusCode::BAD_REQUEST, Json(merge_success(false, verdict.body))))
    }
}
