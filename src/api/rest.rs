//! REST API routes for the incident relay.

use axum::routing::{get, post};
use axum::Router;

use crate::api::handlers::{
    analyze_media, analyze_text, check_access, get_incident, incident_feed, list_incidents,
    payment_history, premium_analytics, record_payment, submit_incident, verify_proof,
};
use crate::server::AppState;

/// Build the `/api` router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Incident reports
        .route("/v1/incidents", post(submit_incident).get(list_incidents))
        .route("/v1/incidents/feed", get(incident_feed))
        .route("/v1/incidents/:cid", get(get_incident))
        // Advisory analysis
        .route("/v1/analysis/text", post(analyze_text))
        .route("/v1/analysis/media", post(analyze_media))
        // Proof of personhood
        .route("/v1/verify", post(verify_proof))
        // Premium tier
        .route(
            "/v1/premium/payments",
            post(record_payment).get(payment_history),
        )
        .route("/v1/premium/access", get(check_access))
        .route("/v1/premium/analytics", get(premium_analytics))
}
