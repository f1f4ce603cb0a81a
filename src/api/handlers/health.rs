//! Health check handlers
//!
//! - `/health` is a cheap liveness probe
//! - `/ready` checks the payment ledger database and reports which providers
//!   are configured
//! - `/metrics` exports the in-process registry as Prometheus text

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

const SERVICE_NAME: &str = "incident-relay";

/// Response for the basic health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall health status
    pub status: HealthStatus,
    /// Service name
    pub service: &'static str,
    /// Service version
    pub version: &'static str,
    /// Timestamp of health check
    pub timestamp: String,
}

/// Response for the readiness endpoint
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: HealthStatus,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub components: Vec<ComponentStatus>,
}

/// Overall health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All components healthy
    Healthy,
    /// Some components degraded but operational
    Degraded,
    /// Critical components unhealthy
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy)
    }
}

/// Individual component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    /// Component name
    pub name: String,
    /// Health status
    pub status: HealthStatus,
    /// Optional message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

impl ComponentStatus {
    fn configured(name: &str, configured: bool) -> Self {
        Self {
            name: name.to_string(),
            status: if configured {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            message: Some(if configured { "Configured" } else { "Not configured" }.to_string()),
            response_time_ms: None,
        }
    }
}

/// Basic health check endpoint.
///
/// Returns a simple health response without performing deep checks.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn database_status(state: &AppState) -> ComponentStatus {
    let Some(pool) = &state.db_pool else {
        return ComponentStatus {
            name: "payment_ledger".to_string(),
            status: HealthStatus::Healthy,
            message: Some("In-memory".to_string()),
            response_time_ms: None,
        };
    };

    let start = std::time::Instant::now();
    let result = sqlx::query("SELECT 1").execute(pool).await;
    let response_time = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => ComponentStatus {
            name: "payment_ledger".to_string(),
            status: if response_time < 500 {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            message: Some("postgresql".to_string()),
            response_time_ms: Some(response_time),
        },
        Err(e) => ComponentStatus {
            name: "payment_ledger".to_string(),
            status: HealthStatus::Unhealthy,
            message: Some(format!("Connection failed: {}", e)),
            response_time_ms: Some(response_time),
        },
    }
}

/// Readiness check endpoint.
///
/// The ledger database is critical; missing provider credentials only
/// degrade the service.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let components = vec![
        database_status(&state).await,
        ComponentStatus::configured("pinning", state.submission.is_configured()),
        ComponentStatus::configured("media_authenticity", state.media_checker.is_some()),
        ComponentStatus::configured("proof_verification", state.verifier.is_some()),
    ];
    let status = determine_overall_status(&components);

    let status_code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        status_code,
        Json(ReadinessResponse {
            status,
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_secs: state.metrics.uptime_seconds(),
            components,
        }),
    )
}

/// Prometheus text exposition of the metrics registry.
pub async fn metrics_export(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.to_prometheus().await,
    )
}

/// Worst component wins.
fn determine_overall_status(components: &[ComponentStatus]) -> HealthStatus {
    if components.iter().any(|c| c.status.is_unhealthy()) {
        return HealthStatus::Unhealthy;
    }
    if components.iter().all(|c| c.status.is_healthy()) {
        return HealthStatus::Healthy;
    }
    HealthStatus::Degraded
}
