//! HTTP server bootstrap for the incident relay.
//!
//! This module wires together:
//! - configuration from the environment
//! - provider adapters (pinning, gateway, verification, media checks, geocoding)
//! - the payment ledger (PostgreSQL when `DATABASE_URL` is set, else in-memory)
//! - the Axum router

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::signal;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::handlers::{health_check, metrics_export, readiness_check};
use crate::infra::http::{env_non_empty, DEFAULT_PROVIDER_TIMEOUT};
use crate::infra::{
    ContentGateway, Geocoder, GeocoderConfig, InMemoryPaymentLedger, InMemoryPinStore,
    IncidentDirectory, IpfsGateway, MediaAuthenticityChecker, NaiveBayesClassifier,
    NominatimGeocoder, PaymentLedger, PgPaymentLedger, PinataClient, PinataConfig,
    PinningService, PremiumAccessService, ProofVerifier, ReplicateChecker, ReplicateConfig,
    RetryConfig, SubmissionService, TextClassifier, WorldIdConfig, WorldIdVerifier,
    DEFAULT_FETCH_CONCURRENCY, DEFAULT_PROJECT_TAG,
};
use crate::metrics::MetricsRegistry;
use crate::telemetry::{init_telemetry, TelemetryConfig};

/// Default request body cap (25 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Where reports are pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinningBackend {
    Pinata,
    /// Process-local store for development; nothing survives a restart
    Memory,
}

impl std::str::FromStr for PinningBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pinata" => Ok(Self::Pinata),
            "memory" => Ok(Self::Memory),
            other => Err(format!("PINNING_BACKEND must be 'pinata' or 'memory', got {other:?}")),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Request body cap.
    pub max_upload_bytes: usize,
    pub pinning_backend: PinningBackend,
    /// Value of the `project` pin tag.
    pub project_tag: String,
    pub upload_max_retries: u32,
    /// Timeout for every outbound provider request.
    pub provider_timeout: Duration,
    pub fetch_concurrency: usize,
    /// PostgreSQL connection URL; `None` selects the in-memory ledger.
    pub database_url: Option<String>,
    /// Maximum database connections.
    pub max_connections: u32,
    pub migrate_on_startup: bool,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_non_empty(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    match env_non_empty(key) {
        Some(v) => !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "off" | "no"),
        None => default,
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let port: u16 = env_parse("PORT", 8080);
        let host = env_non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address {host}:{port}: {e}"))?;

        let pinning_backend = match env_non_empty("PINNING_BACKEND") {
            Some(v) => v.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            None => PinningBackend::Pinata,
        };

        Ok(Self {
            listen_addr,
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            pinning_backend,
            project_tag: env_non_empty("PROJECT_TAG")
                .unwrap_or_else(|| DEFAULT_PROJECT_TAG.to_string()),
            upload_max_retries: env_parse("UPLOAD_MAX_RETRIES", 2),
            provider_timeout: Duration::from_secs(env_parse(
                "PROVIDER_TIMEOUT_SECS",
                DEFAULT_PROVIDER_TIMEOUT.as_secs(),
            )),
            fetch_concurrency: env_parse("GATEWAY_FETCH_CONCURRENCY", DEFAULT_FETCH_CONCURRENCY),
            database_url: env_non_empty("DATABASE_URL"),
            max_connections: env_parse("MAX_DB_CONNECTIONS", 10),
            migrate_on_startup: env_flag("DB_MIGRATE_ON_STARTUP", true),
        })
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub submission: Arc<SubmissionService>,
    pub directory: Arc<IncidentDirectory>,
    pub access: Arc<PremiumAccessService>,
    pub classifier: Arc<dyn TextClassifier>,
    pub media_checker: Option<Arc<dyn MediaAuthenticityChecker>>,
    pub verifier: Option<Arc<dyn ProofVerifier>>,
    pub metrics: Arc<MetricsRegistry>,
    /// Present when the payment ledger is PostgreSQL.
    pub db_pool: Option<PgPool>,
}

/// Start the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    init_telemetry(&TelemetryConfig::from_env()).map_err(|e| anyhow::anyhow!(e))?;

    info!("Starting incident relay v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Pinning backend: {:?}", config.pinning_backend);
    info!("  Project tag: {}", config.project_tag);
    info!("  Max upload bytes: {}", config.max_upload_bytes);

    let metrics = Arc::new(MetricsRegistry::new());
    let timeout = config.provider_timeout;

    // Pinning and gateway
    let (pinning, gateway): (Option<Arc<dyn PinningService>>, Arc<dyn ContentGateway>) =
        match config.pinning_backend {
            PinningBackend::Memory => {
                warn!("Using in-memory pin store; reports are lost on restart");
                let store = Arc::new(InMemoryPinStore::new());
                (
                    Some(store.clone() as Arc<dyn PinningService>),
                    store as Arc<dyn ContentGateway>,
                )
            }
            PinningBackend::Pinata => {
                let pinning = match PinataConfig::from_env(timeout) {
                    Some(pinata) => {
                        info!("Pinata configured at {}", pinata.api_url);
                        Some(Arc::new(PinataClient::new(pinata)?) as Arc<dyn PinningService>)
                    }
                    None => {
                        warn!(
                            "Pinata not configured (set PINATA_API_KEY and PINATA_API_SECRET); submissions and listings will fail"
                        );
                        None
                    }
                };
                let gateway = IpfsGateway::from_env(timeout)?;
                info!("IPFS gateway: {}", gateway.base_url());
                (pinning, Arc::new(gateway) as Arc<dyn ContentGateway>)
            }
        };

    // Payment ledger
    let (ledger, db_pool): (Arc<dyn PaymentLedger>, Option<PgPool>) = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to PostgreSQL...");
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(database_url)
                .await?;
            info!("Connected to PostgreSQL");

            if config.migrate_on_startup {
                info!("Running database migrations...");
                crate::migrations::run_postgres(&pool).await?;
                info!("Database migrations applied");
            } else {
                info!("DB migrations skipped (DB_MIGRATE_ON_STARTUP=0)");
            }
            (
                Arc::new(PgPaymentLedger::new(pool.clone())) as Arc<dyn PaymentLedger>,
                Some(pool),
            )
        }
        None => {
            warn!("DATABASE_URL not set; payment ledger is in-memory and lost on restart");
            (Arc::new(InMemoryPaymentLedger::new()) as Arc<dyn PaymentLedger>, None)
        }
    };

    // Optional providers
    let media_checker = match ReplicateConfig::from_env(timeout) {
        Some(replicate) => {
            info!("Media authenticity checks enabled");
            Some(Arc::new(ReplicateChecker::new(replicate)?) as Arc<dyn MediaAuthenticityChecker>)
        }
        None => {
            info!("Media authenticity checks disabled (set REPLICATE_API_TOKEN to enable)");
            None
        }
    };

    let verifier = match WorldIdConfig::from_env(timeout) {
        Some(world_id) => {
            info!("Proof verification enabled for app {}", world_id.app_id);
            Some(Arc::new(WorldIdVerifier::new(world_id)?) as Arc<dyn ProofVerifier>)
        }
        None => {
            info!("Proof verification disabled (set WLD_APP_ID and WLD_API_KEY to enable)");
            None
        }
    };

    let geocoder = match GeocoderConfig::from_env(timeout) {
        Some(geo) => {
            info!("Geocoding enabled via {}", geo.base_url);
            Some(Arc::new(NominatimGeocoder::new(geo)?) as Arc<dyn Geocoder>)
        }
        None => None,
    };

    // Services
    let mut submission = SubmissionService::new(
        pinning.clone(),
        metrics.clone(),
        config.project_tag.clone(),
    )
    .with_retry(RetryConfig::uploads(config.upload_max_retries));
    if let Some(geocoder) = geocoder {
        submission = submission.with_geocoder(geocoder);
    }

    let directory = IncidentDirectory::new(
        pinning,
        gateway,
        metrics.clone(),
        config.project_tag.clone(),
    )
    .with_concurrency(config.fetch_concurrency);

    let state = AppState {
        submission: Arc::new(submission),
        directory: Arc::new(directory),
        access: Arc::new(PremiumAccessService::new(ledger, metrics.clone())),
        classifier: Arc::new(NaiveBayesClassifier::default()),
        media_checker,
        verifier,
        metrics,
        db_pool,
    };

    let app = build_router(config.max_upload_bytes)?.with_state(state);

    info!("Starting HTTP server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    info!("Incident relay is ready to accept connections");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Incident relay stopped");
    Ok(())
}

/// Full router: `/api` routes plus health, readiness and metrics.
pub fn build_router(max_upload_bytes: usize) -> anyhow::Result<Router<AppState>> {
    let mut router = Router::new()
        .nest("/api", crate::api::router())
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_export))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http());

    if let Some(cors_layer) = cors_layer_from_env()? {
        router = router.layer(cors_layer);
    }

    Ok(router)
}

fn cors_layer_from_env() -> anyhow::Result<Option<CorsLayer>> {
    let origins = match std::env::var("CORS_ALLOW_ORIGINS") {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    let origins = origins.trim();
    if origins.is_empty() {
        return Ok(None);
    }

    let allow_origin = if origins == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {s:?}: {e}"))
            })
            .collect::<anyhow::Result<_>>()?;
        AllowOrigin::list(origins)
    };

    Ok(Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE]),
    ))
}

/// Completes on Ctrl+C or SIGTERM. A handler that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
