//! Incident Relay Library
//!
//! Backend for citizen incident reporting: reports are validated, pinned to
//! IPFS through a pinning provider and read back through a public gateway. A
//! wallet-based premium tier unlocks aggregate analytics.
//!
//! ## Modules
//!
//! - [`domain`] - Core domain types (reports, pin metadata, payments, analytics)
//! - [`infra`] - Provider adapters, payment ledgers and services
//! - [`metrics`] - Observability and metrics
//! - [`telemetry`] - Logging setup
//! - [`api`] - REST API routes
//! - [`server`] - Configuration and HTTP server bootstrap

pub mod api;
pub mod domain;
pub mod infra;
pub mod metrics;
pub mod migrations;
pub mod server;
pub mod telemetry;

// Re-export commonly used types
pub use domain::{
    AnalyticsReport, ContentAddress, IncidentDraft, IncidentReport, IncidentType, PaymentRecord,
    PremiumAccess, Severity, WalletAddress,
};

pub use infra::{
    IncidentDirectory, PaymentLedger, PinningService, PremiumAccessService, RelayError, Result,
    SubmissionService,
};
