//! Infrastructure layer for the incident relay
//!
//! Contains trait definitions and implementations for:
//! - Pinning and gateway access (Pinata, in-memory)
//! - Provider adapters (World ID, Replicate, Nominatim)
//! - Local text classification
//! - Payment ledgers (PostgreSQL, in-memory)
//! - Submission, listing and premium access services

mod access;
mod classifier;
mod directory;
mod error;
mod geocoder;
pub mod http;
mod memory_ledger;
mod memory_pins;
mod pinata;
pub mod postgres;
mod replicate;
pub mod retry;
mod submission;
mod traits;
mod world_id;

pub use access::PremiumAccessService;
pub use classifier::{tokenize, NaiveBayesClassifier, SEED_CORPUS};
pub use directory::{IncidentDirectory, LoadedIncidents, DEFAULT_FETCH_CONCURRENCY};
pub use error::*;
pub use geocoder::{GeocoderConfig, NominatimGeocoder, DEFAULT_NOMINATIM_URL};
pub use memory_ledger::InMemoryPaymentLedger;
pub use memory_pins::InMemoryPinStore;
pub use pinata::{
    IpfsGateway, PinataClient, PinataConfig, DEFAULT_GATEWAY_URL, DEFAULT_PINATA_API_URL,
    PIN_LIST_PAGE_SIZE,
};
pub use postgres::PgPaymentLedger;
pub use replicate::{
    ReplicateChecker, ReplicateConfig, DEFAULT_IMAGE_MODEL_VERSION, DEFAULT_REPLICATE_API_URL,
    DEFAULT_VIDEO_MODEL_VERSION,
};
pub use retry::{Retry, RetryConfig};
pub use submission::{SubmissionReceipt, SubmissionService, DEFAULT_PROJECT_TAG};
pub use traits::*;
pub use world_id::{WorldIdConfig, WorldIdVerifier, DEFAULT_VERIFY_URL};
