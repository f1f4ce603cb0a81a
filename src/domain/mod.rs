//! Domain models for the incident relay
//!
//! Pure types for incident reports, provider analysis results, premium
//! payments and aggregate analytics. Nothing here performs I/O.

mod analysis;
mod analytics;
mod incident;
mod payment;
mod types;

pub use analysis::*;
pub use analytics::*;
pub use incident::*;
pub use payment::*;
pub use types::*;
