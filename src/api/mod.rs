//! API layer for the incident relay
//!
//! REST endpoints for report submission, listing, advisory analysis, proof
//! verification and the premium tier.

pub mod error;
pub mod handlers;
mod rest;
pub mod types;

pub use rest::*;
