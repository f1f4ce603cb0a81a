//! PostgreSQL implementations
//!
//! Provides the durable payment ledger used when `DATABASE_URL` is set.

mod payment_ledger;

pub use payment_ledger::*;
