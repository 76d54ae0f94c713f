//! Concrete ledger store implementations.
//!
//! This module contains the production database adapter that implements
//! the `LedgerStore` trait defined in the domain layer.

pub mod postgres;

pub use postgres::{PostgresConfig, PostgresStore};
