//! Test utilities and mock implementations.
//!
//! This module provides a reusable in-memory ledger store with staged
//! transactions and failure injection for unit and integration tests.

pub mod mocks;

pub use mocks::{MockConfig, MockLedgerStore};
