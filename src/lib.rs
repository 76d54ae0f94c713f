//! minibank
//!
//! A small double-entry ledger service: accounts, immutable entries, and
//! atomic money transfers over PostgreSQL.
//!
//! # Architecture Overview
//!
//! This crate is organized into four main layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   API Layer                  │
//! │  HTTP handlers, routing, request validation  │
//! ├─────────────────────────────────────────────┤
//! │               Application Layer              │
//! │  BankService, TransferCoordinator, AppState  │
//! ├─────────────────────────────────────────────┤
//! │                 Domain Layer                 │
//! │   Traits, types, errors (no dependencies)    │
//! ├─────────────────────────────────────────────┤
//! │             Infrastructure Layer             │
//! │   PostgreSQL store, JWT maker, telemetry     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The heart of the crate is [`app::TransferCoordinator`]: it moves funds
//! between two accounts as a single unit of work, writing one transfer
//! record, two ledger entries and two balance updates that commit or roll
//! back together. Balance rows are always locked in ascending account-id
//! order so concurrent transfers over the same pair of accounts cannot
//! deadlock.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use minibank::api::create_router;
//! use minibank::app::{AppState, TokenDurations};
//! use minibank::infra::{JwtMaker, PostgresStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(PostgresStore::with_defaults(&database_url).await?);
//!     let token_maker = Arc::new(JwtMaker::new(&token_key)?);
//!
//!     let state = Arc::new(AppState::new(store, token_maker, TokenDurations::default()));
//!
//!     let router = create_router(state);
//!     axum::serve(listener, router).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod infra;

// In-memory store with staged transactions, shared by unit and
// integration tests.
pub mod test_utils;
