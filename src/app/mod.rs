//! Application layer containing business logic and shared state.

pub mod service;
pub mod state;
pub mod transfer;

pub use service::{BankService, TokenDurations};
pub use state::AppState;
pub use transfer::TransferCoordinator;
