//! Infrastructure layer implementations.

pub mod database;
pub mod observability;
pub mod token;

pub use database::{PostgresConfig, PostgresStore};
pub use observability::{init_metrics, init_metrics_handle, init_tracing};
pub use token::JwtMaker;
