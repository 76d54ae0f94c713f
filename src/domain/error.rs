//! Application error types with proper error chaining.
//!
//! `StoreError` is the normalized taxonomy the ledger engine sees; driver
//! error codes are translated once, in the `From<sqlx::Error>` impl, so no
//! other layer inspects store-specific representations.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The store is unreachable. Transient; retry policy is the caller's.
    #[error("connection failed: {0}")]
    Connection(String),
    /// No pooled connection became available in time. Transient.
    #[error("pool exhausted: {0}")]
    PoolExhausted(String),
    /// A referenced row does not exist (foreign key violation).
    #[error("referenced record does not exist: {0}")]
    ForeignKey(String),
    /// A uniqueness constraint was violated.
    #[error("duplicate record: {0}")]
    Duplicate(String),
    #[error("record not found: {0}")]
    NotFound(String),
    /// Any other store-reported failure.
    #[error("query failed: {0}")]
    Query(String),
    #[error("migration failed: {0}")]
    Migration(String),
    /// A unit of work failed and the rollback attempt failed too. Both
    /// errors are preserved; neither is ever silently dropped.
    #[error("{cause}; rollback also failed: {rollback}")]
    RollbackFailed {
        cause: Box<StoreError>,
        rollback: String,
    },
}

impl StoreError {
    /// True for failures that may succeed on retry (the engine itself
    /// never retries).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::PoolExhausted(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted("pool timed out".to_string()),
            sqlx::Error::PoolClosed => StoreError::Connection("pool closed".to_string()),
            sqlx::Error::Io(io_err) => StoreError::Connection(io_err.to_string()),
            sqlx::Error::Tls(tls_err) => StoreError::Connection(tls_err.to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23503") => StoreError::ForeignKey(db_err.message().to_string()),
                Some("23505") => StoreError::Duplicate(db_err.message().to_string()),
                _ => StoreError::Query(db_err.message().to_string()),
            },
            _ => StoreError::Query(err.to_string()),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is not valid")]
    Invalid,
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },
    #[error("Validation failed: {0}")]
    Multiple(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Authorization denied: {0}")]
    Authorization(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(ValidationError::Multiple(err.to_string()))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Store(StoreError::Migration(err.to_string()))
    }
}
