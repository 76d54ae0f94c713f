//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AppError, ConfigError, StoreError, TokenError, ValidationError};
pub use traits::{LedgerStore, LedgerTx, TokenMaker};
pub use types::{
    Account, AccountId, CreateAccountParams, CreateAccountRequest, CreateSessionParams,
    CreateUserParams, CreateUserRequest, Entry, ErrorDetail, ErrorResponse, HealthResponse,
    HealthStatus, ListAccountsParams, LoginUserRequest, LoginUserResponse,
    RenewAccessTokenRequest, RenewAccessTokenResponse, Role, Session, TOKEN_ISSUER, TokenPayload,
    Transfer, TransferOutcome, TransferRequest, UpdateAccountRequest, User, UserResponse,
    is_supported_currency, validate_currency,
};
