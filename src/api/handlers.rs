//! HTTP request handlers and error-to-status mapping.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use crate::app::AppState;
use crate::domain::{
    Account, AccountId, AppError, CreateAccountRequest, CreateUserRequest, Entry, ErrorDetail,
    ErrorResponse, HealthResponse, HealthStatus, ListAccountsParams, LoginUserRequest,
    LoginUserResponse, RenewAccessTokenRequest, RenewAccessTokenResponse, StoreError, TokenError,
    TransferOutcome, TransferRequest, UpdateAccountRequest, UserResponse,
};

/// Create a new account
pub async fn create_account_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = state.service.create_account(&payload).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Get a single account by ID
pub async fn get_account_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<AccountId>,
) -> Result<Json<Account>, AppError> {
    let account = state
        .service
        .get_account(id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;
    Ok(Json(account))
}

/// List accounts with page-based pagination
pub async fn list_accounts_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListAccountsParams>,
) -> Result<Json<Vec<Account>>, AppError> {
    let accounts = state.service.list_accounts(&params).await?;
    Ok(Json(accounts))
}

/// Overwrite an account balance (administrative)
pub async fn update_account_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateAccountRequest>,
) -> Result<Json<Account>, AppError> {
    let account = state.service.update_account_balance(&payload).await?;
    Ok(Json(account))
}

/// List the ledger entries recorded against one account
pub async fn list_entries_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<AccountId>,
    Query(params): Query<ListAccountsParams>,
) -> Result<Json<Vec<Entry>>, AppError> {
    let entries = state.service.list_entries(id, &params).await?;
    Ok(Json(entries))
}

/// Delete an account without ledger history
pub async fn delete_account_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<AccountId>,
) -> Result<StatusCode, AppError> {
    if state.service.delete_account(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Store(StoreError::NotFound(format!(
            "account {id}"
        ))))
    }
}

/// Execute a transfer between two accounts
pub async fn create_transfer_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TransferRequest>,
) -> Result<Json<TransferOutcome>, AppError> {
    let outcome = state.service.transfer(&payload).await?;
    Ok(Json(outcome))
}

/// Register a new user
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.service.create_user(&payload).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Log in and receive access and refresh tokens
pub async fn login_user_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginUserRequest>,
) -> Result<Json<LoginUserResponse>, AppError> {
    let response = state.service.login_user(&payload).await?;
    Ok(Json(response))
}

/// Renew an access token from a refresh token
pub async fn renew_access_token_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RenewAccessTokenRequest>,
) -> Result<Json<RenewAccessTokenResponse>, AppError> {
    let response = state.service.renew_access_token(&payload).await?;
    Ok(Json(response))
}

/// Detailed health check
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.service.health_check().await;
    Json(health)
}

/// Kubernetes liveness probe
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    let health = state.service.health_check().await;
    match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus scrape endpoint
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_type) = match &self {
            AppError::Store(store_err) => match store_err {
                StoreError::Connection(_) | StoreError::PoolExhausted(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
                }
                StoreError::ForeignKey(_) => (StatusCode::FORBIDDEN, "foreign_key_violation"),
                StoreError::Duplicate(_) => (StatusCode::FORBIDDEN, "unique_violation"),
                StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            },
            AppError::Token(token_err) => match token_err {
                TokenError::Expired | TokenError::Invalid => {
                    (StatusCode::UNAUTHORIZED, "token_error")
                }
                TokenError::InvalidKey(_) => (StatusCode::INTERNAL_SERVER_ERROR, "token_error"),
            },
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, "authentication_error"),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, "authorization_error"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            AppError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error")
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let message = self.to_string();
        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: error_type.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}
