//! Application service layer.
//!
//! `BankService` orchestrates account, user and session operations around
//! the transfer engine. Every guard the engine itself does not perform
//! (positive amount, distinct accounts, account existence, currency match)
//! lives here, so transport handlers stay thin and the engine's contract
//! stays minimal.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::password_hash::rand_core::OsRng;
use argon2::Argon2;
use chrono::Duration;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{
    Account, AccountId, AppError, CreateAccountParams, CreateAccountRequest, CreateSessionParams,
    CreateUserParams, CreateUserRequest, Entry, HealthResponse, HealthStatus, LedgerStore,
    ListAccountsParams, LoginUserRequest, LoginUserResponse, RenewAccessTokenRequest,
    RenewAccessTokenResponse, Role, StoreError, TokenMaker, TransferOutcome, TransferRequest,
    UpdateAccountRequest, User, ValidationError,
};

use super::transfer::TransferCoordinator;

/// Token lifetimes handed to the service at construction.
#[derive(Debug, Clone)]
pub struct TokenDurations {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenDurations {
    fn default() -> Self {
        Self {
            access: Duration::minutes(15),
            refresh: Duration::hours(24),
        }
    }
}

/// Application service containing core business logic.
///
/// Holds trait abstractions for the ledger store and the token maker,
/// enabling dependency injection and testability.
pub struct BankService {
    store: Arc<dyn LedgerStore>,
    token_maker: Arc<dyn TokenMaker>,
    coordinator: TransferCoordinator,
    durations: TokenDurations,
}

impl BankService {
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        token_maker: Arc<dyn TokenMaker>,
        durations: TokenDurations,
    ) -> Self {
        let coordinator = TransferCoordinator::new(Arc::clone(&store));
        Self {
            store,
            token_maker,
            coordinator,
            durations,
        }
    }

    /// Creates an account with a zero starting balance.
    #[instrument(skip(self, request), fields(owner = %request.owner))]
    pub async fn create_account(
        &self,
        request: &CreateAccountRequest,
    ) -> Result<Account, AppError> {
        request.validate()?;

        let params = CreateAccountParams {
            owner: request.owner.clone(),
            currency: request.currency.clone(),
        };
        let account = self.store.create_account(&params).await?;
        info!(account_id = account.id, "account created");
        Ok(account)
    }

    #[instrument(skip(self))]
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>, AppError> {
        Ok(self.store.get_account(id).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_accounts(
        &self,
        params: &ListAccountsParams,
    ) -> Result<Vec<Account>, AppError> {
        params.validate()?;
        Ok(self
            .store
            .list_accounts(params.page_size, params.offset())
            .await?)
    }

    /// Overwrites an account balance. Administrative path, outside the
    /// ledger invariants; transfers never go through here.
    #[instrument(skip(self, request), fields(account_id = request.id))]
    pub async fn update_account_balance(
        &self,
        request: &UpdateAccountRequest,
    ) -> Result<Account, AppError> {
        request.validate()?;

        self.store
            .get_account(request.id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("account {}", request.id)))?;

        Ok(self
            .store
            .update_account_balance(request.id, request.balance)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_account(&self, id: AccountId) -> Result<bool, AppError> {
        Ok(self.store.delete_account(id).await?)
    }

    /// Lists the ledger entries recorded against one account, newest first.
    #[instrument(skip(self, params))]
    pub async fn list_entries(
        &self,
        account_id: AccountId,
        params: &ListAccountsParams,
    ) -> Result<Vec<Entry>, AppError> {
        params.validate()?;

        self.store
            .get_account(account_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("account {account_id}")))?;

        Ok(self
            .store
            .list_entries(account_id, params.page_size, params.offset())
            .await?)
    }

    /// Validates and executes one transfer.
    ///
    /// The request must name two distinct existing accounts that both hold
    /// the request currency; the amount must be positive. Sufficient funds
    /// are deliberately not checked, matching the engine's permissive
    /// contract.
    #[instrument(skip(self, request), fields(
        from = request.from_account_id,
        to = request.to_account_id,
        amount = request.amount,
    ))]
    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferOutcome, AppError> {
        request.validate()?;

        if request.from_account_id == request.to_account_id {
            return Err(AppError::Validation(ValidationError::InvalidField {
                field: "to_account_id".to_string(),
                message: "cannot transfer to the same account".to_string(),
            }));
        }

        self.valid_account(request.from_account_id, &request.currency)
            .await?;
        self.valid_account(request.to_account_id, &request.currency)
            .await?;

        let outcome = self
            .coordinator
            .transfer(request.from_account_id, request.to_account_id, request.amount)
            .await?;
        info!(transfer_id = outcome.transfer.id, "transfer committed");
        Ok(outcome)
    }

    /// Checks that an account exists and is denominated in `currency`.
    async fn valid_account(&self, id: AccountId, currency: &str) -> Result<Account, AppError> {
        let account = self
            .store
            .get_account(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;

        if account.currency != currency {
            return Err(AppError::Validation(ValidationError::InvalidField {
                field: "currency".to_string(),
                message: format!(
                    "account {id} holds {}, not {currency}",
                    account.currency
                ),
            }));
        }
        Ok(account)
    }

    /// Registers a new user with an argon2-hashed password.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<User, AppError> {
        request.validate()?;

        let hashed_password = hash_password(&request.password)?;
        let params = CreateUserParams {
            username: request.username.clone(),
            hashed_password,
            full_name: request.full_name.clone(),
            email: request.email.clone(),
            role: Role::Depositor,
        };
        let user = self.store.create_user(&params).await?;
        info!("user created");
        Ok(user)
    }

    /// Verifies credentials and issues an access and a refresh token,
    /// persisting the refresh token as a session.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login_user(
        &self,
        request: &LoginUserRequest,
    ) -> Result<LoginUserResponse, AppError> {
        request.validate()?;

        let user = self
            .store
            .get_user(&request.username)
            .await?
            .ok_or_else(|| {
                AppError::Authentication("incorrect username or password".to_string())
            })?;

        verify_password(&request.password, &user.hashed_password)?;

        let (access_token, access_payload) =
            self.token_maker
                .create_token(&user.username, user.role, self.durations.access)?;
        let (refresh_token, refresh_payload) =
            self.token_maker
                .create_token(&user.username, user.role, self.durations.refresh)?;

        let session = self
            .store
            .create_session(&CreateSessionParams {
                id: refresh_payload.id,
                username: user.username.clone(),
                refresh_token: refresh_token.clone(),
                expires_at: refresh_payload.expired_at,
            })
            .await?;

        Ok(LoginUserResponse {
            session_id: session.id,
            access_token,
            access_token_expires_at: access_payload.expired_at,
            refresh_token,
            refresh_token_expires_at: refresh_payload.expired_at,
            user: user.into(),
        })
    }

    /// Issues a fresh access token for a valid, unexpired session.
    #[instrument(skip(self, request))]
    pub async fn renew_access_token(
        &self,
        request: &RenewAccessTokenRequest,
    ) -> Result<RenewAccessTokenResponse, AppError> {
        request.validate()?;

        let refresh_payload = self.token_maker.verify_token(&request.refresh_token)?;

        let session = self
            .store
            .get_session(refresh_payload.id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("session {}", refresh_payload.id)))?;

        if session.is_blocked {
            return Err(AppError::Authentication("session is blocked".to_string()));
        }
        if session.username != refresh_payload.username {
            return Err(AppError::Authentication(
                "incorrect session user".to_string(),
            ));
        }
        if session.refresh_token != request.refresh_token {
            return Err(AppError::Authentication(
                "mismatched session token".to_string(),
            ));
        }
        if session.expires_at < chrono::Utc::now() {
            return Err(AppError::Authentication("session has expired".to_string()));
        }

        let (access_token, access_payload) = self.token_maker.create_token(
            &refresh_payload.username,
            refresh_payload.role,
            self.durations.access,
        )?;

        Ok(RenewAccessTokenResponse {
            access_token,
            access_token_expires_at: access_payload.expired_at,
        })
    }

    /// Performs a health check on the ledger store.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let database = match self.store.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = ?e, "store health check failed");
                HealthStatus::Unhealthy
            }
        };
        HealthResponse::new(database)
    }
}

/// Hashes a password with argon2id and a fresh random salt.
fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Verifies a password against a stored argon2 hash.
fn verify_password(password: &str, hashed: &str) -> Result<(), AppError> {
    let parsed = PasswordHash::new(hashed)
        .map_err(|e| AppError::Internal(format!("stored password hash is invalid: {e}")))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AppError::Authentication("incorrect username or password".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::JwtMaker;
    use crate::test_utils::MockLedgerStore;
    use secrecy::SecretString;

    fn test_service(store: Arc<MockLedgerStore>) -> BankService {
        let key = SecretString::from("0123456789abcdef0123456789abcdef");
        let token_maker = Arc::new(JwtMaker::new(&key).unwrap());
        BankService::new(store, token_maker, TokenDurations::default())
    }

    fn user_request(username: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            password: "secret123".to_string(),
            full_name: "Test User".to_string(),
            email: format!("{username}@example.com"),
        }
    }

    #[tokio::test]
    async fn test_create_account_requires_valid_currency() {
        let store = Arc::new(MockLedgerStore::new());
        let service = test_service(store);

        let request = CreateAccountRequest {
            owner: "alice".to_string(),
            currency: "DOGE".to_string(),
        };
        let err = service.create_account(&request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_account_for_user() {
        let store = Arc::new(MockLedgerStore::new());
        let service = test_service(store.clone());

        service.create_user(&user_request("alice")).await.unwrap();

        let request = CreateAccountRequest {
            owner: "alice".to_string(),
            currency: "USD".to_string(),
        };
        let account = service.create_account(&request).await.unwrap();
        assert_eq!(account.balance, 0);
        assert_eq!(account.owner, "alice");
    }

    #[tokio::test]
    async fn test_transfer_rejects_same_account() {
        let store = Arc::new(MockLedgerStore::new());
        store.seed_account("alice", 100, "USD").await;
        let service = test_service(store);

        let request = TransferRequest {
            from_account_id: 1,
            to_account_id: 1,
            amount: 10,
            currency: "USD".to_string(),
        };
        let err = service.transfer(&request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_transfer_rejects_currency_mismatch() {
        let store = Arc::new(MockLedgerStore::new());
        store.seed_account("alice", 100, "USD").await;
        store.seed_account("bob", 50, "EUR").await;
        let service = test_service(store.clone());

        let request = TransferRequest {
            from_account_id: 1,
            to_account_id: 2,
            amount: 10,
            currency: "USD".to_string(),
        };
        let err = service.transfer(&request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Nothing was written.
        assert!(store.transfers().await.is_empty());
        assert_eq!(store.account(1).await.unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_transfer_rejects_missing_account() {
        let store = Arc::new(MockLedgerStore::new());
        store.seed_account("alice", 100, "USD").await;
        let service = test_service(store);

        let request = TransferRequest {
            from_account_id: 1,
            to_account_id: 42,
            amount: 10,
            currency: "USD".to_string(),
        };
        let err = service.transfer(&request).await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_transfer_happy_path() {
        let store = Arc::new(MockLedgerStore::new());
        store.seed_account("alice", 100, "USD").await;
        store.seed_account("bob", 50, "USD").await;
        let service = test_service(store.clone());

        let request = TransferRequest {
            from_account_id: 1,
            to_account_id: 2,
            amount: 30,
            currency: "USD".to_string(),
        };
        let outcome = service.transfer(&request).await.unwrap();
        assert_eq!(outcome.from_account.balance, 70);
        assert_eq!(outcome.to_account.balance, 80);
    }

    #[tokio::test]
    async fn test_login_issues_tokens_and_session() {
        let store = Arc::new(MockLedgerStore::new());
        let service = test_service(store.clone());

        service.create_user(&user_request("alice")).await.unwrap();

        let response = service
            .login_user(&LoginUserRequest {
                username: "alice".to_string(),
                password: "secret123".to_string(),
            })
            .await
            .unwrap();

        assert!(!response.access_token.is_empty());
        assert!(!response.refresh_token.is_empty());
        assert_ne!(response.access_token, response.refresh_token);
        assert_eq!(response.user.username, "alice");

        let session = store.get_session(response.session_id).await.unwrap();
        assert!(session.is_some());
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let store = Arc::new(MockLedgerStore::new());
        let service = test_service(store);

        service.create_user(&user_request("alice")).await.unwrap();

        let err = service
            .login_user(&LoginUserRequest {
                username: "alice".to_string(),
                password: "wrongpass".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_login_rejects_unknown_user() {
        let store = Arc::new(MockLedgerStore::new());
        let service = test_service(store);

        let err = service
            .login_user(&LoginUserRequest {
                username: "nobody".to_string(),
                password: "secret123".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_renew_access_token() {
        let store = Arc::new(MockLedgerStore::new());
        let service = test_service(store);

        service.create_user(&user_request("alice")).await.unwrap();
        let login = service
            .login_user(&LoginUserRequest {
                username: "alice".to_string(),
                password: "secret123".to_string(),
            })
            .await
            .unwrap();

        let renewed = service
            .renew_access_token(&RenewAccessTokenRequest {
                refresh_token: login.refresh_token,
            })
            .await
            .unwrap();
        assert!(!renewed.access_token.is_empty());
    }

    #[tokio::test]
    async fn test_renew_rejects_access_token_without_session() {
        let store = Arc::new(MockLedgerStore::new());
        let service = test_service(store);

        service.create_user(&user_request("alice")).await.unwrap();
        let login = service
            .login_user(&LoginUserRequest {
                username: "alice".to_string(),
                password: "secret123".to_string(),
            })
            .await
            .unwrap();

        // Access tokens have no session row, so renewal must fail.
        let err = service
            .renew_access_token(&RenewAccessTokenRequest {
                refresh_token: login.access_token,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_account_balance_checks_existence() {
        let store = Arc::new(MockLedgerStore::new());
        let service = test_service(store);

        let err = service
            .update_account_balance(&UpdateAccountRequest { id: 9, balance: 10 })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_health_check_reports_store_state() {
        let store = Arc::new(MockLedgerStore::new());
        let service = test_service(store.clone());

        assert_eq!(service.health_check().await.status, HealthStatus::Healthy);

        store.set_healthy(false);
        assert_eq!(
            service.health_check().await.status,
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("secret123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secret123", &hash).is_ok());
        assert!(verify_password("other", &hash).is_err());
    }
}
