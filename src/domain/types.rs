use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Store-assigned identifier for accounts.
pub type AccountId = i64;

/// Currencies an account may be denominated in.
pub const SUPPORTED_CURRENCIES: [&str; 3] = ["USD", "EUR", "CAD"];

/// Returns true if `currency` is one of the supported ISO-like codes.
#[must_use]
pub fn is_supported_currency(currency: &str) -> bool {
    SUPPORTED_CURRENCIES.contains(&currency)
}

/// Custom validator hook for request fields carrying a currency code.
pub fn validate_currency(currency: &str) -> Result<(), validator::ValidationError> {
    if is_supported_currency(currency) {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("currency");
        err.message = Some("unsupported currency".into());
        Err(err)
    }
}

/// Role attached to a user and carried in issued tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Depositor,
    Banker,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Depositor => "depositor",
            Role::Banker => "banker",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "depositor" => Ok(Role::Depositor),
            "banker" => Ok(Role::Banker),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A bank account. `balance` is in minor currency units and is mutated
/// only through the transfer engine's atomic increments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    pub balance: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// An immutable signed record of value movement against one account.
/// Negative amounts are debits, positive amounts are credits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    pub id: i64,
    pub account_id: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// An immutable record of one committed transfer. `amount` is the positive
/// magnitude moved from `from_account_id` to `to_account_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Everything written by one committed transfer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferOutcome {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// A registered user. The password hash never leaves the process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub username: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A refresh-token session created at login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub username: String,
    pub refresh_token: String,
    pub is_blocked: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Store-level parameters for creating an account. New accounts start at
/// balance zero; the currency is immutable afterwards.
#[derive(Debug, Clone)]
pub struct CreateAccountParams {
    pub owner: String,
    pub currency: String,
}

/// Store-level parameters for creating a user.
#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

/// Store-level parameters for creating a session row.
#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub id: Uuid,
    pub username: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Request payload for `POST /accounts`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, max = 64))]
    pub owner: String,
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
}

/// Request payload for `PUT /accounts`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    #[validate(range(min = 1))]
    pub id: AccountId,
    pub balance: i64,
}

/// Query parameters for `GET /accounts`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ListAccountsParams {
    #[validate(range(min = 1))]
    pub page_id: i64,
    #[validate(range(min = 5, max = 20))]
    pub page_size: i64,
}

impl ListAccountsParams {
    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page_id - 1) * self.page_size
    }
}

/// Request payload for `POST /transfers`.
///
/// Distinctness of the two accounts and the currency match against both
/// accounts are checked by the service, not here.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransferRequest {
    #[validate(range(min = 1))]
    pub from_account_id: AccountId,
    #[validate(range(min = 1))]
    pub to_account_id: AccountId,
    #[validate(range(min = 1))]
    pub amount: i64,
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
}

/// Request payload for `POST /users`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 128))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
}

/// Public projection of a user, safe to serialize in responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserResponse {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            role: user.role,
            password_changed_at: user.password_changed_at,
            created_at: user.created_at,
        }
    }
}

/// Request payload for `POST /users/login`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginUserRequest {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

/// Response payload for `POST /users/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginUserResponse {
    pub session_id: Uuid,
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

/// Request payload for `POST /tokens/renew_access`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RenewAccessTokenRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// Response payload for `POST /tokens/renew_access`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewAccessTokenResponse {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
}

/// Token issuer claim stamped into every token.
pub const TOKEN_ISSUER: &str = "minibank";

/// Verified contents of an access or refresh token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPayload {
    pub id: Uuid,
    pub issuer: String,
    pub username: String,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl TokenPayload {
    #[must_use]
    pub fn new(username: String, role: Role, duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            issuer: TOKEN_ISSUER.to_string(),
            username,
            role,
            issued_at: now,
            expired_at: now + duration,
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired_at < Utc::now()
    }
}

/// Health check status for services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health check response for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub database: HealthStatus,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    #[must_use]
    pub fn new(database: HealthStatus) -> Self {
        Self {
            status: database.clone(),
            database,
            timestamp: Utc::now(),
        }
    }
}

/// Error payload returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub r#type: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_currencies() {
        assert!(is_supported_currency("USD"));
        assert!(is_supported_currency("EUR"));
        assert!(is_supported_currency("CAD"));
        assert!(!is_supported_currency("GBP"));
        assert!(!is_supported_currency("usd"));
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!("depositor".parse::<Role>().unwrap(), Role::Depositor);
        assert_eq!("banker".parse::<Role>().unwrap(), Role::Banker);
        assert_eq!(Role::Banker.to_string(), "banker");
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_account_serialization() {
        let account = Account {
            id: 7,
            owner: "alice".to_string(),
            balance: 1_000,
            currency: "USD".to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&account).unwrap();
        let deserialized: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(account, deserialized);
    }

    #[test]
    fn test_user_password_hash_not_serialized() {
        let user = User {
            username: "bob".to_string(),
            hashed_password: "$argon2id$secret".to_string(),
            full_name: "Bob".to_string(),
            email: "bob@example.com".to_string(),
            role: Role::Depositor,
            password_changed_at: Utc::now(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("hashed_password"));
    }

    #[test]
    fn test_transfer_request_validation() {
        let valid = TransferRequest {
            from_account_id: 1,
            to_account_id: 2,
            amount: 10,
            currency: "USD".to_string(),
        };
        assert!(valid.validate().is_ok());

        let zero_amount = TransferRequest {
            amount: 0,
            ..valid.clone()
        };
        assert!(zero_amount.validate().is_err());

        let negative_amount = TransferRequest {
            amount: -5,
            ..valid.clone()
        };
        assert!(negative_amount.validate().is_err());

        let bad_currency = TransferRequest {
            currency: "XAU".to_string(),
            ..valid
        };
        assert!(bad_currency.validate().is_err());
    }

    #[test]
    fn test_list_accounts_params() {
        let params = ListAccountsParams {
            page_id: 3,
            page_size: 10,
        };
        assert!(params.validate().is_ok());
        assert_eq!(params.offset(), 20);

        let bad = ListAccountsParams {
            page_id: 0,
            page_size: 50,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_token_payload_expiry() {
        let live = TokenPayload::new("alice".to_string(), Role::Depositor, Duration::minutes(15));
        assert!(!live.is_expired());
        assert_eq!(live.issuer, TOKEN_ISSUER);

        let dead = TokenPayload::new("alice".to_string(), Role::Depositor, Duration::minutes(-1));
        assert!(dead.is_expired());
    }

    #[test]
    fn test_create_user_request_validation() {
        let valid = CreateUserRequest {
            username: "carol".to_string(),
            password: "hunter22".to_string(),
            full_name: "Carol".to_string(),
            email: "carol@example.com".to_string(),
        };
        assert!(valid.validate().is_ok());

        let bad_email = CreateUserRequest {
            email: "not-an-email".to_string(),
            ..valid.clone()
        };
        assert!(bad_email.validate().is_err());

        let short_password = CreateUserRequest {
            password: "abc".to_string(),
            ..valid
        };
        assert!(short_password.validate().is_err());
    }

    #[test]
    fn test_health_response() {
        let healthy = HealthResponse::new(HealthStatus::Healthy);
        assert_eq!(healthy.status, HealthStatus::Healthy);

        let unhealthy = HealthResponse::new(HealthStatus::Unhealthy);
        assert_eq!(unhealthy.status, HealthStatus::Unhealthy);
    }
}
