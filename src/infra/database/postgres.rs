//! PostgreSQL ledger store implementation.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, CreateAccountParams, CreateSessionParams, CreateUserParams, Entry,
    LedgerStore, LedgerTx, Role, Session, StoreError, Transfer, User,
};

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// PostgreSQL ledger store with connection pooling.
///
/// Row operations run directly on the pool; `begin` hands out a
/// [`PgLedgerTx`] scope whose writes commit or roll back as a unit.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store with custom pool configuration.
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, StoreError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a new store with default pool configuration.
    pub async fn with_defaults(database_url: &str) -> Result<Self, StoreError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    /// Run database migrations using sqlx migrate.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying connection pool (for testing).
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_account(row: &PgRow) -> Account {
        Account {
            id: row.get("id"),
            owner: row.get("owner"),
            balance: row.get("balance"),
            currency: row.get("currency"),
            created_at: row.get("created_at"),
        }
    }

    fn row_to_entry(row: &PgRow) -> Entry {
        Entry {
            id: row.get("id"),
            account_id: row.get("account_id"),
            amount: row.get("amount"),
            created_at: row.get("created_at"),
        }
    }

    fn row_to_transfer(row: &PgRow) -> Transfer {
        Transfer {
            id: row.get("id"),
            from_account_id: row.get("from_account_id"),
            to_account_id: row.get("to_account_id"),
            amount: row.get("amount"),
            created_at: row.get("created_at"),
        }
    }

    fn row_to_user(row: &PgRow) -> User {
        let role_str: String = row.get("role");
        User {
            username: row.get("username"),
            hashed_password: row.get("hashed_password"),
            full_name: row.get("full_name"),
            email: row.get("email"),
            role: role_str.parse().unwrap_or(Role::Depositor),
            password_changed_at: row.get("password_changed_at"),
            created_at: row.get("created_at"),
        }
    }

    fn row_to_session(row: &PgRow) -> Session {
        Session {
            id: row.get("id"),
            username: row.get("username"),
            refresh_token: row.get("refresh_token"),
            is_blocked: row.get("is_blocked"),
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
        }
    }
}

/// One open PostgreSQL transaction.
///
/// Wraps an owned `sqlx::Transaction`; if the scope is dropped without an
/// explicit commit, sqlx rolls the transaction back when the connection
/// returns to the pool.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn insert_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: i64,
    ) -> Result<Transfer, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount)
            VALUES ($1, $2, $3)
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(from_account_id)
        .bind(to_account_id)
        .bind(amount)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(PostgresStore::row_to_transfer(&row))
    }

    async fn insert_entry(
        &mut self,
        account_id: AccountId,
        amount: i64,
    ) -> Result<Entry, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO entries (account_id, amount)
            VALUES ($1, $2)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(PostgresStore::row_to_entry(&row))
    }

    async fn add_account_balance(
        &mut self,
        account_id: AccountId,
        delta: i64,
    ) -> Result<Account, StoreError> {
        // Arithmetic update, not read-then-write; the row lock taken here
        // is held until the surrounding transaction ends.
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance + $1
            WHERE id = $2
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(delta)
        .bind(account_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(PostgresStore::row_to_account(&row))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(StoreError::from)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(StoreError::from)
    }
}

#[async_trait]
impl LedgerStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self, params), fields(owner = %params.owner))]
    async fn create_account(&self, params: &CreateAccountParams) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO accounts (owner, balance, currency)
            VALUES ($1, 0, $2)
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(&params.owner)
        .bind(&params.currency)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::row_to_account(&row))
    }

    #[instrument(skip(self))]
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::row_to_account))
    }

    #[instrument(skip(self))]
    async fn list_accounts(&self, limit: i64, offset: i64) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_account).collect())
    }

    #[instrument(skip(self))]
    async fn update_account_balance(
        &self,
        id: AccountId,
        balance: i64,
    ) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = $2
            WHERE id = $1
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(id)
        .bind(balance)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::row_to_account(&row))
    }

    #[instrument(skip(self))]
    async fn delete_account(&self, id: AccountId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_entries(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Entry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE account_id = $1
            ORDER BY id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_entry).collect())
    }

    #[instrument(skip(self, params), fields(username = %params.username))]
    async fn create_user(&self, params: &CreateUserParams) -> Result<User, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (username, hashed_password, full_name, email, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING username, hashed_password, full_name, email, role,
                      password_changed_at, created_at
            "#,
        )
        .bind(&params.username)
        .bind(&params.hashed_password)
        .bind(&params.full_name)
        .bind(&params.email)
        .bind(params.role.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::row_to_user(&row))
    }

    #[instrument(skip(self))]
    async fn get_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT username, hashed_password, full_name, email, role,
                   password_changed_at, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::row_to_user))
    }

    #[instrument(skip(self, params))]
    async fn create_session(&self, params: &CreateSessionParams) -> Result<Session, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO sessions (id, username, refresh_token, is_blocked, expires_at)
            VALUES ($1, $2, $3, false, $4)
            RETURNING id, username, refresh_token, is_blocked, expires_at, created_at
            "#,
        )
        .bind(params.id)
        .bind(&params.username)
        .bind(&params.refresh_token)
        .bind(params.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::row_to_session(&row))
    }

    #[instrument(skip(self))]
    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, refresh_token, is_blocked, expires_at, created_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::row_to_session))
    }
}
