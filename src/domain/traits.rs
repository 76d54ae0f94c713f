//! Domain traits defining contracts for external systems.

use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use super::error::{StoreError, TokenError};
use super::types::{
    Account, AccountId, CreateAccountParams, CreateSessionParams, CreateUserParams, Entry, Role,
    Session, TokenPayload, Transfer, User,
};

/// One open unit of work against the ledger store.
///
/// All writes issued through a scope become visible atomically on
/// [`commit`](LedgerTx::commit) and never otherwise. The scope carries
/// exactly the operations a transfer needs; ordering of the balance
/// updates is the caller's responsibility (see `TransferCoordinator`).
#[async_trait]
pub trait LedgerTx: Send {
    /// Insert the transfer record for an in-flight transfer.
    async fn insert_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: i64,
    ) -> Result<Transfer, StoreError>;

    /// Append one signed ledger entry. Pure insert, no read step.
    async fn insert_entry(
        &mut self,
        account_id: AccountId,
        amount: i64,
    ) -> Result<Entry, StoreError>;

    /// Apply `delta` to an account balance as an atomic arithmetic update
    /// (never read-then-write) and return the post-update account.
    async fn add_account_balance(
        &mut self,
        account_id: AccountId,
        delta: i64,
    ) -> Result<Account, StoreError>;

    /// Make every write in this scope visible, or fail leaving none visible.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard every write in this scope.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Ledger persistence operations.
///
/// Row operations outside [`begin`](LedgerStore::begin) run in their own
/// implicit transactions; everything participating in a transfer must go
/// through a [`LedgerTx`] scope instead.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a unit of work.
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError>;

    /// Check store connectivity.
    async fn health_check(&self) -> Result<(), StoreError>;

    async fn create_account(&self, params: &CreateAccountParams) -> Result<Account, StoreError>;

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn list_accounts(&self, limit: i64, offset: i64) -> Result<Vec<Account>, StoreError>;

    /// Overwrite an account's balance. Administrative path only; transfers
    /// go through [`LedgerTx::add_account_balance`].
    async fn update_account_balance(
        &self,
        id: AccountId,
        balance: i64,
    ) -> Result<Account, StoreError>;

    async fn delete_account(&self, id: AccountId) -> Result<bool, StoreError>;

    /// List entries recorded against one account, newest first.
    async fn list_entries(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Entry>, StoreError>;

    async fn create_user(&self, params: &CreateUserParams) -> Result<User, StoreError>;

    async fn get_user(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn create_session(&self, params: &CreateSessionParams) -> Result<Session, StoreError>;

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, StoreError>;
}

/// Issues and verifies bearer tokens.
pub trait TokenMaker: Send + Sync {
    /// Create a token for `username` valid for `duration`. Returns the
    /// serialized token together with its payload.
    fn create_token(
        &self,
        username: &str,
        role: Role,
        duration: Duration,
    ) -> Result<(String, TokenPayload), TokenError>;

    /// Verify a token's signature and expiry and return its payload.
    fn verify_token(&self, token: &str) -> Result<TokenPayload, TokenError>;
}
