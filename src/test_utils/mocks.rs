//! Mock implementations for testing.
//!
//! `MockLedgerStore` is an in-memory implementation of the store traits
//! with real transaction semantics: a scope opened with `begin` works on a
//! staged copy of the ledger and publishes it atomically on commit, so
//! atomicity and conservation properties can be exercised without a
//! database. Failure injection covers begin, every transactional write,
//! commit, and rollback.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, CreateAccountParams, CreateSessionParams, CreateUserParams, Entry,
    LedgerStore, LedgerTx, Session, StoreError, Transfer, User,
};

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// If true, every non-transactional operation fails.
    pub should_fail: bool,
    /// If true, `begin` fails.
    pub fail_begin: bool,
    /// If true, `commit` fails.
    pub fail_commit: bool,
    /// If true, `rollback` fails.
    pub fail_rollback: bool,
    /// Zero-based index of the transactional write that should fail.
    /// A transfer issues five writes: transfer row, two entries, two
    /// balance updates.
    pub fail_on_write: Option<u32>,
    /// Custom error message for injected failures.
    pub error_message: Option<String>,
}

impl MockConfig {
    /// Creates a config that always succeeds.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Creates a config that fails every non-transactional operation.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Creates a config whose `step`-th transactional write fails.
    #[must_use]
    pub fn failing_at_write(step: u32) -> Self {
        Self {
            fail_on_write: Some(step),
            ..Self::default()
        }
    }

    /// Creates a config whose `begin` fails.
    #[must_use]
    pub fn failing_begin() -> Self {
        Self {
            fail_begin: true,
            ..Self::default()
        }
    }

    /// Creates a config whose `commit` fails.
    #[must_use]
    pub fn failing_commit() -> Self {
        Self {
            fail_commit: true,
            ..Self::default()
        }
    }
}

/// In-memory ledger contents. Cloned wholesale on `begin` so a scope can
/// stage writes without touching the published state.
#[derive(Debug, Clone, Default)]
struct LedgerState {
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
    users: BTreeMap<String, User>,
    sessions: BTreeMap<Uuid, Session>,
    next_account_id: i64,
    next_entry_id: i64,
    next_transfer_id: i64,
}

impl LedgerState {
    fn alloc_account_id(&mut self) -> i64 {
        self.next_account_id += 1;
        self.next_account_id
    }

    fn alloc_entry_id(&mut self) -> i64 {
        self.next_entry_id += 1;
        self.next_entry_id
    }

    fn alloc_transfer_id(&mut self) -> i64 {
        self.next_transfer_id += 1;
        self.next_transfer_id
    }
}

/// Mock ledger store for testing.
///
/// # Example
///
/// ```
/// use minibank::test_utils::{MockLedgerStore, mocks::MockConfig};
///
/// // A store that succeeds
/// let store = MockLedgerStore::new();
///
/// // A store whose third transactional write fails
/// let failing = MockLedgerStore::with_config(MockConfig::failing_at_write(2));
/// ```
pub struct MockLedgerStore {
    state: Arc<Mutex<LedgerState>>,
    config: MockConfig,
    call_count: AtomicU64,
    is_healthy: AtomicBool,
    balance_update_log: Arc<StdMutex<Vec<AccountId>>>,
}

impl MockLedgerStore {
    /// Creates a new mock with default (success) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    /// Creates a new mock with the given configuration.
    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState::default())),
            config,
            call_count: AtomicU64::new(0),
            is_healthy: AtomicBool::new(true),
            balance_update_log: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    /// Creates a mock that fails every non-transactional operation.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Gets the number of times any store method was called.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Sets the health status.
    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Inserts an account directly, bypassing validation. Test seeding only.
    pub async fn seed_account(&self, owner: &str, balance: i64, currency: &str) -> Account {
        let mut state = self.state.lock().await;
        let id = state.alloc_account_id();
        let account = Account {
            id,
            owner: owner.to_string(),
            balance,
            currency: currency.to_string(),
            created_at: Utc::now(),
        };
        state.accounts.insert(id, account.clone());
        account
    }

    /// Reads one account from the published state.
    pub async fn account(&self, id: AccountId) -> Option<Account> {
        self.state.lock().await.accounts.get(&id).cloned()
    }

    /// All committed entries, oldest first.
    pub async fn entries(&self) -> Vec<Entry> {
        self.state.lock().await.entries.values().cloned().collect()
    }

    /// All committed transfers, oldest first.
    pub async fn transfers(&self) -> Vec<Transfer> {
        self.state
            .lock()
            .await
            .transfers
            .values()
            .cloned()
            .collect()
    }

    /// Account ids in the order their balances were updated, across every
    /// scope ever opened on this store.
    pub fn balance_update_order(&self) -> Vec<AccountId> {
        self.balance_update_log.lock().unwrap().clone()
    }

    pub fn clear_balance_update_order(&self) {
        self.balance_update_log.lock().unwrap().clear();
    }

    fn increment_call_count(&self) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
    }

    fn injected_message(&self) -> String {
        self.config
            .error_message
            .clone()
            .unwrap_or_else(|| "mock store error".to_string())
    }

    fn check_should_fail(&self) -> Result<(), StoreError> {
        if self.config.should_fail {
            return Err(StoreError::Query(self.injected_message()));
        }
        Ok(())
    }
}

impl Default for MockLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

/// One staged unit of work against a [`MockLedgerStore`].
///
/// Holds the store lock for its whole lifetime, so scopes serialize; the
/// staged state replaces the published state only on a successful commit.
struct MockLedgerTx {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
    fail_on_write: Option<u32>,
    fail_commit: bool,
    fail_rollback: bool,
    error_message: String,
    writes_done: u32,
    balance_update_log: Arc<StdMutex<Vec<AccountId>>>,
}

impl MockLedgerTx {
    fn check_write(&mut self) -> Result<(), StoreError> {
        if self.fail_on_write == Some(self.writes_done) {
            return Err(StoreError::Query(self.error_message.clone()));
        }
        self.writes_done += 1;
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for MockLedgerTx {
    async fn insert_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: i64,
    ) -> Result<Transfer, StoreError> {
        self.check_write()?;

        for id in [from_account_id, to_account_id] {
            if !self.working.accounts.contains_key(&id) {
                return Err(StoreError::ForeignKey(format!(
                    "transfers references missing account {id}"
                )));
            }
        }

        let id = self.working.alloc_transfer_id();
        let transfer = Transfer {
            id,
            from_account_id,
            to_account_id,
            amount,
            created_at: Utc::now(),
        };
        self.working.transfers.insert(id, transfer.clone());
        Ok(transfer)
    }

    async fn insert_entry(
        &mut self,
        account_id: AccountId,
        amount: i64,
    ) -> Result<Entry, StoreError> {
        self.check_write()?;

        if !self.working.accounts.contains_key(&account_id) {
            return Err(StoreError::ForeignKey(format!(
                "entries references missing account {account_id}"
            )));
        }

        let id = self.working.alloc_entry_id();
        let entry = Entry {
            id,
            account_id,
            amount,
            created_at: Utc::now(),
        };
        self.working.entries.insert(id, entry.clone());
        Ok(entry)
    }

    async fn add_account_balance(
        &mut self,
        account_id: AccountId,
        delta: i64,
    ) -> Result<Account, StoreError> {
        self.check_write()?;

        self.balance_update_log.lock().unwrap().push(account_id);

        let account = self
            .working
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| StoreError::NotFound(format!("account {account_id}")))?;
        account.balance += delta;
        Ok(account.clone())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.fail_commit {
            return Err(StoreError::Connection(self.error_message));
        }
        let mut guard = self.guard;
        *guard = self.working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        if self.fail_rollback {
            return Err(StoreError::Connection(self.error_message));
        }
        // Dropping the guard discards the staged state.
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MockLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        self.increment_call_count();

        if self.config.fail_begin {
            return Err(StoreError::Connection(self.injected_message()));
        }

        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MockLedgerTx {
            guard,
            working,
            fail_on_write: self.config.fail_on_write,
            fail_commit: self.config.fail_commit,
            fail_rollback: self.config.fail_rollback,
            error_message: self.injected_message(),
            writes_done: 0,
            balance_update_log: Arc::clone(&self.balance_update_log),
        }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.increment_call_count();

        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(StoreError::Connection("mock store unhealthy".to_string()));
        }

        self.check_should_fail()
    }

    async fn create_account(&self, params: &CreateAccountParams) -> Result<Account, StoreError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let mut state = self.state.lock().await;

        if !state.users.contains_key(&params.owner) {
            return Err(StoreError::ForeignKey(format!(
                "accounts references missing user {}",
                params.owner
            )));
        }
        if state
            .accounts
            .values()
            .any(|a| a.owner == params.owner && a.currency == params.currency)
        {
            return Err(StoreError::Duplicate(format!(
                "account for {} in {} already exists",
                params.owner, params.currency
            )));
        }

        let id = state.alloc_account_id();
        let account = Account {
            id,
            owner: params.owner.clone(),
            balance: 0,
            currency: params.currency.clone(),
            created_at: Utc::now(),
        };
        state.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.increment_call_count();
        self.check_should_fail()?;

        Ok(self.state.lock().await.accounts.get(&id).cloned())
    }

    async fn list_accounts(&self, limit: i64, offset: i64) -> Result<Vec<Account>, StoreError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let state = self.state.lock().await;
        Ok(state
            .accounts
            .values()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn update_account_balance(
        &self,
        id: AccountId,
        balance: i64,
    ) -> Result<Account, StoreError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let mut state = self.state.lock().await;
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;
        account.balance = balance;
        Ok(account.clone())
    }

    async fn delete_account(&self, id: AccountId) -> Result<bool, StoreError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let mut state = self.state.lock().await;

        let referenced = state.entries.values().any(|e| e.account_id == id)
            || state
                .transfers
                .values()
                .any(|t| t.from_account_id == id || t.to_account_id == id);
        if referenced {
            return Err(StoreError::ForeignKey(format!(
                "account {id} still has ledger history"
            )));
        }

        Ok(state.accounts.remove(&id).is_some())
    }

    async fn list_entries(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Entry>, StoreError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let state = self.state.lock().await;
        Ok(state
            .entries
            .values()
            .rev()
            .filter(|e| e.account_id == account_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn create_user(&self, params: &CreateUserParams) -> Result<User, StoreError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let mut state = self.state.lock().await;

        if state.users.contains_key(&params.username) {
            return Err(StoreError::Duplicate(format!(
                "username {} already exists",
                params.username
            )));
        }
        if state.users.values().any(|u| u.email == params.email) {
            return Err(StoreError::Duplicate(format!(
                "email {} already exists",
                params.email
            )));
        }

        let now = Utc::now();
        let user = User {
            username: params.username.clone(),
            hashed_password: params.hashed_password.clone(),
            full_name: params.full_name.clone(),
            email: params.email.clone(),
            role: params.role,
            password_changed_at: now,
            created_at: now,
        };
        state.users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.increment_call_count();
        self.check_should_fail()?;

        Ok(self.state.lock().await.users.get(username).cloned())
    }

    async fn create_session(&self, params: &CreateSessionParams) -> Result<Session, StoreError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let mut state = self.state.lock().await;
        let session = Session {
            id: params.id,
            username: params.username.clone(),
            refresh_token: params.refresh_token.clone(),
            is_blocked: false,
            expires_at: params.expires_at,
            created_at: Utc::now(),
        };
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        self.increment_call_count();
        self.check_should_fail()?;

        Ok(self.state.lock().await.sessions.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    fn user_params(username: &str) -> CreateUserParams {
        CreateUserParams {
            username: username.to_string(),
            hashed_password: "hash".to_string(),
            full_name: username.to_string(),
            email: format!("{username}@example.com"),
            role: Role::Depositor,
        }
    }

    #[tokio::test]
    async fn test_create_account_requires_user() {
        let store = MockLedgerStore::new();

        let params = CreateAccountParams {
            owner: "ghost".to_string(),
            currency: "USD".to_string(),
        };
        let err = store.create_account(&params).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey(_)));

        store.create_user(&user_params("ghost")).await.unwrap();
        let account = store.create_account(&params).await.unwrap();
        assert_eq!(account.balance, 0);
        assert_eq!(account.currency, "USD");
    }

    #[tokio::test]
    async fn test_duplicate_owner_currency_rejected() {
        let store = MockLedgerStore::new();
        store.create_user(&user_params("alice")).await.unwrap();

        let params = CreateAccountParams {
            owner: "alice".to_string(),
            currency: "USD".to_string(),
        };
        store.create_account(&params).await.unwrap();
        let err = store.create_account(&params).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_staged_writes_invisible_until_commit() {
        let store = Arc::new(MockLedgerStore::new());
        let account = store.seed_account("alice", 100, "USD").await;

        let mut tx = store.begin().await.unwrap();
        tx.add_account_balance(account.id, -40).await.unwrap();

        // Not yet committed; a fresh read via the tx-free helpers would
        // deadlock on the held lock, so check through the staged handle
        // and then through the store after rollback.
        tx.rollback().await.unwrap();
        assert_eq!(store.account(account.id).await.unwrap().balance, 100);

        let mut tx = store.begin().await.unwrap();
        tx.add_account_balance(account.id, -40).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.account(account.id).await.unwrap().balance, 60);
    }

    #[tokio::test]
    async fn test_delete_account_with_history_fails() {
        let store = Arc::new(MockLedgerStore::new());
        let a = store.seed_account("alice", 100, "USD").await;
        let b = store.seed_account("bob", 50, "USD").await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_transfer(a.id, b.id, 10).await.unwrap();
        tx.insert_entry(a.id, -10).await.unwrap();
        tx.commit().await.unwrap();

        let err = store.delete_account(a.id).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey(_)));
    }

    #[tokio::test]
    async fn test_failing_store() {
        let store = MockLedgerStore::failing("boom");
        let err = store.get_account(1).await.unwrap_err();
        assert!(matches!(err, StoreError::Query(msg) if msg == "boom"));
    }

    #[tokio::test]
    async fn test_list_entries_newest_first() {
        let store = Arc::new(MockLedgerStore::new());
        let a = store.seed_account("alice", 100, "USD").await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_entry(a.id, -1).await.unwrap();
        tx.insert_entry(a.id, -2).await.unwrap();
        tx.insert_entry(a.id, -3).await.unwrap();
        tx.commit().await.unwrap();

        let entries = store.list_entries(a.id, 2, 0).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].amount, -3);
        assert_eq!(entries[1].amount, -2);
    }

    #[tokio::test]
    async fn test_sessions_round_trip() {
        let store = MockLedgerStore::new();
        let id = Uuid::new_v4();
        let params = CreateSessionParams {
            id,
            username: "alice".to_string(),
            refresh_token: "tok".to_string(),
            expires_at: Utc::now() + chrono::Duration::days(1),
        };
        store.create_session(&params).await.unwrap();

        let session = store.get_session(id).await.unwrap().unwrap();
        assert_eq!(session.username, "alice");
        assert!(!session.is_blocked);

        assert!(store.get_session(Uuid::new_v4()).await.unwrap().is_none());
    }
}
