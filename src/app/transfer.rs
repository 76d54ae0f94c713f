//! The transfer engine: moves funds between two accounts as one unit of work.
//!
//! A transfer writes five rows: one transfer record, one entry per account,
//! and two balance updates. The coordinator is the only component that knows
//! about transaction boundaries and about the balance-update ordering; the
//! entry and balance operations themselves are plain scope operations.

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::domain::{AccountId, LedgerStore, LedgerTx, StoreError, TransferOutcome};

/// Orchestrates one complete transfer against an injected ledger store.
///
/// The coordinator performs no business validation: amounts are applied as
/// given and balances may go negative. Guards (positive amount, distinct
/// accounts, currency match) belong to the calling service.
pub struct TransferCoordinator {
    store: Arc<dyn LedgerStore>,
}

impl TransferCoordinator {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Move `amount` from `from_account_id` to `to_account_id`.
    ///
    /// Either all five writes commit together or none become visible. On
    /// failure the unit of work is rolled back; if the rollback itself
    /// fails, both errors are surfaced via [`StoreError::RollbackFailed`].
    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: i64,
    ) -> Result<TransferOutcome, StoreError> {
        let mut tx = self.store.begin().await?;

        match Self::apply(tx.as_mut(), from_account_id, to_account_id, amount).await {
            Ok(outcome) => {
                tx.commit().await?;
                metrics::counter!("minibank_transfers_committed_total").increment(1);
                Ok(outcome)
            }
            Err(cause) => {
                metrics::counter!("minibank_transfers_aborted_total").increment(1);
                match tx.rollback().await {
                    Ok(()) => Err(cause),
                    Err(rollback_err) => {
                        warn!(
                            cause = %cause,
                            rollback = %rollback_err,
                            "rollback failed after aborted transfer"
                        );
                        Err(StoreError::RollbackFailed {
                            cause: Box::new(cause),
                            rollback: rollback_err.to_string(),
                        })
                    }
                }
            }
        }
    }

    /// The five writes of a transfer, issued through an open scope.
    async fn apply(
        tx: &mut dyn LedgerTx,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: i64,
    ) -> Result<TransferOutcome, StoreError> {
        let transfer = tx
            .insert_transfer(from_account_id, to_account_id, amount)
            .await?;

        let from_entry = tx.insert_entry(from_account_id, -amount).await?;
        let to_entry = tx.insert_entry(to_account_id, amount).await?;

        // Balance rows are always locked in ascending account-id order,
        // regardless of transfer direction. Two concurrent transfers over
        // the same pair therefore request row locks in the same relative
        // order and cannot wait on each other in a cycle.
        let (from_account, to_account) = if from_account_id < to_account_id {
            let from = tx.add_account_balance(from_account_id, -amount).await?;
            let to = tx.add_account_balance(to_account_id, amount).await?;
            (from, to)
        } else {
            let to = tx.add_account_balance(to_account_id, amount).await?;
            let from = tx.add_account_balance(from_account_id, -amount).await?;
            (from, to)
        };

        Ok(TransferOutcome {
            transfer,
            from_account,
            to_account,
            from_entry,
            to_entry,
        })
    }
}
