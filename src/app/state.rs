//! Application state management.
//!
//! Shared state accessible to all request handlers via Axum's State
//! extractor.

use std::sync::Arc;

use crate::domain::{LedgerStore, TokenMaker};
use crate::infra::observability::PrometheusHandle;

use super::service::{BankService, TokenDurations};

/// Shared application state for the Axum web server.
///
/// All contained types are wrapped in `Arc` and implement `Send + Sync`,
/// making `AppState` safe to share across async tasks. Handlers see the
/// store and token maker only through their trait abstractions.
#[derive(Clone)]
pub struct AppState {
    /// The application service containing business logic.
    pub service: Arc<BankService>,

    /// Ledger store for persistence operations.
    pub store: Arc<dyn LedgerStore>,

    /// Token maker used by the auth middleware.
    pub token_maker: Arc<dyn TokenMaker>,

    /// Prometheus handle backing GET /metrics, when metrics are enabled.
    pub metrics: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    /// Creates a new `AppState`, wiring a `BankService` to the provided
    /// store and token maker.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        token_maker: Arc<dyn TokenMaker>,
        durations: TokenDurations,
    ) -> Self {
        let service = Arc::new(BankService::new(
            Arc::clone(&store),
            Arc::clone(&token_maker),
            durations,
        ));

        Self {
            service,
            store,
            token_maker,
            metrics: None,
        }
    }

    /// Attaches a Prometheus handle, enabling the /metrics endpoint.
    #[must_use]
    pub fn with_metrics(mut self, handle: Arc<PrometheusHandle>) -> Self {
        self.metrics = Some(handle);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::JwtMaker;
    use crate::test_utils::MockLedgerStore;
    use secrecy::SecretString;

    #[test]
    fn test_app_state_creation_and_clone() {
        let store = Arc::new(MockLedgerStore::new());
        let key = SecretString::from("0123456789abcdef0123456789abcdef");
        let token_maker = Arc::new(JwtMaker::new(&key).unwrap());

        let state = AppState::new(store, token_maker, TokenDurations::default());
        let cloned = state.clone();

        assert!(Arc::ptr_eq(&state.service, &cloned.service));
    }
}
