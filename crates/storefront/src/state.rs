//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::oneentry::OneEntryBootstrap;
use crate::services::{AccountService, CheckoutOrchestrator, OneEntryCommerce, OrderService};
use crate::session::{SessionClient, SessionError, SessionTokenStore};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. It owns the single
/// process-wide backend session client (through the commerce services) and
/// the checkout orchestrator.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    accounts: Arc<dyn AccountService>,
    orders: Arc<dyn OrderService>,
    checkout: CheckoutOrchestrator,
}

impl AppState {
    /// Create the application state backed by OneEntry.
    ///
    /// No backend I/O happens here; the client bootstraps on first use.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if the backend endpoint is
    /// missing or invalid.
    pub fn new(config: StorefrontConfig) -> Result<Self, SessionError> {
        let sessions = SessionClient::new(
            &config.backend,
            OneEntryBootstrap::new(&config.backend),
            Arc::new(SessionTokenStore),
        )?;
        tracing::info!(endpoint = %sessions.endpoint(), "backend session client configured");

        let commerce = Arc::new(OneEntryCommerce::new(Arc::new(sessions)));
        Ok(Self::with_services(config, commerce.clone(), commerce))
    }

    /// Create the application state over the given collaborators.
    #[must_use]
    pub fn with_services(
        config: StorefrontConfig,
        accounts: Arc<dyn AccountService>,
        orders: Arc<dyn OrderService>,
    ) -> Self {
        let checkout = CheckoutOrchestrator::new(
            Arc::clone(&accounts),
            Arc::clone(&orders),
            config.checkout.clone(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                accounts,
                orders,
                checkout,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Session query and sign-in.
    #[must_use]
    pub fn accounts(&self) -> &dyn AccountService {
        self.inner.accounts.as_ref()
    }

    /// Order history.
    #[must_use]
    pub fn orders(&self) -> &dyn OrderService {
        self.inner.orders.as_ref()
    }

    /// Checkout orchestration.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutOrchestrator {
        &self.inner.checkout
    }
}
