//! Process-wide, lazily bootstrapped backend client handle.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --get_client--> Initializing --ok--> Ready (for the process lifetime)
//!       ^                             |
//!       |                             +--err--> Failed
//!       +-------- next get_client ------------------+
//! ```
//!
//! Callers that arrive while a bootstrap is in flight await the same shared
//! future, so there is at most one bootstrap side effect at a time no matter
//! how many requests race. A failed attempt hands the same error to every
//! waiter and is retried by the next caller.

pub mod token_store;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use onstore_core::RefreshToken;
use secrecy::SecretString;
use thiserror::Error;
use tracing::Instrument;
use url::Url;

use crate::config::{BackendConfig, ConfigError};
use crate::oneentry::OneEntryError;

pub use token_store::{MemoryTokenStore, SessionTokenStore, TokenStore, TokenStoreError};

/// Transient failure while constructing the backend client.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The refresh credential could not be read.
    #[error("failed to read refresh credential: {0}")]
    Credential(#[from] TokenStoreError),

    /// The backend rejected or failed the bootstrap (e.g., credential exchange).
    #[error("backend bootstrap failed: {0}")]
    Backend(#[from] OneEntryError),
}

/// Errors surfaced by [`SessionClient`].
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Required configuration is missing or invalid. Not retryable.
    #[error("session client misconfigured: {0}")]
    Configuration(#[from] ConfigError),

    /// The bootstrap attempt failed. The next call retries.
    #[error("session bootstrap failed: {0}")]
    Bootstrap(Arc<BootstrapError>),
}

/// Auth settings handed to the backend client at bootstrap.
#[derive(Clone)]
pub struct AuthConfig {
    /// Refresh credential read from the token store, if any.
    pub refresh_token: Option<RefreshToken>,
    /// When set, the client never refreshes tokens on its own.
    pub custom_auth: bool,
    /// Where rotated refresh credentials are written.
    pub save: Arc<dyn TokenStore>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("refresh_token", &self.refresh_token)
            .field("custom_auth", &self.custom_auth)
            .finish_non_exhaustive()
    }
}

/// Everything a [`ClientBootstrap`] needs to construct a client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub endpoint: Url,
    pub access_token: Option<SecretString>,
    pub lang_code: String,
    pub auth: AuthConfig,
}

/// Constructs the backend client.
#[async_trait]
pub trait ClientBootstrap: Send + Sync + 'static {
    type Client: Send + Sync + 'static;

    /// Build a usable client from `options`.
    async fn bootstrap(&self, options: ClientOptions) -> Result<Self::Client, BootstrapError>;
}

/// Observable lifecycle phase of a [`SessionClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

type BootstrapOutcome<C> = Result<Arc<C>, Arc<BootstrapError>>;
type BootstrapFuture<C> = Shared<BoxFuture<'static, BootstrapOutcome<C>>>;

enum State<C> {
    Uninitialized,
    Initializing {
        attempt: u64,
        future: BootstrapFuture<C>,
    },
    Ready(Arc<C>),
    Failed {
        attempt: u64,
        error: Arc<BootstrapError>,
    },
}

struct Inner<C> {
    state: State<C>,
    attempts: u64,
}

/// Lazily bootstrapped handle to the backend client.
///
/// Hold one per process (in `AppState`); it is shared, never cloned.
pub struct SessionClient<B: ClientBootstrap> {
    bootstrap: Arc<B>,
    token_store: Arc<dyn TokenStore>,
    endpoint: Url,
    access_token: Option<SecretString>,
    lang_code: String,
    inner: Mutex<Inner<B::Client>>,
}

impl<B: ClientBootstrap> SessionClient<B> {
    /// Create an uninitialized handle. No I/O happens until [`Self::get_client`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Configuration`] if the backend endpoint is
    /// missing or not a valid URL.
    pub fn new(
        config: &BackendConfig,
        bootstrap: B,
        token_store: Arc<dyn TokenStore>,
    ) -> Result<Self, SessionError> {
        let raw = config
            .project_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("ONEENTRY_PROJECT_URL".to_string()))?;
        let endpoint = Url::parse(raw).map_err(|e| {
            ConfigError::InvalidEnvVar("ONEENTRY_PROJECT_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            bootstrap: Arc::new(bootstrap),
            token_store,
            endpoint,
            access_token: config.app_token.clone(),
            lang_code: config.lang_code.clone(),
            inner: Mutex::new(Inner {
                state: State::Uninitialized,
                attempts: 0,
            }),
        })
    }

    /// The configured backend endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match self.lock().state {
            State::Uninitialized => SessionPhase::Uninitialized,
            State::Initializing { .. } => SessionPhase::Initializing,
            State::Ready(_) => SessionPhase::Ready,
            State::Failed { .. } => SessionPhase::Failed,
        }
    }

    /// Get the backend client, bootstrapping it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Bootstrap`] if the in-flight attempt failed.
    /// Every caller that awaited that attempt receives the same error.
    pub async fn get_client(&self) -> Result<Arc<B::Client>, SessionError> {
        let (attempt, future) = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            match &inner.state {
                State::Ready(client) => return Ok(Arc::clone(client)),
                State::Initializing { attempt, future } => (*attempt, future.clone()),
                State::Uninitialized | State::Failed { .. } => {
                    if let State::Failed { attempt, error } = &inner.state {
                        tracing::debug!(attempt, error = %error, "retrying backend bootstrap");
                    }
                    inner.attempts += 1;
                    let attempt = inner.attempts;
                    let future = self.start_bootstrap(attempt);
                    inner.state = State::Initializing {
                        attempt,
                        future: future.clone(),
                    };
                    (attempt, future)
                }
            }
        };

        let outcome = future.await;

        let mut inner = self.lock();
        if matches!(&inner.state, State::Initializing { attempt: current, .. } if *current == attempt)
        {
            inner.state = match &outcome {
                Ok(client) => State::Ready(Arc::clone(client)),
                Err(error) => State::Failed {
                    attempt,
                    error: Arc::clone(error),
                },
            };
        }

        outcome.map_err(SessionError::Bootstrap)
    }

    fn start_bootstrap(&self, attempt: u64) -> BootstrapFuture<B::Client> {
        let bootstrap = run_bootstrap(
            Arc::clone(&self.bootstrap),
            Arc::clone(&self.token_store),
            self.endpoint.clone(),
            self.access_token.clone(),
            self.lang_code.clone(),
        );
        // Whoever ends up polling the shared future, credential reads and
        // writes stay bound to the browsing session that started it.
        let bootstrap: BoxFuture<'static, Result<B::Client, BootstrapError>> =
            match token_store::current_session() {
                Some(session) => token_store::scope(session, bootstrap).boxed(),
                None => bootstrap.boxed(),
            };

        bootstrap
            .map(|result| match result {
                Ok(client) => Ok(Arc::new(client)),
                Err(error) => {
                    tracing::warn!(error = %error, "backend bootstrap failed");
                    Err(Arc::new(error))
                }
            })
            .instrument(tracing::info_span!("session_bootstrap", attempt))
            .boxed()
            .shared()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<B::Client>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read the credential, then construct the client with a rotation sink.
async fn run_bootstrap<B: ClientBootstrap>(
    bootstrap: Arc<B>,
    token_store: Arc<dyn TokenStore>,
    endpoint: Url,
    access_token: Option<SecretString>,
    lang_code: String,
) -> Result<B::Client, BootstrapError> {
    let refresh_token = token_store.read().await?;
    tracing::info!(
        endpoint = %endpoint,
        has_refresh_token = refresh_token.is_some(),
        "bootstrapping backend client"
    );

    let options = ClientOptions {
        endpoint,
        access_token,
        lang_code,
        auth: AuthConfig {
            refresh_token,
            custom_auth: false,
            save: token_store,
        },
    };
    bootstrap.bootstrap(options).await
}
