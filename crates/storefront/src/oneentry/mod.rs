//! OneEntry headless commerce API client.
//!
//! # Architecture
//!
//! - Plain `reqwest` JSON calls against `/api/content/...`
//! - The backend is the source of truth for users, orders and payments
//! - User-scoped calls carry a bearer access token obtained from a refresh
//!   credential; every rotated refresh credential is written back through the
//!   [`TokenStore`] handed over at bootstrap
//!
//! # Example
//!
//! ```rust,ignore
//! use onstore_storefront::oneentry::OneEntryBootstrap;
//! use onstore_storefront::session::SessionClient;
//!
//! let sessions = SessionClient::new(&config.backend, OneEntryBootstrap::new(&config.backend), store)?;
//! let client = sessions.get_client().await?;
//! let user = client.current_user().await?;
//! ```

mod bootstrap;
mod types;

pub use bootstrap::OneEntryBootstrap;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use onstore_core::{Order, OrderRequest, RefreshToken, UserEntity, sort_newest_first};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;
use url::Url;

use crate::config::BackendConfig;
use crate::session::{ClientOptions, TokenStore, TokenStoreError};

use types::{
    AuthBody, AuthField, CreatedOrder, ErrorBody, OrderBody, OrderRecord, OrdersPage,
    PaymentSession, PaymentSessionBody, RefreshBody, SignUpBody, TokenResponse, UserRecord,
};

/// Page size for order history.
pub const ORDERS_PAGE_SIZE: u32 = 30;

/// How long an exchanged access token is reused before refreshing again.
const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(10 * 60);

/// Errors that can occur when talking to the OneEntry API.
#[derive(Debug, Error)]
pub enum OneEntryError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// No signed-in user, or the credential was rejected.
    #[error("Not signed in")]
    Unauthorized,

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Endpoint could not be turned into a request URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// A record was missing required fields.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// The refresh credential slot could not be read or written.
    #[error("Credential store error: {0}")]
    Credential(#[from] TokenStoreError),
}

/// Project markers and identifiers addressed by the client.
#[derive(Debug, Clone)]
pub struct Markers {
    /// Auth provider used for sign-up, login, refresh and logout.
    pub auth_provider: String,
    /// Order storage.
    pub orders: String,
    /// Registration form sent with sign-up.
    pub signup_form: String,
}

impl From<&BackendConfig> for Markers {
    fn from(config: &BackendConfig) -> Self {
        Self {
            auth_provider: config.auth_provider.clone(),
            orders: config.orders_marker.clone(),
            signup_form: config.signup_form.clone(),
        }
    }
}

/// Client for the OneEntry content API.
///
/// One instance serves every browsing session. The refresh credential is
/// looked up through the [`TokenStore`] on each user-scoped call, and the
/// access tokens it was exchanged for are cached keyed by that credential, so
/// two sessions never share a signed-in identity.
#[derive(Clone)]
pub struct OneEntryClient {
    inner: Arc<OneEntryClientInner>,
}

struct OneEntryClientInner {
    http: reqwest::Client,
    endpoint: Url,
    app_token: Option<SecretString>,
    lang_code: String,
    markers: Markers,
    custom_auth: bool,
    save: Arc<dyn TokenStore>,
    access_tokens: Cache<String, SecretString>,
    refresh_lock: Mutex<()>,
}

impl OneEntryClient {
    /// Create a client from bootstrap options. Performs no I/O.
    #[must_use]
    pub fn new(http: reqwest::Client, options: ClientOptions, markers: Markers) -> Self {
        let access_tokens = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ACCESS_TOKEN_TTL)
            .build();

        Self {
            inner: Arc::new(OneEntryClientInner {
                http,
                endpoint: options.endpoint,
                app_token: options.access_token,
                lang_code: options.lang_code,
                markers,
                custom_auth: options.auth.custom_auth,
                save: options.auth.save,
                access_tokens,
                refresh_lock: Mutex::new(()),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Auth
    // ─────────────────────────────────────────────────────────────────────────

    /// Exchange `credential` for an access token, writing any rotated
    /// credential back through the token store.
    ///
    /// # Errors
    ///
    /// Returns [`OneEntryError::Unauthorized`] if the backend rejects the
    /// credential.
    #[instrument(skip_all)]
    pub async fn exchange(&self, credential: &RefreshToken) -> Result<SecretString, OneEntryError> {
        let _guard = self.inner.refresh_lock.lock().await;
        if let Some(token) = self.inner.access_tokens.get(credential.expose()).await {
            return Ok(token);
        }

        let path = format!(
            "users-auth-providers/marker/{}/users/refresh",
            self.inner.markers.auth_provider
        );
        let body = RefreshBody {
            refresh_token: credential.expose(),
        };

        let response: TokenResponse = match self
            .send(self.request(Method::POST, &path)?.json(&body))
            .await
        {
            Ok(response) => response,
            Err(OneEntryError::Unauthorized) => {
                tracing::info!("refresh credential rejected");
                return Err(OneEntryError::Unauthorized);
            }
            Err(e) => return Err(e),
        };

        let access = SecretString::from(response.access_token);
        let rotated =
            RefreshToken::new(response.refresh_token).unwrap_or_else(|| credential.clone());
        if rotated != *credential {
            self.inner.access_tokens.invalidate(credential.expose()).await;
            if let Err(e) = self.inner.save.write(rotated.clone()).await {
                tracing::warn!(error = %e, "failed to persist rotated refresh token");
            }
        }
        self.inner
            .access_tokens
            .insert(rotated.expose().to_string(), access.clone())
            .await;
        Ok(access)
    }

    /// Sign in with identifier and password, storing the issued credential.
    ///
    /// # Errors
    ///
    /// Returns [`OneEntryError::Unauthorized`] for rejected credentials and
    /// [`OneEntryError::Credential`] if the credential cannot be stored.
    #[instrument(skip(self, password))]
    pub async fn login(&self, identifier: &str, password: &str) -> Result<(), OneEntryError> {
        let body = AuthBody {
            auth_data: vec![
                AuthField {
                    marker: "email",
                    value: identifier,
                },
                AuthField {
                    marker: "password",
                    value: password,
                },
            ],
        };
        let path = format!(
            "users-auth-providers/marker/{}/users/auth",
            self.inner.markers.auth_provider
        );

        let response: TokenResponse = self
            .send(self.request(Method::POST, &path)?.json(&body))
            .await?;
        let credential = RefreshToken::new(response.refresh_token).ok_or_else(|| {
            OneEntryError::InvalidRecord("auth response without refreshToken".to_string())
        })?;

        self.inner.save.write(credential.clone()).await?;
        self.inner
            .access_tokens
            .insert(
                credential.expose().to_string(),
                SecretString::from(response.access_token),
            )
            .await;
        tracing::info!("user signed in");
        Ok(())
    }

    /// Register a new user with the auth provider.
    ///
    /// Registration does not sign the user in.
    ///
    /// # Errors
    ///
    /// Returns [`OneEntryError::Api`] when the backend rejects the
    /// registration, e.g. because the identifier is taken.
    #[instrument(skip(self, name, password))]
    pub async fn signup(
        &self,
        name: &str,
        identifier: &str,
        password: &str,
    ) -> Result<UserEntity, OneEntryError> {
        let body = SignUpBody::new(
            &self.inner.markers.signup_form,
            name,
            identifier,
            password,
        );
        let path = format!(
            "users-auth-providers/marker/{}/users/sign-up",
            self.inner.markers.auth_provider
        );

        let record: UserRecord = self
            .send(self.request(Method::POST, &path)?.json(&body))
            .await?;
        let user = UserEntity::try_from(record)?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Sign out the browsing session in scope.
    ///
    /// The credential is revoked with the backend on a best-effort basis;
    /// the cached access token and the stored credential are always dropped.
    ///
    /// # Errors
    ///
    /// Returns [`OneEntryError::Credential`] if the credential slot cannot be
    /// read or cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), OneEntryError> {
        let Some(credential) = self.inner.save.read().await? else {
            return Ok(());
        };

        let access = self.inner.access_tokens.get(credential.expose()).await;
        self.inner
            .access_tokens
            .invalidate(credential.expose())
            .await;
        self.inner.save.clear().await?;

        if let Some(token) = access {
            let path = format!(
                "users-auth-providers/marker/{}/users/logout",
                self.inner.markers.auth_provider
            );
            let body = RefreshBody {
                refresh_token: credential.expose(),
            };
            let revoked = self
                .request(Method::POST, &path)
                .map(|builder| builder.bearer_auth(token.expose_secret()).json(&body));
            match revoked {
                Ok(builder) => {
                    if let Err(e) = self.send::<serde_json::Value>(builder).await {
                        tracing::warn!(error = %e, "backend logout failed");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "backend logout failed"),
            }
        }

        tracing::info!("user signed out");
        Ok(())
    }

    /// Access token for the browsing session in scope.
    async fn access_token(&self) -> Result<(RefreshToken, SecretString), OneEntryError> {
        let credential = self
            .inner
            .save
            .read()
            .await?
            .ok_or(OneEntryError::Unauthorized)?;
        if let Some(token) = self.inner.access_tokens.get(credential.expose()).await {
            return Ok((credential, token));
        }
        if self.inner.custom_auth {
            return Err(OneEntryError::Unauthorized);
        }
        let token = self.exchange(&credential).await?;
        Ok((credential, token))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    /// The signed-in user, or `None` when nobody is signed in.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures or an invalid user record.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<Option<UserEntity>, OneEntryError> {
        match self
            .authorized::<UserRecord, _>(|| self.request(Method::GET, "users/me"))
            .await
        {
            Ok(record) => UserEntity::try_from(record).map(Some),
            Err(OneEntryError::Unauthorized) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Orders
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an order and open a payment session for it.
    ///
    /// Returns the payment URL the customer should be redirected to.
    ///
    /// # Errors
    ///
    /// Returns an error if either the order or the payment session is rejected.
    #[instrument(skip(self, request), fields(lines = request.line_items.len()))]
    pub async fn create_order(&self, request: &OrderRequest) -> Result<String, OneEntryError> {
        let body = OrderBody::from(request);
        let path = format!("orders-storage/marker/{}/orders", self.inner.markers.orders);

        let created: CreatedOrder = self
            .authorized(|| Ok(self.request(Method::POST, &path)?.json(&body)))
            .await?;
        tracing::info!(order_id = created.id, "order created");

        let payment = PaymentSessionBody {
            order_id: created.id,
            kind: "session",
        };
        let session: PaymentSession = self
            .authorized(|| Ok(self.request(Method::POST, "payments/sessions")?.json(&payment)))
            .await?;

        session
            .payment_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                OneEntryError::InvalidRecord(format!(
                    "payment session for order {} has no paymentUrl",
                    created.id
                ))
            })
    }

    /// The signed-in user's orders, newest first.
    ///
    /// Records missing required fields are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`OneEntryError::Unauthorized`] when nobody is signed in.
    #[instrument(skip(self))]
    pub async fn orders(&self, offset: u32, limit: u32) -> Result<Vec<Order>, OneEntryError> {
        let path = format!("orders-storage/marker/{}/orders", self.inner.markers.orders);
        let page: OrdersPage = self
            .authorized(|| {
                let mut request = self.url(&path)?;
                request
                    .query_pairs_mut()
                    .append_pair("offset", &offset.to_string())
                    .append_pair("limit", &limit.to_string());
                Ok(self.builder(Method::GET, request))
            })
            .await?;

        let mut orders: Vec<Order> = page
            .items
            .into_iter()
            .filter_map(|raw| {
                let parsed = serde_json::from_value::<OrderRecord>(raw)
                    .map_err(OneEntryError::from)
                    .and_then(Order::try_from);
                match parsed {
                    Ok(order) => Some(order),
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping invalid order record");
                        None
                    }
                }
            })
            .collect();
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, OneEntryError> {
        let mut url = Url::parse(&format!(
            "{}/api/content/{}",
            self.inner.endpoint.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        ))?;
        url.query_pairs_mut()
            .append_pair("langCode", &self.inner.lang_code);
        Ok(url)
    }

    fn builder(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.inner.http.request(method, url);
        match &self.inner.app_token {
            Some(token) => builder.header("x-app-token", token.expose_secret()),
            None => builder,
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, OneEntryError> {
        Ok(self.builder(method, self.url(path)?))
    }

    /// Send a user-scoped request, refreshing the access token once on 401.
    async fn authorized<T, F>(&self, build: F) -> Result<T, OneEntryError>
    where
        T: DeserializeOwned,
        F: Fn() -> Result<RequestBuilder, OneEntryError> + Send + Sync,
    {
        let (credential, token) = self.access_token().await?;
        match self.send(build()?.bearer_auth(token.expose_secret())).await {
            Err(OneEntryError::Unauthorized) if !self.inner.custom_auth => {
                tracing::debug!("access token rejected, refreshing");
                self.inner
                    .access_tokens
                    .invalidate(credential.expose())
                    .await;
                let fresh = self.exchange(&credential).await?;
                self.send(build()?.bearer_auth(fresh.expose_secret())).await
            }
            other => other,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, OneEntryError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(OneEntryError::Unauthorized);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(OneEntryError::RateLimited(retry_after));
        }

        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|body| body.message())
                .unwrap_or_else(|| text.chars().take(200).collect());
            tracing::error!(
                status = %status,
                body = %text.chars().take(500).collect::<String>(),
                "OneEntry API returned non-success status"
            );
            return Err(OneEntryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse OneEntry response"
            );
            OneEntryError::Parse(e)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::{AuthConfig, MemoryTokenStore};

    fn client_with_store(endpoint: &str, save: Arc<MemoryTokenStore>) -> OneEntryClient {
        OneEntryClient::new(
            reqwest::Client::new(),
            ClientOptions {
                endpoint: Url::parse(endpoint).unwrap(),
                access_token: None,
                lang_code: "en_US".to_string(),
                auth: AuthConfig {
                    refresh_token: None,
                    custom_auth: false,
                    save,
                },
            },
            Markers::from(&BackendConfig::default()),
        )
    }

    fn client(endpoint: &str) -> OneEntryClient {
        client_with_store(endpoint, Arc::new(MemoryTokenStore::default()))
    }

    #[test]
    fn test_url_includes_content_prefix_and_lang() {
        let url = client("https://shop.oneentry.cloud/").url("/users/me").unwrap();
        assert_eq!(
            url.as_str(),
            "https://shop.oneentry.cloud/api/content/users/me?langCode=en_US"
        );
    }

    #[test]
    fn test_error_display() {
        let err = OneEntryError::Api {
            status: 422,
            message: "products must not be empty".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error (422): products must not be empty"
        );
        assert_eq!(
            OneEntryError::RateLimited(30).to_string(),
            "Rate limited, retry after 30 seconds"
        );
    }

    #[tokio::test]
    async fn test_logout_drops_credential_without_cached_token() {
        // Nothing is cached, so no revocation request is attempted.
        let store = Arc::new(MemoryTokenStore::with_token(
            RefreshToken::new("rt-stale").unwrap(),
        ));
        let client = client_with_store("http://127.0.0.1:9", store.clone());

        client.logout().await.unwrap();
        assert!(store.current().is_none());
        client.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_anonymous_client_has_no_user() {
        // No credential means no request is made at all.
        let user = client("http://127.0.0.1:9").current_user().await.unwrap();
        assert!(user.is_none());
    }
}
