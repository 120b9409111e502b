//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for the session store
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//!
//! ## Backend
//! - `ONEENTRY_PROJECT_URL` - OneEntry project API endpoint (validated when the
//!   session client is constructed)
//! - `ONEENTRY_TOKEN` - OneEntry app access token
//! - `ONEENTRY_LANG_CODE` - Content language (default: `en_US`)
//! - `ONEENTRY_AUTH_PROVIDER` - Auth provider marker (default: `email`)
//! - `ONEENTRY_ORDERS_MARKER` - Order storage marker (default: `orders`)
//! - `ONEENTRY_SIGNUP_FORM` - Registration form identifier (default: `reg`)
//!
//! ## Checkout
//! - `CHECKOUT_FORM_IDENTIFIER` - Order form identifier (default: `order-form`)
//! - `CHECKOUT_PAYMENT_ACCOUNT` - Payment account identifier (default: `stripe-payment`)
//! - `CHECKOUT_LOGIN_PATH` - Where anonymous checkouts are sent (default: `/auth?type=login`)
//! - `CHECKOUT_NOTE_MARKER` - Order form field holding the customer note (default: `order_note`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Commerce backend configuration
    pub backend: BackendConfig,
    /// Order submission configuration
    pub checkout: CheckoutConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
    /// Fraction of error events sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// OneEntry backend configuration.
///
/// Implements `Debug` manually to redact the app token.
#[derive(Clone)]
pub struct BackendConfig {
    /// Project API endpoint (e.g., `https://shop.oneentry.cloud`)
    pub project_url: Option<String>,
    /// App access token sent as `x-app-token`
    pub app_token: Option<SecretString>,
    /// Content language tag
    pub lang_code: String,
    /// Auth provider marker used for login and token refresh
    pub auth_provider: String,
    /// Order storage marker
    pub orders_marker: String,
    /// Form identifier sent with sign-up requests
    pub signup_form: String,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("project_url", &self.project_url)
            .field("app_token", &self.app_token.as_ref().map(|_| "[REDACTED]"))
            .field("lang_code", &self.lang_code)
            .field("auth_provider", &self.auth_provider)
            .field("orders_marker", &self.orders_marker)
            .field("signup_form", &self.signup_form)
            .finish()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            project_url: None,
            app_token: None,
            lang_code: "en_US".to_string(),
            auth_provider: "email".to_string(),
            orders_marker: "orders".to_string(),
            signup_form: "reg".to_string(),
        }
    }
}

/// Order submission configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Order form identifier sent with every order
    pub form_identifier: String,
    /// Payment account identifier sent with every order
    pub payment_account_identifier: String,
    /// Redirect target for checkouts without a signed-in user
    pub login_path: String,
    /// Order form field marker for the customer's note
    pub note_marker: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            form_identifier: "order-form".to_string(),
            payment_account_identifier: "stripe-payment".to_string(),
            login_path: "/auth?type=login".to_string(),
            note_marker: "order_note".to_string(),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            backend: BackendConfig::from_env()?,
            checkout: CheckoutConfig::from_env(),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_rate("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: get_rate("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether session cookies must be marked `Secure`.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl BackendConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let app_token = match get_optional_env("ONEENTRY_TOKEN") {
            Some(token) => {
                validate_secret_strength(&token, "ONEENTRY_TOKEN")?;
                Some(SecretString::from(token))
            }
            None => None,
        };

        Ok(Self {
            project_url: get_optional_env("ONEENTRY_PROJECT_URL"),
            app_token,
            lang_code: get_env_or_default("ONEENTRY_LANG_CODE", &defaults.lang_code),
            auth_provider: get_env_or_default("ONEENTRY_AUTH_PROVIDER", &defaults.auth_provider),
            orders_marker: get_env_or_default("ONEENTRY_ORDERS_MARKER", &defaults.orders_marker),
            signup_form: get_env_or_default("ONEENTRY_SIGNUP_FORM", &defaults.signup_form),
        })
    }
}

impl CheckoutConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            form_identifier: get_env_or_default(
                "CHECKOUT_FORM_IDENTIFIER",
                &defaults.form_identifier,
            ),
            payment_account_identifier: get_env_or_default(
                "CHECKOUT_PAYMENT_ACCOUNT",
                &defaults.payment_account_identifier,
            ),
            login_path: get_env_or_default("CHECKOUT_LOGIN_PATH", &defaults.login_path),
            note_marker: get_env_or_default("CHECKOUT_NOTE_MARKER", &defaults.note_marker),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Get a sampling rate in `0.0..=1.0`.
fn get_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let rate = raw
        .parse::<f32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be between 0.0 and 1.0 (got {rate})"),
        ));
    }
    Ok(rate)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the token issued by the backend."
            ),
        ));
    }

    Ok(())
}
