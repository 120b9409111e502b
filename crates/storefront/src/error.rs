//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use onstore_core::MoneyError;
use serde_json::json;
use thiserror::Error;

use crate::oneentry::OneEntryError;
use crate::services::{CheckoutError, CommerceError};
use crate::session::SessionError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Browsing session store failed.
    #[error("Session store error: {0}")]
    SessionStore(#[from] tower_sessions::session::Error),

    /// Account or order service failed.
    #[error("Commerce error: {0}")]
    Commerce(#[from] CommerceError),

    /// Checkout could not be completed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// A cart or order amount left the representable range.
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

fn commerce_status(err: &CommerceError) -> StatusCode {
    match err {
        CommerceError::Unauthorized | CommerceError::InvalidCredentials => {
            StatusCode::UNAUTHORIZED
        }
        CommerceError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CommerceError::Session(SessionError::Configuration(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        CommerceError::Session(SessionError::Bootstrap(_)) => StatusCode::SERVICE_UNAVAILABLE,
        CommerceError::Backend(OneEntryError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
        CommerceError::Backend(_) => StatusCode::BAD_GATEWAY,
    }
}

fn commerce_message(err: &CommerceError) -> String {
    let message = match err {
        CommerceError::Unauthorized => "Sign in required",
        CommerceError::InvalidCredentials => "Invalid credentials",
        CommerceError::Rejected(reason) => reason.as_str(),
        CommerceError::Session(SessionError::Configuration(_)) => "Internal server error",
        CommerceError::Session(SessionError::Bootstrap(_)) => {
            "Store is temporarily unavailable, please try again"
        }
        CommerceError::Backend(OneEntryError::RateLimited(_)) => {
            "Too many requests, please try again shortly"
        }
        CommerceError::Backend(_) => "External service error",
    };
    message.to_string()
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::SessionStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Commerce(err) => commerce_status(err),
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
                CheckoutError::InFlight => StatusCode::CONFLICT,
                CheckoutError::Account(inner) => commerce_status(inner),
                CheckoutError::Submission(CommerceError::Unauthorized) => StatusCode::UNAUTHORIZED,
                CheckoutError::Submission(_) | CheckoutError::MissingRedirect => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Money(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    // Don't expose internal error details to clients
    fn public_message(&self) -> String {
        match self {
            Self::SessionStore(_) => "Internal server error".to_string(),
            Self::Commerce(err) => commerce_message(err),
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => "Your cart is empty".to_string(),
                CheckoutError::InFlight => "Checkout is already in progress".to_string(),
                CheckoutError::Account(inner) => commerce_message(inner),
                CheckoutError::Submission(CommerceError::Unauthorized) => {
                    "Sign in required".to_string()
                }
                CheckoutError::Submission(_) | CheckoutError::MissingRedirect => {
                    "Your order could not be placed, please try again".to_string()
                }
            },
            Self::Money(MoneyError::Overflow) => "Amount out of range".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("navigation", "Viewed product page", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
