//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                 - Liveness check
//! GET    /health/ready           - Backend session client bootstraps
//!
//! # Cart (JSON)
//! GET    /cart                   - Cart with subtotal, tax and total
//! POST   /cart/items             - Add item
//! PATCH  /cart/items/{id}        - Set quantity (<= 0 removes)
//! DELETE /cart/items/{id}        - Remove item
//! DELETE /cart                   - Clear cart
//!
//! # Checkout
//! POST   /checkout               - Place order (optional {note}), 303 to payment or login
//!
//! # Auth
//! POST   /auth/signup            - Register a new user (201)
//! POST   /auth/login             - Sign in with the backend auth provider
//! POST   /auth/logout            - Sign out and rotate the session id
//!
//! # Account (requires auth)
//! GET    /account                - Current user
//! GET    /account/orders         - Order history, newest first
//! GET    /account/stats          - Lifetime, yearly and monthly spend
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod health;

use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use crate::middleware::{create_session_layer, token_scope_middleware};
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route("/items/{id}", patch(cart::update).delete(cart::remove))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/orders", get(account::orders))
        .route("/stats", get(account::stats))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        // Cart routes
        .nest("/cart", cart_routes())
        // Checkout
        .route("/checkout", post(checkout::checkout))
        // Account routes
        .nest("/account", account_routes())
        // Auth routes
        .nest("/auth", auth_routes())
}

/// Build the complete application with the middleware stack.
///
/// `store` backs the browsing sessions (`PostgresStore` in production).
pub fn app<S>(state: AppState, store: S) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = create_session_layer(store, state.config());

    routes()
        .layer(axum::middleware::from_fn(token_scope_middleware))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
