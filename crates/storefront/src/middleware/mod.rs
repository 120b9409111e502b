//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions, cookie `onstore_session`)
//! 4. Token scope (binds the session to the credential slot)

pub mod session;
pub mod token_scope;

pub use session::{SESSION_COOKIE_NAME, create_session_layer, postgres_store};
pub use token_scope::token_scope_middleware;
