//! Binds the request's browsing session to the refresh credential slot.
//!
//! The backend client is shared by the whole process; this middleware makes
//! the current request's session visible to
//! [`SessionTokenStore`](crate::session::SessionTokenStore) for the duration
//! of the request, including any bootstrap it triggers.

use axum::{extract::Request, middleware::Next, response::Response};
use tower_sessions::Session;

use crate::session::token_store;

/// Run the rest of the stack inside the request's credential scope.
///
/// Must sit inside the session layer.
pub async fn token_scope_middleware(session: Session, request: Request, next: Next) -> Response {
    token_store::scope(session, next.run(request)).await
}
