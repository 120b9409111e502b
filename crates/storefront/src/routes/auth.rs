//! Authentication route handlers.

use axum::{Json, extract::State, http::StatusCode};
use onstore_core::UserEntity;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::state::AppState;

/// Login request body.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Sign-up request body.
#[derive(Deserialize)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Sign in with the backend auth provider.
///
/// The issued refresh credential is stored in the browsing session; the
/// session id is rotated first so a pre-login cookie cannot be reused.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<StatusCode> {
    let email = form.email.trim();
    if email.is_empty() || form.password.is_empty() {
        return Err(AppError::BadRequest(
            "email and password are required".to_string(),
        ));
    }

    session.cycle_id().await?;

    if let Err(e) = state.accounts().login(email, &form.password).await {
        tracing::warn!(error = %e, "Login failed");
        return Err(e.into());
    }

    add_breadcrumb("auth", "User signed in", None);
    Ok(StatusCode::NO_CONTENT)
}

/// Register with the backend auth provider.
///
/// The new account is not signed in; the client follows up with a login.
#[instrument(skip(state, form))]
pub async fn signup(
    State(state): State<AppState>,
    Json(form): Json<SignupForm>,
) -> Result<(StatusCode, Json<UserEntity>)> {
    let name = form.name.trim();
    let email = form.email.trim();
    if name.is_empty() || email.is_empty() || form.password.is_empty() {
        return Err(AppError::BadRequest(
            "name, email and password are required".to_string(),
        ));
    }

    let user = state.accounts().signup(name, email, &form.password).await?;
    add_breadcrumb("auth", "User registered", None);
    Ok((StatusCode::CREATED, Json(user)))
}

/// Sign out.
///
/// Drops the stored credential and rotates the session id. The cart stays
/// with the browsing session.
#[instrument(skip(state, session))]
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<StatusCode> {
    state.accounts().logout().await?;
    session.cycle_id().await?;

    add_breadcrumb("auth", "User signed out", None);
    sentry::configure_scope(|scope| scope.set_user(None));
    Ok(StatusCode::NO_CONTENT)
}
