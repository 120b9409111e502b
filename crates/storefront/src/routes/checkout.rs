//! Checkout route handler.

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::cart::CartStore;
use crate::error::Result;
use crate::services::{CheckoutError, CheckoutOutcome};
use crate::state::AppState;

/// Optional checkout request body.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutForm {
    /// Free-text note for the order, e.g. delivery instructions.
    #[serde(default)]
    pub note: Option<String>,
}

/// Place an order for the session cart.
///
/// Redirects (303) to the payment page on success, or to the login page when
/// nobody is signed in. The emptied cart is persisted only after the order
/// service confirmed the order.
#[instrument(skip(state, session, form))]
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    form: Option<Json<CheckoutForm>>,
) -> Result<Response> {
    // A session that was never saved holds no cart.
    let Some(id) = session.id() else {
        return Err(CheckoutError::EmptyCart.into());
    };
    let cart = CartStore::load(&session).await?;
    let form = form.map(|Json(form)| form).unwrap_or_default();

    match state
        .checkout()
        .checkout(&id.to_string(), &cart, form.note.as_deref())
        .await?
    {
        CheckoutOutcome::Redirect(url) => {
            cart.persist(&session).await?;
            Ok(Redirect::to(&url).into_response())
        }
        CheckoutOutcome::LoginRequired(login_path) => Ok(Redirect::to(&login_path).into_response()),
    }
}
