//! Account route handlers.
//!
//! These routes require a signed-in session.

use axum::{Json, extract::State};
use chrono::Utc;
use onstore_core::{Order, OrderStats, UserEntity};
use tracing::instrument;

use crate::error::{AppError, Result, set_sentry_user};
use crate::state::AppState;

/// The signed-in user.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<UserEntity>> {
    let user = state
        .accounts()
        .current_user()
        .await?
        .ok_or_else(|| AppError::Unauthorized("sign in required".to_string()))?;

    set_sentry_user(&user.id, Some(&user.identifier));
    Ok(Json(user))
}

/// The signed-in user's orders, newest first.
#[instrument(skip(state))]
pub async fn orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>> {
    let orders = state.orders().list_orders().await?;
    tracing::debug!(count = orders.len(), "order history loaded");
    Ok(Json(orders))
}

/// Lifetime, this-year and this-month order counts and spend.
#[instrument(skip(state))]
pub async fn stats(State(state): State<AppState>) -> Result<Json<OrderStats>> {
    let orders = state.orders().list_orders().await?;
    Ok(Json(OrderStats::from_orders(&orders, Utc::now())?))
}
