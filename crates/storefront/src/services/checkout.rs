//! Checkout orchestration.
//!
//! Bridges the cart and the signed-in session to the order service:
//!
//! 1. Reject an empty cart
//! 2. Reject a second submission while one is in flight for the same key
//! 3. Send anonymous sessions to the login page, without contacting the order service
//! 4. Snapshot the cart into an [`OrderRequest`], attach the customer's note,
//!    and submit it
//! 5. Clear the cart only after the order service confirms
//!
//! A failed submission leaves the cart untouched. Dropping the checkout future
//! (e.g., client disconnect) drops the pending submission and applies nothing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use onstore_core::OrderRequest;
use thiserror::Error;
use tracing::instrument;

use super::{AccountService, CommerceError, OrderService};
use crate::cart::CartStore;
use crate::config::CheckoutConfig;
use crate::error::add_breadcrumb;

/// Where the customer goes after checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Order accepted; continue to payment at this URL.
    Redirect(String),
    /// Nobody is signed in; sign in at this path first.
    LoginRequired(String),
}

/// Errors that can occur during checkout. The cart is unchanged in every case.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to order.
    #[error("cart is empty")]
    EmptyCart,

    /// A submission for this cart is already in flight.
    #[error("checkout already in progress")]
    InFlight,

    /// The session could not be resolved.
    #[error("session lookup failed: {0}")]
    Account(#[source] CommerceError),

    /// The order service rejected or failed the order.
    #[error("order submission failed: {0}")]
    Submission(#[source] CommerceError),

    /// The order service accepted the order but returned no redirect target.
    #[error("order service returned no redirect target")]
    MissingRedirect,
}

/// Runs checkout for carts identified by a caller-chosen key.
///
/// The key is usually the browsing session id; two concurrent checkouts with
/// the same key are never both submitted.
pub struct CheckoutOrchestrator {
    accounts: Arc<dyn AccountService>,
    orders: Arc<dyn OrderService>,
    config: CheckoutConfig,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl CheckoutOrchestrator {
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountService>,
        orders: Arc<dyn OrderService>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            accounts,
            orders,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Check out `cart`, attaching `note` to the order form when it is not blank.
    ///
    /// # Errors
    ///
    /// See [`CheckoutError`]. On every error the cart is left as it was.
    #[instrument(skip(self, cart), fields(items = cart.snapshot().items().len()))]
    pub async fn checkout(
        &self,
        key: &str,
        cart: &CartStore,
        note: Option<&str>,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let _guard = InFlightGuard::acquire(&self.in_flight, key)?;

        let user = self
            .accounts
            .current_user()
            .await
            .map_err(CheckoutError::Account)?;
        let Some(user) = user else {
            tracing::info!("checkout attempted without a signed-in user");
            return Ok(CheckoutOutcome::LoginRequired(self.config.login_path.clone()));
        };

        let snapshot = cart.snapshot();
        if snapshot.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let mut request = OrderRequest::from_cart(
            &snapshot,
            &self.config.form_identifier,
            &self.config.payment_account_identifier,
        );
        if let Some(note) = note.map(str::trim).filter(|note| !note.is_empty()) {
            request = request.with_field(&self.config.note_marker, note);
        }

        let redirect = match self.orders.submit_order(&request).await {
            Ok(redirect) => redirect,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user.id, "order submission failed");
                add_breadcrumb("checkout", "Order submission failed", None);
                return Err(CheckoutError::Submission(e));
            }
        };

        if redirect.trim().is_empty() {
            tracing::error!(user_id = %user.id, "order accepted without redirect target");
            return Err(CheckoutError::MissingRedirect);
        }

        cart.clear_cart();
        tracing::info!(user_id = %user.id, lines = request.line_items.len(), "order submitted");
        add_breadcrumb(
            "checkout",
            "Order submitted",
            Some(&[("redirect", redirect.as_str())][..]),
        );
        Ok(CheckoutOutcome::Redirect(redirect))
    }

    /// Whether a checkout for `key` is in flight.
    #[must_use]
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

/// Reservation of a checkout key, released on drop.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<String>>>, key: &str) -> Result<Self, CheckoutError> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
        if !inserted {
            return Err(CheckoutError::InFlight);
        }
        Ok(Self {
            set: Arc::clone(set),
            key: key.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
