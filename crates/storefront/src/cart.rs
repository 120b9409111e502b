//! Observable cart store for one browsing session.
//!
//! Mutations are synchronous and immediately visible to every reader and
//! [`CartStore::subscribe`] receiver. Durability comes from [`CartStore::persist`],
//! which writes the cart into the browsing session record so it survives a
//! full page reload.

use onstore_core::{CartItem, CartState, CartTotals, MoneyError, ProductId};
use tokio::sync::watch;
use tower_sessions::Session;

use crate::models::session_keys;

/// Mutation-driven cart with derived totals.
#[derive(Debug)]
pub struct CartStore {
    state: watch::Sender<CartState>,
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new(CartState::new())
    }
}

impl CartStore {
    /// Create a store holding `state`, normalized.
    #[must_use]
    pub fn new(state: CartState) -> Self {
        let (state, _) = watch::channel(state.normalized());
        Self { state }
    }

    /// Load the cart persisted in `session`, or an empty cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn load(session: &Session) -> Result<Self, tower_sessions::session::Error> {
        let state: Option<CartState> = session.get(session_keys::CART).await?;
        Ok(Self::new(state.unwrap_or_default()))
    }

    /// Write the current cart into `session`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn persist(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            session.remove::<CartState>(session_keys::CART).await?;
        } else {
            session.insert(session_keys::CART, snapshot).await?;
        }
        Ok(())
    }

    /// Add `item`, merging quantities with an existing line of the same id.
    ///
    /// A zero quantity is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the cart totals would leave the
    /// representable range; the cart is left unchanged.
    pub fn add_to_cart(&self, item: CartItem) -> Result<bool, MoneyError> {
        let mut outcome = Ok(false);
        self.state.send_if_modified(|cart| {
            outcome = cart.add(item);
            matches!(outcome, Ok(true))
        });
        outcome
    }

    /// Set a line's quantity; `quantity <= 0` removes the line.
    ///
    /// # Errors
    ///
    /// Same as [`CartStore::add_to_cart`].
    pub fn update_quantity(&self, id: ProductId, quantity: i64) -> Result<bool, MoneyError> {
        let mut outcome = Ok(false);
        self.state.send_if_modified(|cart| {
            outcome = cart.update_quantity(id, quantity);
            matches!(outcome, Ok(true))
        });
        outcome
    }

    /// Remove a line if present.
    pub fn remove_item(&self, id: ProductId) -> bool {
        self.state.send_if_modified(|cart| cart.remove(id))
    }

    /// Empty the cart.
    pub fn clear_cart(&self) -> bool {
        self.state.send_if_modified(CartState::clear)
    }

    /// Subtotal, tax and total of the current items.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the totals are not representable.
    pub fn totals(&self) -> Result<CartTotals, MoneyError> {
        self.state.borrow().totals()
    }

    /// Copy of the current cart.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    /// Watch cart changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use onstore_core::Money;
    use rust_decimal::Decimal;
    use tower_sessions::MemoryStore;

    use super::*;

    fn item(id: i32, cents: u32, quantity: u32) -> CartItem {
        CartItem {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            unit_price: Money::from_cents(cents),
            quantity,
            image: format!("/images/{id}.webp"),
        }
    }

    #[test]
    fn test_add_merges_same_id() {
        let store = CartStore::default();
        assert!(store.add_to_cart(item(1, 1000, 1)).unwrap());
        assert!(store.add_to_cart(item(1, 1000, 2)).unwrap());

        let cart = store.snapshot();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 3);
    }

    #[test]
    fn test_zero_quantity_update_removes() {
        let store = CartStore::default();
        store.add_to_cart(item(1, 1000, 1)).unwrap();
        assert!(store.update_quantity(ProductId::new(1), 0).unwrap());
        assert!(store.snapshot().get(ProductId::new(1)).is_none());
    }

    #[test]
    fn test_invalid_mutations_are_noops() {
        let store = CartStore::default();
        assert!(!store.add_to_cart(item(1, 1000, 0)).unwrap());
        assert!(!store.update_quantity(ProductId::new(9), 4).unwrap());
        assert!(!store.remove_item(ProductId::new(9)));
        assert!(!store.clear_cart());
        assert!(store.is_empty());
    }

    #[test]
    fn test_totals_follow_every_mutation() {
        let store = CartStore::default();
        store.add_to_cart(item(1, 1000, 2)).unwrap();
        store.add_to_cart(item(2, 500, 1)).unwrap();

        let totals = store.totals().unwrap();
        assert_eq!(totals.subtotal, Money::from_cents(2500));
        assert_eq!(totals.tax, Money::from_cents(250));
        assert_eq!(totals.total, Money::from_cents(2750));
        assert_eq!(store.totals().unwrap(), totals);

        store.remove_item(ProductId::new(2));
        assert_eq!(store.totals().unwrap().subtotal, Money::from_cents(2000));
    }

    #[test]
    fn test_subscribers_see_changes_immediately() {
        let store = CartStore::default();
        let mut rx = store.subscribe();

        store.add_to_cart(item(1, 1000, 1)).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().item_count(), 1);

        // No-op mutations do not notify.
        store.remove_item(ProductId::new(42));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_out_of_range_add_leaves_cart_and_subscribers_untouched() {
        let store = CartStore::default();
        let huge = CartItem {
            unit_price: Money::new(Decimal::from_str_exact("50000000000000000000000000000").unwrap())
                .unwrap(),
            ..item(7, 0, 1)
        };
        assert!(store.add_to_cart(huge.clone()).unwrap());
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        assert_eq!(store.add_to_cart(huge), Err(MoneyError::Overflow));
        assert_eq!(store.snapshot().get(ProductId::new(7)).unwrap().quantity, 1);
        assert!(!rx.has_changed().unwrap());
        assert!(store.totals().is_ok());
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        let store = CartStore::load(&session).await.unwrap();
        assert!(store.is_empty());
        store.add_to_cart(item(1, 1000, 2)).unwrap();
        store.add_to_cart(item(2, 500, 1)).unwrap();
        store.persist(&session).await.unwrap();

        let reloaded = CartStore::load(&session).await.unwrap();
        assert_eq!(reloaded.snapshot(), store.snapshot());

        reloaded.clear_cart();
        reloaded.persist(&session).await.unwrap();
        let stored: Option<CartState> = session.get(session_keys::CART).await.unwrap();
        assert!(stored.is_none());
    }
}
