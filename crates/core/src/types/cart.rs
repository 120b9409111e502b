//! Cart line items and the pure cart state machine.
//!
//! `CartState` never holds an item with a zero quantity, never holds two
//! items with the same [`ProductId`], and its totals always fit the decimal
//! range. Invalid input to a mutation is ignored: every mutation reports
//! `true` when the cart changed and `false` when the call was a no-op. A
//! mutation whose totals would leave the decimal range is refused with
//! [`MoneyError::Overflow`] and leaves the cart unchanged.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::money::{Money, MoneyError};

/// Flat sales tax applied to the subtotal (10%).
pub const TAX_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// A single product line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Backend product identifier, unique within a cart.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Price for one unit.
    pub unit_price: Money,
    /// Number of units.
    pub quantity: u32,
    /// Image URL for display.
    pub image: String,
}

impl CartItem {
    /// `unit_price * quantity`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the product is out of range.
    pub fn line_total(&self) -> Result<Money, MoneyError> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Derived monetary totals for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

/// Ordered collection of cart items, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartState {
    items: Vec<CartItem>,
}

impl CartState {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Rebuild a cart from untrusted records.
    ///
    /// Zero-quantity records are dropped and duplicate ids are merged into
    /// the first occurrence, as if each record had been added in order.
    /// Records whose totals would be out of range are dropped.
    #[must_use]
    pub fn normalized(self) -> Self {
        let mut cart = Self::new();
        for item in self.items {
            let _ = cart.add(item);
        }
        cart
    }

    /// Items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Look up an item by id.
    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Add an item, merging with an existing line of the same id.
    ///
    /// A zero quantity is rejected. An existing line keeps its name, price and
    /// image; only its quantity grows.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] and leaves the cart unchanged if the
    /// totals would be out of range.
    pub fn add(&mut self, item: CartItem) -> Result<bool, MoneyError> {
        if item.quantity == 0 {
            return Ok(false);
        }

        let mut next = self.clone();
        if let Some(existing) = next.items.iter_mut().find(|line| line.id == item.id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            next.items.push(item);
        }
        self.commit(next)
    }

    /// Set the quantity of a line; a quantity `<= 0` removes the line.
    ///
    /// Unknown ids are ignored. Quantities above `u32::MAX` are clamped.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] and leaves the cart unchanged if the
    /// totals would be out of range.
    pub fn update_quantity(&mut self, id: ProductId, quantity: i64) -> Result<bool, MoneyError> {
        if quantity <= 0 {
            return Ok(self.remove(id));
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        let mut next = self.clone();
        match next.items.iter_mut().find(|line| line.id == id) {
            Some(line) if line.quantity != quantity => line.quantity = quantity,
            _ => return Ok(false),
        }
        self.commit(next)
    }

    /// Replace `self` with `next` if its totals are representable.
    fn commit(&mut self, next: Self) -> Result<bool, MoneyError> {
        next.totals()?;
        *self = next;
        Ok(true)
    }

    /// Remove a line if present.
    pub fn remove(&mut self, id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|line| line.id != id);
        self.items.len() != before
    }

    /// Remove every line.
    pub fn clear(&mut self) -> bool {
        let changed = !self.items.is_empty();
        self.items.clear();
        changed
    }

    /// Compute subtotal, tax and total from the current items.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if a total is out of range. A cart
    /// built only through the mutations above never fails here.
    pub fn totals(&self) -> Result<CartTotals, MoneyError> {
        let subtotal = Money::checked_sum(
            self.items
                .iter()
                .map(CartItem::line_total)
                .collect::<Result<Vec<_>, _>>()?,
        )?;
        let tax = subtotal.checked_scale(TAX_RATE)?;
        Ok(CartTotals {
            subtotal,
            tax,
            total: subtotal.checked_add(tax)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: i32, price_cents: u32, quantity: u32) -> CartItem {
        CartItem {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            unit_price: Money::from_cents(price_cents),
            quantity,
            image: format!("https://cdn.example.com/{id}.png"),
        }
    }

    fn assert_invariants(cart: &CartState) {
        let mut seen = std::collections::HashSet::new();
        for line in cart.items() {
            assert!(line.quantity > 0, "zero quantity retained: {line:?}");
            assert!(seen.insert(line.id), "duplicate id: {}", line.id);
        }
    }

    #[test]
    fn test_add_same_id_accumulates() {
        let mut cart = CartState::new();
        assert!(cart.add(item(1, 1000, 1)).unwrap());
        assert!(cart.add(item(1, 1000, 2)).unwrap());

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 3);
    }

    #[test]
    fn test_add_zero_quantity_is_noop() {
        let mut cart = CartState::new();
        cart.add(item(1, 1000, 2)).unwrap();
        assert!(!cart.add(item(1, 1000, 0)).unwrap());
        assert!(!cart.add(item(2, 1000, 0)).unwrap());

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 2);
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let mut cart = CartState::new();
        cart.add(item(3, 100, 1)).unwrap();
        cart.add(item(1, 100, 1)).unwrap();
        cart.add(item(3, 100, 1)).unwrap();

        let ids: Vec<i32> = cart.items().iter().map(|i| i.id.as_i32()).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn test_update_to_zero_removes() {
        let mut cart = CartState::new();
        cart.add(item(1, 1000, 1)).unwrap();
        assert!(cart.update_quantity(ProductId::new(1), 0).unwrap());
        assert!(cart.get(ProductId::new(1)).is_none());
    }

    #[test]
    fn test_update_negative_removes() {
        let mut cart = CartState::new();
        cart.add(item(1, 1000, 4)).unwrap();
        assert!(cart.update_quantity(ProductId::new(1), -3).unwrap());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_sets_quantity() {
        let mut cart = CartState::new();
        cart.add(item(1, 1000, 4)).unwrap();
        assert!(cart.update_quantity(ProductId::new(1), 9).unwrap());
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 9);
        assert!(!cart.update_quantity(ProductId::new(1), 9).unwrap());
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut cart = CartState::new();
        cart.add(item(1, 1000, 1)).unwrap();
        let before = cart.clone();
        assert!(!cart.update_quantity(ProductId::new(99), 5).unwrap());
        assert!(!cart.update_quantity(ProductId::new(99), 0).unwrap());
        assert_eq!(cart, before);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let mut cart = CartState::new();
        cart.add(item(1, 1000, 1)).unwrap();
        assert!(!cart.remove(ProductId::new(2)));
        assert!(cart.remove(ProductId::new(1)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut cart = CartState::new();
        assert!(!cart.clear());
        cart.add(item(1, 1000, 1)).unwrap();
        cart.add(item(2, 500, 1)).unwrap();
        assert!(cart.clear());
        assert!(cart.is_empty());
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_totals_with_flat_tax() {
        let mut cart = CartState::new();
        cart.add(item(1, 1000, 2)).unwrap();
        cart.add(item(2, 500, 1)).unwrap();

        let totals = cart.totals().unwrap();
        assert_eq!(totals.subtotal, Money::from_cents(2500));
        assert_eq!(totals.tax, Money::from_cents(250));
        assert_eq!(totals.total, Money::from_cents(2750));
        assert_eq!(totals.total.to_string(), "$27.50");
    }

    #[test]
    fn test_totals_empty_cart() {
        let totals = CartState::new().totals().unwrap();
        assert_eq!(totals.subtotal, Money::ZERO);
        assert_eq!(totals.tax, Money::ZERO);
        assert_eq!(totals.total, Money::ZERO);
    }

    #[test]
    fn test_totals_idempotent_and_tracks_mutation() {
        let mut cart = CartState::new();
        cart.add(item(1, 333, 3)).unwrap();

        let first = cart.totals().unwrap();
        let second = cart.totals().unwrap();
        assert_eq!(first, second);

        cart.update_quantity(ProductId::new(1), 1).unwrap();
        assert_eq!(cart.totals().unwrap().subtotal, Money::from_cents(333));
    }

    #[test]
    fn test_totals_exact_for_fractional_prices() {
        let mut cart = CartState::new();
        cart.add(item(1, 1, 3)).unwrap();
        let totals = cart.totals().unwrap();
        assert_eq!(totals.subtotal.amount(), Decimal::new(3, 2));
        assert_eq!(totals.tax.amount(), Decimal::new(3, 3));
        assert_eq!(totals.total.amount(), Decimal::new(33, 3));
    }

    #[test]
    fn test_mixed_mutation_sequence_keeps_invariants() {
        let mut cart = CartState::new();
        let ops: [(i32, i64); 12] = [
            (1, 2),
            (2, 1),
            (1, -1),
            (3, 5),
            (2, 0),
            (3, 2),
            (4, 1),
            (4, -7),
            (1, 1),
            (5, 0),
            (3, 0),
            (1, 4),
        ];

        for (step, (id, qty)) in ops.into_iter().enumerate() {
            if step % 3 == 0 {
                cart.add(item(id, 100, u32::try_from(qty.max(0)).unwrap())).unwrap();
            } else if step % 3 == 1 {
                cart.update_quantity(ProductId::new(id), qty).unwrap();
            } else {
                cart.remove(ProductId::new(id));
            }
            assert_invariants(&cart);
        }
    }

    #[test]
    fn test_normalized_drops_zero_and_merges_duplicates() {
        let raw = serde_json::json!({
            "items": [
                {"id": 1, "name": "A", "unit_price": "10.00", "quantity": 1, "image": ""},
                {"id": 2, "name": "B", "unit_price": "5.00", "quantity": 0, "image": ""},
                {"id": 1, "name": "A", "unit_price": "10.00", "quantity": 2, "image": ""}
            ]
        });
        let cart: CartState = serde_json::from_value(raw).unwrap();
        let cart = cart.normalized();

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 3);
        assert_invariants(&cart);
    }

    fn priced(id: i32, price: Decimal, quantity: u32) -> CartItem {
        CartItem {
            unit_price: Money::new(price).unwrap(),
            ..item(id, 0, quantity)
        }
    }

    #[test]
    fn test_out_of_range_add_is_refused_unchanged() {
        let huge = Decimal::from_str_exact("50000000000000000000000000000").unwrap();
        let mut cart = CartState::new();
        assert!(cart.add(priced(1, huge, 1)).unwrap());
        let before = cart.clone();

        assert_eq!(cart.add(priced(1, huge, 1)), Err(MoneyError::Overflow));
        assert_eq!(cart, before);
        assert_eq!(cart.add(priced(2, huge, 1)), Err(MoneyError::Overflow));
        assert_eq!(cart, before);
        assert!(cart.totals().is_ok());
    }

    #[test]
    fn test_out_of_range_update_is_refused_unchanged() {
        let mut cart = CartState::new();
        let price = Decimal::from_str_exact("100000000000000000000").unwrap();
        cart.add(priced(1, price, 1)).unwrap();
        let before = cart.clone();

        let result = cart.update_quantity(ProductId::new(1), i64::from(u32::MAX));
        assert_eq!(result, Err(MoneyError::Overflow));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_normalized_drops_out_of_range_records() {
        let huge = "50000000000000000000000000000";
        let raw = serde_json::json!({
            "items": [
                {"id": 1, "name": "A", "unit_price": huge, "quantity": 1, "image": ""},
                {"id": 2, "name": "B", "unit_price": huge, "quantity": 1, "image": ""}
            ]
        });
        let cart: CartState = serde_json::from_value(raw).unwrap();
        let cart = cart.normalized();

        assert_eq!(cart.items().len(), 1);
        assert!(cart.totals().is_ok());
    }

    #[test]
    fn test_tax_rate_is_ten_percent() {
        assert_eq!(TAX_RATE, Decimal::new(1, 1));
    }
}
