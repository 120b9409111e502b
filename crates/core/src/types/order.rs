//! Order submission requests and order history records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cart::CartState;
use super::id::{OrderId, ProductId};
use super::money::Money;
use super::status::OrderStatus;

/// One product line of an order request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Order submission payload, built from a cart snapshot.
///
/// The request owns copies of everything it needs, so later cart mutations
/// cannot change an order that is already being submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Order form field values keyed by field marker.
    pub form_data: BTreeMap<String, String>,
    /// Backend order form identifier.
    pub form_identifier: String,
    /// Backend payment account identifier.
    pub payment_account_identifier: String,
    /// Products in cart order.
    pub line_items: Vec<OrderLine>,
}

impl OrderRequest {
    /// Build a request from the current cart contents.
    #[must_use]
    pub fn from_cart(
        cart: &CartState,
        form_identifier: impl Into<String>,
        payment_account_identifier: impl Into<String>,
    ) -> Self {
        Self {
            form_data: BTreeMap::new(),
            form_identifier: form_identifier.into(),
            payment_account_identifier: payment_account_identifier.into(),
            line_items: cart
                .items()
                .iter()
                .map(|item| OrderLine {
                    product_id: item.id,
                    quantity: item.quantity,
                })
                .collect(),
        }
    }

    /// Attach an order form field value.
    #[must_use]
    pub fn with_field(mut self, marker: impl Into<String>, value: impl Into<String>) -> Self {
        self.form_data.insert(marker.into(), value.into());
        self
    }
}

/// A product as recorded on a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedProduct {
    pub id: ProductId,
    pub title: String,
    pub price: Money,
    pub quantity: Option<u32>,
}

/// A placed order from the customer's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub created_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub total_sum: Money,
    pub products: Vec<OrderedProduct>,
}

/// Sort orders newest first by creation time; ties fall back to id, descending.
pub fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        b.created_date
            .cmp(&a.created_date)
            .then_with(|| b.id.cmp(&a.id))
    });
}
