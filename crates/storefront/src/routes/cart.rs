//! Cart route handlers.
//!
//! The cart lives in the browsing session. Every handler loads it, applies one
//! mutation, persists it when something changed, and returns the cart view
//! with freshly computed totals. A mutation whose totals would leave the
//! representable range is refused with `400` and the stored cart is kept.

use axum::{Json, extract::Path};
use onstore_core::{CartItem, CartState, Money, MoneyError, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::cart::CartStore;
use crate::error::{AppError, Result};

/// Cart line display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
    pub image: String,
}

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u64,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

impl TryFrom<&CartState> for CartView {
    type Error = MoneyError;

    fn try_from(cart: &CartState) -> std::result::Result<Self, MoneyError> {
        let totals = cart.totals()?;
        let items = cart
            .items()
            .iter()
            .map(|item| {
                Ok(CartItemView {
                    id: item.id,
                    name: item.name.clone(),
                    unit_price: item.unit_price,
                    quantity: item.quantity,
                    line_total: item.line_total()?,
                    image: item.image.clone(),
                })
            })
            .collect::<std::result::Result<_, MoneyError>>()?;
        Ok(Self {
            items,
            item_count: cart.item_count(),
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
        })
    }
}

/// Add to cart request body.
#[derive(Debug, Deserialize)]
pub struct AddItemForm {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub image: String,
}

const fn default_quantity() -> i64 {
    1
}

/// Update quantity request body.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityForm {
    pub quantity: i64,
}

/// Load the session cart, apply `mutate`, and persist it if it changed.
async fn mutate_cart(
    session: &Session,
    mutate: impl FnOnce(&CartStore) -> std::result::Result<bool, MoneyError> + Send,
) -> Result<Json<CartView>> {
    let cart = CartStore::load(session).await?;
    if mutate(&cart)? {
        cart.persist(session).await?;
    }
    Ok(Json(CartView::try_from(&cart.snapshot())?))
}

/// Show the cart with totals.
#[instrument(skip(session))]
pub async fn show(session: Session) -> Result<Json<CartView>> {
    let cart = CartStore::load(&session).await?;
    Ok(Json(CartView::try_from(&cart.snapshot())?))
}

/// Add an item, merging with an existing line of the same product.
///
/// Non-positive quantities are ignored.
#[instrument(skip(session, form), fields(product_id = %form.id, quantity = form.quantity))]
pub async fn add(session: Session, Json(form): Json<AddItemForm>) -> Result<Json<CartView>> {
    let unit_price =
        Money::new(form.price).map_err(|e| AppError::BadRequest(format!("price: {e}")))?;
    let quantity = u32::try_from(form.quantity.max(0)).unwrap_or(u32::MAX);

    let item = CartItem {
        id: form.id,
        name: form.name,
        unit_price,
        quantity,
        image: form.image,
    };
    mutate_cart(&session, |cart| cart.add_to_cart(item)).await
}

/// Set a line's quantity; zero or less removes the line.
#[instrument(skip(session, form), fields(quantity = form.quantity))]
pub async fn update(
    session: Session,
    Path(id): Path<ProductId>,
    Json(form): Json<UpdateQuantityForm>,
) -> Result<Json<CartView>> {
    mutate_cart(&session, |cart| cart.update_quantity(id, form.quantity)).await
}

/// Remove a line.
#[instrument(skip(session))]
pub async fn remove(session: Session, Path(id): Path<ProductId>) -> Result<Json<CartView>> {
    mutate_cart(&session, |cart| Ok(cart.remove_item(id))).await
}

/// Empty the cart.
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Result<Json<CartView>> {
    mutate_cart(&session, |cart| Ok(cart.clear_cart())).await
}
