//! Wire types for the OneEntry REST API.
//!
//! Responses are deserialized into loose record types first and then
//! validated into core types. A record missing a required field is rejected
//! with [`OneEntryError::InvalidRecord`] instead of being trusted at read time.

use chrono::{DateTime, Utc};
use onstore_core::{
    Money, Order, OrderId, OrderRequest, OrderStatus, OrderedProduct, ProductId, UserEntity,
    UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OneEntryError;

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RefreshBody<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct AuthField<'a> {
    pub marker: &'a str,
    pub value: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AuthBody<'a> {
    pub auth_data: Vec<AuthField<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct NotificationData<'a> {
    pub email: &'a str,
    pub phone_push: Vec<String>,
    #[serde(rename = "phoneSMS")]
    pub phone_sms: &'a str,
}

/// `POST /users-auth-providers/marker/{marker}/users/sign-up` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SignUpBody<'a> {
    pub form_identifier: &'a str,
    pub auth_data: Vec<AuthField<'a>>,
    pub form_data: Vec<FormField<'a>>,
    pub notification_data: NotificationData<'a>,
}

impl<'a> SignUpBody<'a> {
    pub(super) fn new(
        form_identifier: &'a str,
        name: &'a str,
        email: &'a str,
        password: &'a str,
    ) -> Self {
        Self {
            form_identifier,
            auth_data: vec![
                AuthField {
                    marker: "email",
                    value: email,
                },
                AuthField {
                    marker: "password",
                    value: password,
                },
            ],
            form_data: vec![FormField {
                marker: "name",
                kind: "string",
                value: name,
            }],
            notification_data: NotificationData {
                email,
                phone_push: Vec::new(),
                phone_sms: "",
            },
        }
    }
}

/// Token pair returned by login and refresh.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

/// API error body, e.g. `{"statusCode":401,"message":"Unauthorized"}`.
#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(default)]
    pub message: Option<serde_json::Value>,
}

impl ErrorBody {
    pub(super) fn message(&self) -> Option<String> {
        match self.message.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(parts) => Some(
                parts
                    .iter()
                    .map(|p| p.as_str().map_or_else(|| p.to_string(), String::from))
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            other => Some(other.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(super) struct FormValue {
    pub marker: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// `GET /users/me` record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UserRecord {
    pub id: Option<i32>,
    pub identifier: Option<String>,
    #[serde(default)]
    pub form_data: Vec<FormValue>,
}

impl TryFrom<UserRecord> for UserEntity {
    type Error = OneEntryError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        let id = record
            .id
            .ok_or_else(|| OneEntryError::InvalidRecord("user without id".to_string()))?;
        let identifier = record
            .identifier
            .filter(|i| !i.trim().is_empty())
            .ok_or_else(|| OneEntryError::InvalidRecord(format!("user {id} without identifier")))?;
        let name = record
            .form_data
            .iter()
            .find(|field| field.marker == "name")
            .and_then(|field| field.value.as_str())
            .map(String::from);

        Ok(Self {
            id: UserId::new(id),
            identifier,
            name,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orders
// ─────────────────────────────────────────────────────────────────────────────

/// A `{marker, type, value}` form entry, as sent with orders and sign-ups.
#[derive(Debug, Serialize)]
pub(super) struct FormField<'a> {
    pub marker: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderProduct {
    pub product_id: i32,
    pub quantity: u32,
}

/// `POST /orders-storage/marker/{marker}/orders` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderBody<'a> {
    pub form_identifier: &'a str,
    pub payment_account_identifier: &'a str,
    pub form_data: Vec<FormField<'a>>,
    pub products: Vec<OrderProduct>,
}

impl<'a> From<&'a OrderRequest> for OrderBody<'a> {
    fn from(request: &'a OrderRequest) -> Self {
        Self {
            form_identifier: &request.form_identifier,
            payment_account_identifier: &request.payment_account_identifier,
            form_data: request
                .form_data
                .iter()
                .map(|(marker, value)| FormField {
                    marker,
                    kind: "string",
                    value,
                })
                .collect(),
            products: request
                .line_items
                .iter()
                .map(|line| OrderProduct {
                    product_id: line.product_id.as_i32(),
                    quantity: line.quantity,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreatedOrder {
    pub id: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PaymentSessionBody {
    pub order_id: i32,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PaymentSession {
    pub payment_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OrdersPage {
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderProductRecord {
    pub id: Option<i32>,
    pub title: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<u32>,
}

/// Order history record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderRecord {
    pub id: Option<i32>,
    pub created_date: Option<String>,
    pub status_identifier: Option<String>,
    pub total_sum: Option<String>,
    #[serde(default)]
    pub products: Vec<OrderProductRecord>,
}

fn parse_money(raw: Decimal, what: &str) -> Result<Money, OneEntryError> {
    Money::new(raw).map_err(|e| OneEntryError::InvalidRecord(format!("{what}: {e}")))
}

impl TryFrom<OrderProductRecord> for OrderedProduct {
    type Error = OneEntryError;

    fn try_from(record: OrderProductRecord) -> Result<Self, Self::Error> {
        let id = record
            .id
            .ok_or_else(|| OneEntryError::InvalidRecord("ordered product without id".to_string()))?;
        let price = record.price.ok_or_else(|| {
            OneEntryError::InvalidRecord(format!("ordered product {id} without price"))
        })?;

        Ok(Self {
            id: ProductId::new(id),
            title: record.title.unwrap_or_default(),
            price: parse_money(price, "product price")?,
            quantity: record.quantity,
        })
    }
}

impl TryFrom<OrderRecord> for Order {
    type Error = OneEntryError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        let id = record
            .id
            .ok_or_else(|| OneEntryError::InvalidRecord("order without id".to_string()))?;
        let created_date = record
            .created_date
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|date| date.with_timezone(&Utc))
            .ok_or_else(|| {
                OneEntryError::InvalidRecord(format!("order {id} without valid createdDate"))
            })?;
        let total_sum = record
            .total_sum
            .as_deref()
            .and_then(|raw| raw.trim().parse::<Decimal>().ok())
            .ok_or_else(|| OneEntryError::InvalidRecord(format!("order {id} without totalSum")))?;

        Ok(Self {
            id: OrderId::new(id),
            created_date,
            status: record
                .status_identifier
                .as_deref()
                .map_or_else(OrderStatus::default, OrderStatus::from_identifier),
            total_sum: parse_money(total_sum, "order total")?,
            products: record
                .products
                .into_iter()
                .map(OrderedProduct::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use onstore_core::{CartItem, CartState};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_order_body_shape() {
        let mut cart = CartState::new();
        cart.add(CartItem {
            id: ProductId::new(12),
            name: "Kettle".to_string(),
            unit_price: Money::from_cents(3900),
            quantity: 2,
            image: String::new(),
        }).unwrap();
        let request = OrderRequest::from_cart(&cart, "order-form", "stripe-payment")
            .with_field("order_note", "ring twice");

        let body = serde_json::to_value(OrderBody::from(&request)).unwrap();
        assert_eq!(
            body,
            json!({
                "formIdentifier": "order-form",
                "paymentAccountIdentifier": "stripe-payment",
                "formData": [{"marker": "order_note", "type": "string", "value": "ring twice"}],
                "products": [{"productId": 12, "quantity": 2}]
            })
        );
    }

    #[test]
    fn test_sign_up_body_shape() {
        let body = SignUpBody::new("reg", "Ada", "ada@example.com", "correct-horse");
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({
                "formIdentifier": "reg",
                "authData": [
                    {"marker": "email", "value": "ada@example.com"},
                    {"marker": "password", "value": "correct-horse"}
                ],
                "formData": [{"marker": "name", "type": "string", "value": "Ada"}],
                "notificationData": {"email": "ada@example.com", "phonePush": [], "phoneSMS": ""}
            })
        );
    }

    #[test]
    fn test_user_record_validation() {
        let record: UserRecord = serde_json::from_value(json!({
            "id": 9,
            "identifier": "ada@example.com",
            "formData": [{"marker": "name", "value": "Ada"}]
        }))
        .unwrap();
        let user = UserEntity::try_from(record).unwrap();
        assert_eq!(user.id, UserId::new(9));
        assert_eq!(user.name.as_deref(), Some("Ada"));

        let missing: UserRecord = serde_json::from_value(json!({"id": 9})).unwrap();
        assert!(matches!(
            UserEntity::try_from(missing),
            Err(OneEntryError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_order_record_validation() {
        let record: OrderRecord = serde_json::from_value(json!({
            "id": 31,
            "createdDate": "2026-05-01T10:00:00.000Z",
            "statusIdentifier": "shipped",
            "totalSum": "27.50",
            "products": [{"id": 1, "title": "Mug", "price": 12.5, "quantity": null}]
        }))
        .unwrap();
        let order = Order::try_from(record).unwrap();
        assert_eq!(order.id, OrderId::new(31));
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.total_sum, Money::from_cents(2750));
        assert_eq!(order.products.first().unwrap().quantity, None);

        let bad: OrderRecord = serde_json::from_value(json!({
            "id": 32,
            "createdDate": "yesterday",
            "totalSum": "1.00"
        }))
        .unwrap();
        assert!(Order::try_from(bad).is_err());
    }

    #[test]
    fn test_error_body_message_forms() {
        let body: ErrorBody = serde_json::from_value(json!({"message": ["a", "b"]})).unwrap();
        assert_eq!(body.message().as_deref(), Some("a; b"));
        let body: ErrorBody = serde_json::from_value(json!({"statusCode": 500})).unwrap();
        assert!(body.message().is_none());
    }
}
