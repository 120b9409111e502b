//! Integration test harness for Onstore.
//!
//! Everything runs in-process over real TCP sockets:
//!
//! - [`TestApp`] serves the storefront router with an in-memory session store
//! - [`MockBackend`] serves the subset of the OneEntry content API the
//!   storefront uses, issuing and rotating tokens like the real service
//! - [`StubCommerce`] replaces the backend entirely for route-level tests
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p onstore-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::{get, post},
};
use onstore_core::{Order, OrderRequest, UserEntity, UserId};
use onstore_storefront::config::{BackendConfig, CheckoutConfig, StorefrontConfig};
use onstore_storefront::oneentry::OneEntryError;
use onstore_storefront::routes;
use onstore_storefront::services::{AccountService, CommerceError, OrderService};
use onstore_storefront::state::AppState;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower_sessions::MemoryStore;

/// Email accepted by [`MockBackend`] and [`StubCommerce`].
pub const TEST_EMAIL: &str = "ada@example.com";

/// Password accepted by [`MockBackend`] and [`StubCommerce`].
pub const TEST_PASSWORD: &str = "correct-horse";

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Browser-like client: keeps cookies, does not follow redirects.
#[must_use]
pub fn browser() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Storefront configuration pointing at `project_url`.
#[must_use]
pub fn storefront_config(project_url: Option<String>) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/unused"),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        base_url: "http://127.0.0.1".to_string(),
        backend: BackendConfig {
            project_url,
            app_token: Some(SecretString::from("k3v9-Qm2x-Lp7w-Zr4t")),
            ..BackendConfig::default()
        },
        checkout: CheckoutConfig::default(),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

// =============================================================================
// Storefront
// =============================================================================

/// A running storefront.
pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Serve the full storefront stack over `state`.
    pub async fn spawn(state: AppState) -> Self {
        let base_url = serve(routes::app(state, MemoryStore::default())).await;
        Self {
            base_url,
            client: browser(),
        }
    }

    /// Storefront backed by [`StubCommerce`].
    pub async fn with_stub(stub: Arc<StubCommerce>) -> Self {
        let state = AppState::with_services(storefront_config(None), stub.clone(), stub);
        Self::spawn(state).await
    }

    /// Storefront backed by OneEntry at `backend_url`.
    pub async fn with_backend(backend_url: &str) -> Self {
        let state = AppState::new(storefront_config(Some(backend_url.to_string()))).unwrap();
        Self::spawn(state).await
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET /cart` as JSON.
    pub async fn cart(&self) -> Value {
        self.client
            .get(self.url("/cart"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    /// `POST /cart/items`.
    pub async fn add_item(&self, id: i32, price: &str, quantity: i64) -> reqwest::Response {
        self.client
            .post(self.url("/cart/items"))
            .json(&json!({
                "id": id,
                "name": format!("Product {id}"),
                "price": price,
                "quantity": quantity,
                "image": format!("/images/{id}.webp"),
            }))
            .send()
            .await
            .unwrap()
    }

    /// `POST /auth/login`.
    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// `POST /auth/signup`.
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/signup"))
            .json(&json!({ "name": name, "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// `POST /auth/logout`.
    pub async fn logout(&self) -> reqwest::Response {
        self.client
            .post(self.url("/auth/logout"))
            .send()
            .await
            .unwrap()
    }

    /// `POST /checkout`.
    pub async fn checkout(&self) -> reqwest::Response {
        self.client
            .post(self.url("/checkout"))
            .send()
            .await
            .unwrap()
    }
}

/// `Location` header of a redirect response.
#[must_use]
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

// =============================================================================
// Stub commerce services
// =============================================================================

/// In-process account and order services.
#[derive(Default)]
pub struct StubCommerce {
    pub user: Mutex<Option<UserEntity>>,
    /// `None` makes every submission fail.
    pub redirect: Mutex<Option<String>>,
    pub submissions: Mutex<Vec<OrderRequest>>,
}

impl StubCommerce {
    /// Stub that accepts orders with `redirect`.
    #[must_use]
    pub fn accepting(redirect: &str) -> Arc<Self> {
        let stub = Self::default();
        *stub.redirect.lock().unwrap() = Some(redirect.to_string());
        Arc::new(stub)
    }

    /// Stub that rejects every order.
    #[must_use]
    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

fn test_user() -> UserEntity {
    UserEntity {
        id: UserId::new(9),
        identifier: TEST_EMAIL.to_string(),
        name: Some("Ada".to_string()),
    }
}

#[async_trait]
impl AccountService for StubCommerce {
    async fn current_user(&self) -> Result<Option<UserEntity>, CommerceError> {
        Ok(self.user.lock().unwrap().clone())
    }

    async fn login(&self, identifier: &str, password: &str) -> Result<(), CommerceError> {
        if identifier != TEST_EMAIL || password != TEST_PASSWORD {
            return Err(CommerceError::InvalidCredentials);
        }
        *self.user.lock().unwrap() = Some(test_user());
        Ok(())
    }

    async fn signup(
        &self,
        name: &str,
        identifier: &str,
        _password: &str,
    ) -> Result<UserEntity, CommerceError> {
        if identifier == TEST_EMAIL {
            return Err(CommerceError::Rejected("User already exists".to_string()));
        }
        Ok(UserEntity {
            id: UserId::new(10),
            identifier: identifier.to_string(),
            name: Some(name.to_string()),
        })
    }

    async fn logout(&self) -> Result<(), CommerceError> {
        self.user.lock().unwrap().take();
        Ok(())
    }

    async fn ensure_ready(&self) -> Result<(), CommerceError> {
        Ok(())
    }
}

#[async_trait]
impl OrderService for StubCommerce {
    async fn submit_order(&self, request: &OrderRequest) -> Result<String, CommerceError> {
        self.submissions.lock().unwrap().push(request.clone());
        self.redirect
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| {
                CommerceError::Backend(OneEntryError::Api {
                    status: 422,
                    message: "payment account is disabled".to_string(),
                })
            })
    }

    async fn list_orders(&self) -> Result<Vec<Order>, CommerceError> {
        Ok(Vec::new())
    }
}

// =============================================================================
// Mock OneEntry backend
// =============================================================================

/// In-process stand-in for the OneEntry content API.
///
/// Refresh tokens are single use: every refresh rotates the credential.
#[derive(Default)]
pub struct MockBackend {
    pub refresh_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub signups: Mutex<Vec<Value>>,
    pub reject_orders: AtomicBool,
    pub created_orders: Mutex<Vec<Value>>,
    pub app_tokens: Mutex<Vec<String>>,
    next_token: AtomicUsize,
    access_tokens: Mutex<HashSet<String>>,
    refresh_tokens: Mutex<HashSet<String>>,
}

type MockResponse = (StatusCode, Json<Value>);

fn unauthorized() -> MockResponse {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "statusCode": 401, "message": "Unauthorized" })),
    )
}

impl MockBackend {
    /// Start the mock API and return its base URL.
    pub async fn spawn() -> (String, Arc<Self>) {
        let backend = Arc::new(Self::default());
        let api = Router::new()
            .route(
                "/users-auth-providers/marker/{provider}/users/auth",
                post(auth),
            )
            .route(
                "/users-auth-providers/marker/{provider}/users/refresh",
                post(refresh),
            )
            .route(
                "/users-auth-providers/marker/{provider}/users/sign-up",
                post(sign_up),
            )
            .route(
                "/users-auth-providers/marker/{provider}/users/logout",
                post(logout),
            )
            .route("/users/me", get(me))
            .route(
                "/orders-storage/marker/{marker}/orders",
                get(list_orders).post(create_order),
            )
            .route("/payments/sessions", post(payment_session))
            .with_state(Arc::clone(&backend));
        let url = serve(Router::new().nest("/api/content", api)).await;
        (url, backend)
    }

    /// Issue a valid refresh credential without logging in.
    pub fn issue_refresh_token(&self) -> String {
        let n = self.next_token.fetch_add(1, Ordering::SeqCst);
        let token = format!("rt-{n}");
        self.refresh_tokens.lock().unwrap().insert(token.clone());
        token
    }

    /// Invalidate every access token (as if they all expired).
    pub fn expire_access_tokens(&self) {
        self.access_tokens.lock().unwrap().clear();
    }

    fn issue_pair(&self) -> Value {
        let n = self.next_token.fetch_add(1, Ordering::SeqCst);
        let access = format!("at-{n}");
        let refresh = format!("rt-{n}");
        self.access_tokens.lock().unwrap().insert(access.clone());
        self.refresh_tokens.lock().unwrap().insert(refresh.clone());
        json!({ "accessToken": access, "refreshToken": refresh })
    }

    fn check(&self, headers: &HeaderMap, query: &HashMap<String, String>) -> Result<(), MockResponse> {
        if query.get("langCode").map(String::as_str) != Some("en_US") {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": "langCode is required" })),
            ));
        }
        if let Some(app_token) = headers.get("x-app-token").and_then(|v| v.to_str().ok()) {
            self.app_tokens.lock().unwrap().push(app_token.to_string());
        }
        Ok(())
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), MockResponse> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(unauthorized)?;
        if self.access_tokens.lock().unwrap().contains(token) {
            Ok(())
        } else {
            Err(unauthorized())
        }
    }
}

async fn auth(
    State(backend): State<Arc<MockBackend>>,
    Path(_provider): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> MockResponse {
    if let Err(e) = backend.check(&headers, &query) {
        return e;
    }
    backend.login_calls.fetch_add(1, Ordering::SeqCst);

    let field = |marker: &str| {
        body["authData"]
            .as_array()
            .and_then(|fields| fields.iter().find(|f| f["marker"] == marker))
            .and_then(|f| f["value"].as_str())
            .map(String::from)
    };
    if field("email").as_deref() == Some(TEST_EMAIL)
        && field("password").as_deref() == Some(TEST_PASSWORD)
    {
        (StatusCode::OK, Json(backend.issue_pair()))
    } else {
        unauthorized()
    }
}

async fn refresh(
    State(backend): State<Arc<MockBackend>>,
    Path(_provider): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> MockResponse {
    if let Err(e) = backend.check(&headers, &query) {
        return e;
    }
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let presented = body["refreshToken"].as_str().unwrap_or_default();
    if backend.refresh_tokens.lock().unwrap().remove(presented) {
        (StatusCode::OK, Json(backend.issue_pair()))
    } else {
        unauthorized()
    }
}

async fn sign_up(
    State(backend): State<Arc<MockBackend>>,
    Path(_provider): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> MockResponse {
    if let Err(e) = backend.check(&headers, &query) {
        return e;
    }
    let email = body["authData"]
        .as_array()
        .and_then(|fields| fields.iter().find(|f| f["marker"] == "email"))
        .and_then(|f| f["value"].as_str())
        .unwrap_or_default()
        .to_string();
    let name = body["formData"][0]["value"].clone();
    backend.signups.lock().unwrap().push(body);

    if email == TEST_EMAIL {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "statusCode": 400, "message": "User already exists" })),
        );
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "id": 10,
            "identifier": email,
            "formData": [{ "marker": "name", "type": "string", "value": name }]
        })),
    )
}

async fn logout(
    State(backend): State<Arc<MockBackend>>,
    Path(_provider): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> MockResponse {
    if let Err(e) = backend
        .check(&headers, &query)
        .and_then(|()| backend.authorize(&headers))
    {
        return e;
    }
    backend.logout_calls.fetch_add(1, Ordering::SeqCst);
    let presented = body["refreshToken"].as_str().unwrap_or_default();
    backend.refresh_tokens.lock().unwrap().remove(presented);
    (StatusCode::CREATED, Json(json!(true)))
}

async fn me(
    State(backend): State<Arc<MockBackend>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> MockResponse {
    if let Err(e) = backend
        .check(&headers, &query)
        .and_then(|()| backend.authorize(&headers))
    {
        return e;
    }
    (
        StatusCode::OK,
        Json(json!({
            "id": 9,
            "identifier": TEST_EMAIL,
            "formData": [{ "marker": "name", "type": "string", "value": "Ada" }]
        })),
    )
}

async fn create_order(
    State(backend): State<Arc<MockBackend>>,
    Path(_marker): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> MockResponse {
    if let Err(e) = backend
        .check(&headers, &query)
        .and_then(|()| backend.authorize(&headers))
    {
        return e;
    }
    if backend.reject_orders.load(Ordering::SeqCst) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "statusCode": 422, "message": ["payment account is disabled"] })),
        );
    }

    let mut orders = backend.created_orders.lock().unwrap();
    orders.push(body);
    let id = 100 + orders.len();
    (StatusCode::CREATED, Json(json!({ "id": id })))
}

async fn payment_session(
    State(backend): State<Arc<MockBackend>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> MockResponse {
    if let Err(e) = backend
        .check(&headers, &query)
        .and_then(|()| backend.authorize(&headers))
    {
        return e;
    }
    let order_id = body["orderId"].as_i64().unwrap_or_default();
    (
        StatusCode::CREATED,
        Json(json!({
            "id": 1,
            "type": body["type"],
            "paymentUrl": format!("https://pay.example.com/session/{order_id}")
        })),
    )
}

async fn list_orders(
    State(backend): State<Arc<MockBackend>>,
    Path(_marker): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> MockResponse {
    if let Err(e) = backend
        .check(&headers, &query)
        .and_then(|()| backend.authorize(&headers))
    {
        return e;
    }
    (
        StatusCode::OK,
        Json(json!({
            "items": [
                {
                    "id": 1,
                    "createdDate": "2026-03-01T10:00:00.000Z",
                    "statusIdentifier": "delivered",
                    "totalSum": "12.00",
                    "products": [{ "id": 1, "title": "Mug", "price": 12, "quantity": 1 }]
                },
                {
                    "id": 3,
                    "statusIdentifier": "shipped",
                    "totalSum": "5.00"
                },
                {
                    "id": 2,
                    "createdDate": "2026-05-01T10:00:00.000Z",
                    "statusIdentifier": "processing",
                    "totalSum": "27.50",
                    "products": []
                }
            ],
            "total": 3
        })),
    )
}
