//! OneEntry client and session bootstrap against the mock backend.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::Ordering;

use onstore_core::{
    CartItem, CartState, Money, OrderId, OrderRequest, ProductId, RefreshToken,
};
use onstore_integration_tests::{MockBackend, TEST_EMAIL, TEST_PASSWORD, storefront_config};
use onstore_storefront::oneentry::{OneEntryBootstrap, OneEntryError};
use onstore_storefront::session::{
    MemoryTokenStore, SessionClient, SessionError, SessionPhase, TokenStore,
};

fn session_client(
    backend_url: &str,
    store: Arc<MemoryTokenStore>,
) -> SessionClient<OneEntryBootstrap> {
    let config = storefront_config(Some(backend_url.to_string()));
    SessionClient::new(
        &config.backend,
        OneEntryBootstrap::new(&config.backend),
        store,
    )
    .unwrap()
}

fn order_request() -> OrderRequest {
    let mut cart = CartState::new();
    cart.add(CartItem {
        id: ProductId::new(12),
        name: "Kettle".to_string(),
        unit_price: Money::from_cents(3900),
        quantity: 2,
        image: String::new(),
    }).unwrap();
    OrderRequest::from_cart(&cart, "order-form", "stripe-payment")
}

#[tokio::test]
async fn test_anonymous_session_has_no_user() {
    let (url, backend) = MockBackend::spawn().await;
    let sessions = session_client(&url, Arc::new(MemoryTokenStore::default()));

    let client = sessions.get_client().await.unwrap();
    assert_eq!(client.current_user().await.unwrap(), None);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_login_stores_credential_and_signs_in() {
    let (url, backend) = MockBackend::spawn().await;
    let store = Arc::new(MemoryTokenStore::default());
    let sessions = session_client(&url, store.clone());
    let client = sessions.get_client().await.unwrap();

    client.login(TEST_EMAIL, TEST_PASSWORD).await.unwrap();
    assert!(store.current().is_some());

    let user = client.current_user().await.unwrap().unwrap();
    assert_eq!(user.identifier, TEST_EMAIL);
    assert_eq!(user.display_name(), "Ada");
    assert_eq!(backend.login_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rejected_login_stores_nothing() {
    let (url, _backend) = MockBackend::spawn().await;
    let store = Arc::new(MemoryTokenStore::default());
    let client = session_client(&url, store.clone())
        .get_client()
        .await
        .unwrap();

    let result = client.login(TEST_EMAIL, "wrong").await;
    assert!(matches!(result, Err(OneEntryError::Unauthorized)));
    assert_eq!(store.current(), None);
}

#[tokio::test]
async fn test_bootstrap_exchanges_and_rotates_stored_credential() {
    let (url, backend) = MockBackend::spawn().await;
    let original = backend.issue_refresh_token();
    let store = Arc::new(MemoryTokenStore::with_token(
        RefreshToken::new(original.clone()).unwrap(),
    ));
    let sessions = Arc::new(session_client(&url, store.clone()));

    let (a, b, c) = tokio::join!(
        sessions.get_client(),
        sessions.get_client(),
        sessions.get_client()
    );
    let a = a.unwrap();
    assert!(Arc::ptr_eq(&a, &b.unwrap()));
    assert!(Arc::ptr_eq(&a, &c.unwrap()));
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(sessions.phase(), SessionPhase::Ready);

    let rotated = store.current().unwrap();
    assert_ne!(rotated.expose(), original);

    // The exchanged access token is reused.
    assert!(a.current_user().await.unwrap().is_some());
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_revoked_credential_fails_bootstrap_then_retries() {
    let (url, backend) = MockBackend::spawn().await;
    let store = Arc::new(MemoryTokenStore::with_token(
        RefreshToken::new("rt-revoked").unwrap(),
    ));
    let sessions = session_client(&url, store.clone());

    let result = sessions.get_client().await;
    assert!(matches!(result, Err(SessionError::Bootstrap(_))));
    assert_eq!(sessions.phase(), SessionPhase::Failed);

    let valid = backend.issue_refresh_token();
    store.write(RefreshToken::new(valid).unwrap()).await.unwrap();
    sessions.get_client().await.unwrap();
    assert_eq!(sessions.phase(), SessionPhase::Ready);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed_once() {
    let (url, backend) = MockBackend::spawn().await;
    let store = Arc::new(MemoryTokenStore::default());
    let client = session_client(&url, store.clone())
        .get_client()
        .await
        .unwrap();
    client.login(TEST_EMAIL, TEST_PASSWORD).await.unwrap();
    let issued = store.current().unwrap();

    backend.expire_access_tokens();
    let user = client.current_user().await.unwrap();

    assert!(user.is_some());
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_ne!(store.current().unwrap(), issued);
}

#[tokio::test]
async fn test_create_order_returns_payment_url() {
    let (url, backend) = MockBackend::spawn().await;
    let client = session_client(&url, Arc::new(MemoryTokenStore::default()))
        .get_client()
        .await
        .unwrap();
    client.login(TEST_EMAIL, TEST_PASSWORD).await.unwrap();

    let payment_url = client.create_order(&order_request()).await.unwrap();
    assert_eq!(payment_url, "https://pay.example.com/session/101");

    let created = backend.created_orders.lock().unwrap().clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0]["formIdentifier"], "order-form");
    assert_eq!(created[0]["products"][0]["productId"], 12);
    assert_eq!(created[0]["products"][0]["quantity"], 2);
}

#[tokio::test]
async fn test_create_order_requires_sign_in() {
    let (url, backend) = MockBackend::spawn().await;
    let client = session_client(&url, Arc::new(MemoryTokenStore::default()))
        .get_client()
        .await
        .unwrap();

    let result = client.create_order(&order_request()).await;
    assert!(matches!(result, Err(OneEntryError::Unauthorized)));
    assert!(backend.created_orders.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_order_surfaces_backend_message() {
    let (url, backend) = MockBackend::spawn().await;
    backend.reject_orders.store(true, Ordering::SeqCst);
    let client = session_client(&url, Arc::new(MemoryTokenStore::default()))
        .get_client()
        .await
        .unwrap();
    client.login(TEST_EMAIL, TEST_PASSWORD).await.unwrap();

    match client.create_order(&order_request()).await {
        Err(OneEntryError::Api { status, message }) => {
            assert_eq!(status, 422);
            assert_eq!(message, "payment account is disabled");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_orders_skip_invalid_records_newest_first() {
    let (url, _backend) = MockBackend::spawn().await;
    let client = session_client(&url, Arc::new(MemoryTokenStore::default()))
        .get_client()
        .await
        .unwrap();
    client.login(TEST_EMAIL, TEST_PASSWORD).await.unwrap();

    let orders = client.orders(0, 30).await.unwrap();
    let ids: Vec<OrderId> = orders.iter().map(|order| order.id).collect();
    assert_eq!(ids, vec![OrderId::new(2), OrderId::new(1)]);
    assert_eq!(orders[1].total_sum, Money::from_cents(1200));
}

#[tokio::test]
async fn test_app_token_is_forwarded() {
    let (url, backend) = MockBackend::spawn().await;
    let client = session_client(&url, Arc::new(MemoryTokenStore::default()))
        .get_client()
        .await
        .unwrap();
    client.login(TEST_EMAIL, TEST_PASSWORD).await.unwrap();

    let seen = backend.app_tokens.lock().unwrap().clone();
    assert_eq!(seen, vec!["k3v9-Qm2x-Lp7w-Zr4t".to_string()]);
}

#[tokio::test]
async fn test_signup_registers_without_signing_in() {
    let (url, backend) = MockBackend::spawn().await;
    let store = Arc::new(MemoryTokenStore::default());
    let client = session_client(&url, store.clone())
        .get_client()
        .await
        .unwrap();

    let user = client
        .signup("Grace", "grace@example.com", "hopper-1906")
        .await
        .unwrap();
    assert_eq!(user.identifier, "grace@example.com");
    assert_eq!(user.display_name(), "Grace");
    assert!(store.current().is_none());

    let sent = backend.signups.lock().unwrap().clone();
    assert_eq!(sent[0]["formIdentifier"], "reg");
    assert_eq!(sent[0]["notificationData"]["email"], "grace@example.com");
}

#[tokio::test]
async fn test_signup_with_taken_identifier_is_rejected() {
    let (url, _backend) = MockBackend::spawn().await;
    let client = session_client(&url, Arc::new(MemoryTokenStore::default()))
        .get_client()
        .await
        .unwrap();

    match client.signup("Ada", TEST_EMAIL, TEST_PASSWORD).await {
        Err(OneEntryError::Api { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "User already exists");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_logout_revokes_and_forgets_credential() {
    let (url, backend) = MockBackend::spawn().await;
    let store = Arc::new(MemoryTokenStore::default());
    let client = session_client(&url, store.clone())
        .get_client()
        .await
        .unwrap();
    client.login(TEST_EMAIL, TEST_PASSWORD).await.unwrap();
    let issued = store.current().unwrap();

    client.logout().await.unwrap();
    assert!(store.current().is_none());
    assert_eq!(backend.logout_calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.current_user().await.unwrap(), None);

    // The revoked credential no longer exchanges, even if it was kept elsewhere.
    store.write(issued).await.unwrap();
    assert_eq!(client.current_user().await.unwrap(), None);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
}
