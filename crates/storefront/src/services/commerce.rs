//! Account and order collaborators, and their OneEntry implementation.

use std::sync::Arc;

use async_trait::async_trait;
use onstore_core::{Order, OrderRequest, UserEntity};

use super::CommerceError;
use crate::oneentry::{ORDERS_PAGE_SIZE, OneEntryBootstrap, OneEntryClient, OneEntryError};
use crate::session::SessionClient;

/// Session query and sign-in.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// The signed-in user, or `None` for an anonymous session.
    async fn current_user(&self) -> Result<Option<UserEntity>, CommerceError>;

    /// Sign in; the issued credential is stored in the browsing session.
    async fn login(&self, identifier: &str, password: &str) -> Result<(), CommerceError>;

    /// Register a new user. Does not sign in.
    async fn signup(
        &self,
        name: &str,
        identifier: &str,
        password: &str,
    ) -> Result<UserEntity, CommerceError>;

    /// Drop the browsing session's credential.
    async fn logout(&self) -> Result<(), CommerceError>;

    /// Make sure the backend client can be constructed.
    async fn ensure_ready(&self) -> Result<(), CommerceError>;
}

/// Order submission and history.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Submit an order and return the redirect target for payment.
    async fn submit_order(&self, request: &OrderRequest) -> Result<String, CommerceError>;

    /// The signed-in user's orders, newest first.
    async fn list_orders(&self) -> Result<Vec<Order>, CommerceError>;
}

/// [`AccountService`] and [`OrderService`] backed by OneEntry.
#[derive(Clone)]
pub struct OneEntryCommerce {
    sessions: Arc<SessionClient<OneEntryBootstrap>>,
}

impl OneEntryCommerce {
    #[must_use]
    pub const fn new(sessions: Arc<SessionClient<OneEntryBootstrap>>) -> Self {
        Self { sessions }
    }

    async fn client(&self) -> Result<Arc<OneEntryClient>, CommerceError> {
        Ok(self.sessions.get_client().await?)
    }
}

fn signed_in(error: OneEntryError) -> CommerceError {
    match error {
        OneEntryError::Unauthorized => CommerceError::Unauthorized,
        other => CommerceError::Backend(other),
    }
}

#[async_trait]
impl AccountService for OneEntryCommerce {
    async fn current_user(&self) -> Result<Option<UserEntity>, CommerceError> {
        Ok(self.client().await?.current_user().await?)
    }

    async fn login(&self, identifier: &str, password: &str) -> Result<(), CommerceError> {
        self.client()
            .await?
            .login(identifier, password)
            .await
            .map_err(|e| match e {
                OneEntryError::Unauthorized => CommerceError::InvalidCredentials,
                other => CommerceError::Backend(other),
            })
    }

    async fn signup(
        &self,
        name: &str,
        identifier: &str,
        password: &str,
    ) -> Result<UserEntity, CommerceError> {
        self.client()
            .await?
            .signup(name, identifier, password)
            .await
            .map_err(|e| match e {
                OneEntryError::Api { status, message } if (400..500).contains(&status) => {
                    CommerceError::Rejected(message)
                }
                other => CommerceError::Backend(other),
            })
    }

    async fn logout(&self) -> Result<(), CommerceError> {
        Ok(self.client().await?.logout().await?)
    }

    async fn ensure_ready(&self) -> Result<(), CommerceError> {
        self.client().await.map(|_| ())
    }
}

#[async_trait]
impl OrderService for OneEntryCommerce {
    async fn submit_order(&self, request: &OrderRequest) -> Result<String, CommerceError> {
        self.client()
            .await?
            .create_order(request)
            .await
            .map_err(signed_in)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, CommerceError> {
        self.client()
            .await?
            .orders(0, ORDERS_PAGE_SIZE)
            .await
            .map_err(signed_in)
    }
}
