//! Durable storage for the backend refresh credential.
//!
//! In the storefront the credential lives in the browsing session record
//! (cookie is `HttpOnly`, so page scripts never see it). The session client is
//! process-wide, so it cannot hold a request's `Session` directly; instead the
//! `token_scope` middleware installs the current request's session in a
//! task-local and [`SessionTokenStore`] resolves it at call time.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use onstore_core::RefreshToken;
use thiserror::Error;
use tower_sessions::Session;

use crate::models::session_keys;

tokio::task_local! {
    static REQUEST_SESSION: Session;
}

/// Errors reading or writing the credential slot.
#[derive(Debug, Error)]
pub enum TokenStoreError {
    /// The session store failed.
    #[error("session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// No browsing session is in scope for this task.
    #[error("no browsing session in scope")]
    NoRequestScope,
}

/// A single-slot store for the refresh credential.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read the stored credential, if any.
    async fn read(&self) -> Result<Option<RefreshToken>, TokenStoreError>;

    /// Replace the stored credential.
    async fn write(&self, token: RefreshToken) -> Result<(), TokenStoreError>;

    /// Empty the slot.
    async fn clear(&self) -> Result<(), TokenStoreError>;
}

/// Run `fut` with `session` as the browsing session seen by [`SessionTokenStore`].
pub async fn scope<F: Future>(session: Session, fut: F) -> F::Output {
    REQUEST_SESSION.scope(session, fut).await
}

/// The browsing session installed by [`scope`] for this task, if any.
pub(crate) fn current_session() -> Option<Session> {
    REQUEST_SESSION.try_with(Clone::clone).ok()
}

/// Credential slot inside the browsing session of the current request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionTokenStore;

#[async_trait]
impl TokenStore for SessionTokenStore {
    async fn read(&self) -> Result<Option<RefreshToken>, TokenStoreError> {
        let Some(session) = current_session() else {
            tracing::debug!("refresh token read outside a request scope");
            return Ok(None);
        };

        let token = session
            .get::<RefreshToken>(session_keys::REFRESH_TOKEN)
            .await?;
        Ok(token)
    }

    async fn write(&self, token: RefreshToken) -> Result<(), TokenStoreError> {
        let session = current_session().ok_or(TokenStoreError::NoRequestScope)?;
        session.insert(session_keys::REFRESH_TOKEN, token).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        let session = current_session().ok_or(TokenStoreError::NoRequestScope)?;
        session
            .remove::<RefreshToken>(session_keys::REFRESH_TOKEN)
            .await?;
        Ok(())
    }
}

/// In-process credential slot.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<RefreshToken>>,
}

impl MemoryTokenStore {
    /// Create a store holding `token`.
    #[must_use]
    pub fn with_token(token: RefreshToken) -> Self {
        Self {
            slot: Mutex::new(Some(token)),
        }
    }

    /// Current slot contents.
    #[must_use]
    pub fn current(&self) -> Option<RefreshToken> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn read(&self) -> Result<Option<RefreshToken>, TokenStoreError> {
        Ok(self.current())
    }

    async fn write(&self, token: RefreshToken) -> Result<(), TokenStoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
        Ok(())
    }

    async fn clear(&self) -> Result<(), TokenStoreError> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn token(value: &str) -> RefreshToken {
        RefreshToken::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryTokenStore::default();
        assert!(store.read().await.unwrap().is_none());

        store.write(token("rt-1")).await.unwrap();
        store.write(token("rt-2")).await.unwrap();
        assert_eq!(store.read().await.unwrap(), Some(token("rt-2")));

        store.clear().await.unwrap();
        assert!(store.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_store_outside_scope() {
        let store = SessionTokenStore;
        assert!(store.read().await.unwrap().is_none());
        assert!(matches!(
            store.write(token("rt-1")).await,
            Err(TokenStoreError::NoRequestScope)
        ));
    }

    #[tokio::test]
    async fn test_session_store_uses_scoped_session() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let store = SessionTokenStore;

        scope(session.clone(), async {
            assert!(store.read().await.unwrap().is_none());
            store.write(token("rt-rotated")).await.unwrap();
            assert_eq!(store.read().await.unwrap(), Some(token("rt-rotated")));
        })
        .await;

        let stored: Option<RefreshToken> = session
            .get(session_keys::REFRESH_TOKEN)
            .await
            .unwrap();
        assert_eq!(stored, Some(token("rt-rotated")));

        scope(session.clone(), store.clear()).await.unwrap();
        let stored: Option<RefreshToken> = session
            .get(session_keys::REFRESH_TOKEN)
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = Arc::new(MemoryStore::default());
        let first = Session::new(None, store.clone(), None);
        let second = Session::new(None, store, None);

        scope(first, SessionTokenStore.write(token("rt-first")))
            .await
            .unwrap();
        let seen = scope(second, SessionTokenStore.read()).await.unwrap();
        assert!(seen.is_none());
    }
}
