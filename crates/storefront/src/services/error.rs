//! Commerce service error types.

use thiserror::Error;

use crate::oneentry::OneEntryError;
use crate::session::SessionError;

/// Errors from account and order services.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Nobody is signed in, or the session credential was rejected.
    #[error("not signed in")]
    Unauthorized,

    /// Wrong identifier or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The backend refused the input, e.g. a taken identifier on sign-up.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The backend client is unavailable.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The backend rejected or failed the call.
    #[error("backend error: {0}")]
    Backend(#[from] OneEntryError),
}
