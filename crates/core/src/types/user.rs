//! Authenticated customer identity.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// The signed-in customer as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntity {
    pub id: UserId,
    /// Login identifier (usually the email address).
    pub identifier: String,
    /// Display name, when the profile has one.
    pub name: Option<String>,
}

impl UserEntity {
    /// Name for greetings, falling back to the identifier.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.identifier)
    }
}
