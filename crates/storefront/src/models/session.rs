//! Session-related types.
//!
//! Everything the storefront keeps per browsing session lives in the
//! `tower-sessions` record behind the `HttpOnly` session cookie.

/// Session keys for commerce state.
pub mod keys {
    /// Key for the backend refresh credential.
    pub const REFRESH_TOKEN: &str = "refresh_token";

    /// Key for the persisted cart.
    pub const CART: &str = "cart";
}
