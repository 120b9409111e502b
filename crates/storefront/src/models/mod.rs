//! Types stored in the browsing session.

pub mod session;

pub use session::keys as session_keys;
