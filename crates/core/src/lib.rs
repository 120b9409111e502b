//! Onstore Core - Shared commerce types.
//!
//! This crate provides the domain types used by every Onstore component:
//! - `storefront` - Backend-for-frontend serving the cart and checkout API
//! - `cli` - Command-line tools for the session store
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no session storage. Cart arithmetic lives here so that every
//! caller derives totals from the same projection.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, money, cart state, orders, statuses, credentials

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
