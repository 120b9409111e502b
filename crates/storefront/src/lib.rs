//! Onstore storefront library.
//!
//! Commerce session service for the storefront: the browsing-session cart,
//! the process-wide OneEntry session client, and checkout orchestration,
//! served as a JSON API. Exposed as a library so it can be tested and reused.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod oneentry;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
