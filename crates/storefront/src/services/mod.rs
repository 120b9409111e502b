//! Business logic services for storefront.
//!
//! # Services
//!
//! - `commerce` - Account and order collaborators backed by OneEntry
//! - `checkout` - Checkout orchestration over the cart and those collaborators

pub mod checkout;
mod commerce;
mod error;

pub use checkout::{CheckoutError, CheckoutOrchestrator, CheckoutOutcome};
pub use commerce::{AccountService, OneEntryCommerce, OrderService};
pub use error::CommerceError;
