//! Core types for Onstore.
//!
//! This module provides type-safe wrappers for the commerce domain.

pub mod cart;
pub mod credential;
pub mod id;
pub mod money;
pub mod order;
pub mod stats;
pub mod status;
pub mod user;

pub use cart::{CartItem, CartState, CartTotals, TAX_RATE};
pub use credential::RefreshToken;
pub use id::*;
pub use money::{Money, MoneyError};
pub use order::{Order, OrderLine, OrderRequest, OrderedProduct, sort_newest_first};
pub use stats::{OrderStats, PeriodStats};
pub use status::OrderStatus;
pub use user::UserEntity;
