//! Non-negative monetary amounts using decimal arithmetic.
//!
//! The storefront works in a single currency, so `Money` carries only an
//! amount. Decimal arithmetic keeps `0.1 * 25` equal to `2.5` exactly.
//! Arithmetic is checked: an amount beyond the decimal range is an error,
//! never a panic.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors constructing a [`Money`] value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("amount must not be negative (got {0})")]
    Negative(Decimal),
    #[error("amount out of range")]
    Overflow,
}

/// A non-negative amount of money in the store currency's standard unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount, rejecting negative values.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] if `amount` is below zero.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Create an amount from whole cents (e.g., `1999` is `$19.99`).
    #[must_use]
    pub fn from_cents(cents: u32) -> Self {
        Self(Decimal::new(i64::from(cents), 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// `self + rhs`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the sum is out of range.
    pub fn checked_add(self, rhs: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// `self * quantity`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the product is out of range.
    pub fn checked_mul(self, quantity: u32) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Multiply by a non-negative decimal factor (e.g., a tax rate).
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the product is out of range.
    pub fn checked_scale(self, factor: Decimal) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(factor.abs())
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Sum `amounts`, failing on the first overflow.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the running sum leaves the range.
    pub fn checked_sum<I>(amounts: I) -> Result<Self, MoneyError>
    where
        I: IntoIterator<Item = Self>,
    {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, Self::checked_add)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}
