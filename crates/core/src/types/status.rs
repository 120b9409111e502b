//! Order status as shown in the customer's order history.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Order fulfillment status.
///
/// The backend reports free-form status identifiers; anything not recognized
/// is treated as still processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Parse a backend status identifier, falling back to `Processing`.
    #[must_use]
    pub fn from_identifier(identifier: &str) -> Self {
        identifier.parse().unwrap_or_default()
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processing" | "inprogress" | "in_progress" | "new" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" | "completed" => Ok(Self::Delivered),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}
