//! Spending summaries over a customer's order history.
//!
//! Calendar buckets are evaluated in UTC against a caller-supplied `now`.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::money::{Money, MoneyError};
use super::order::Order;

/// Order count and amount spent over one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub orders: u32,
    pub spent: Money,
}

impl PeriodStats {
    fn record(&mut self, amount: Money) -> Result<(), MoneyError> {
        self.spent = self.spent.checked_add(amount)?;
        self.orders = self.orders.saturating_add(1);
        Ok(())
    }
}

/// Lifetime, current-year and current-month totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStats {
    pub lifetime: PeriodStats,
    pub year: PeriodStats,
    pub month: PeriodStats,
}

impl OrderStats {
    /// Fold `orders` into totals relative to `now`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if a total is not representable.
    pub fn from_orders(orders: &[Order], now: DateTime<Utc>) -> Result<Self, MoneyError> {
        orders.iter().try_fold(Self::default(), |mut stats, order| {
            let placed = order.created_date;
            stats.lifetime.record(order.total_sum)?;
            if placed.year() == now.year() {
                stats.year.record(order.total_sum)?;
                if placed.month() == now.month() {
                    stats.month.record(order.total_sum)?;
                }
            }
            Ok(stats)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use super::*;
    use crate::types::id::OrderId;
    use crate::types::status::OrderStatus;

    fn order(id: i32, (year, month, day): (i32, u32, u32), cents: u32) -> Order {
        Order {
            id: OrderId::new(id),
            created_date: Utc.with_ymd_and_hms(year, month, day, 9, 30, 0).unwrap(),
            status: OrderStatus::Delivered,
            total_sum: Money::from_cents(cents),
            products: vec![],
        }
    }

    #[test]
    fn test_buckets_by_calendar_period() {
        let now = Utc.with_ymd_and_hms(2026, 5, 20, 0, 0, 0).unwrap();
        let orders = vec![
            order(1, (2026, 5, 1), 2750),
            order(2, (2026, 5, 19), 1000),
            order(3, (2026, 3, 1), 1200),
            order(4, (2025, 5, 10), 9900),
        ];

        let stats = OrderStats::from_orders(&orders, now).unwrap();
        assert_eq!(stats.lifetime.orders, 4);
        assert_eq!(stats.lifetime.spent, Money::from_cents(14_850));
        assert_eq!(stats.year.orders, 3);
        assert_eq!(stats.year.spent, Money::from_cents(4950));
        assert_eq!(stats.month.orders, 2);
        assert_eq!(stats.month.spent, Money::from_cents(3750));
    }

    #[test]
    fn test_same_month_of_another_year_is_not_this_month() {
        let now = Utc.with_ymd_and_hms(2026, 5, 20, 0, 0, 0).unwrap();
        let stats = OrderStats::from_orders(&[order(1, (2025, 5, 20), 500)], now).unwrap();
        assert_eq!(stats.lifetime.orders, 1);
        assert_eq!(stats.year, PeriodStats::default());
        assert_eq!(stats.month, PeriodStats::default());
    }

    #[test]
    fn test_no_orders() {
        let stats = OrderStats::from_orders(&[], Utc::now()).unwrap();
        assert_eq!(stats, OrderStats::default());
    }

    #[test]
    fn test_unrepresentable_total_is_an_error() {
        let mut big = order(1, (2026, 1, 1), 0);
        big.total_sum = Money::new(Decimal::MAX).unwrap();
        let result = OrderStats::from_orders(&[big.clone(), big], Utc::now());
        assert_eq!(result, Err(MoneyError::Overflow));
    }
}
