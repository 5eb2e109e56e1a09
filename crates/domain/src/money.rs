//! Monetary amounts in minor units.

use serde::{Deserialize, Serialize};

/// An amount of money stored in minor units (piastres, cents).
///
/// Operators saturate at the `i64` bounds. Use the `checked_` methods where
/// an overflow must be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Whole currency units, e.g. `Money::from_units(10)` is 10.00.
    pub const fn from_units(units: i64) -> Self {
        Self(units.saturating_mul(100))
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub fn minor(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn times(&self, quantity: u32) -> Money {
        Money(self.0.saturating_mul(i64::from(quantity)))
    }

    pub fn checked_times(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        let unit = Money::from_units(10);
        assert_eq!(unit.times(2) + Money::from_units(20), Money::from_units(40));
        assert_eq!(Money::from_units(5) - Money::from_minor(250), Money::from_minor(250));
        let total: Money = [Money::from_units(1), Money::from_units(2)].into_iter().sum();
        assert_eq!(total, Money::from_units(3));
    }

    #[test]
    fn overflow_is_detected_or_saturated() {
        let max = Money::from_minor(i64::MAX);
        assert_eq!(max.checked_times(2), None);
        assert_eq!(max.checked_add(Money::from_minor(1)), None);
        assert_eq!(
            Money::from_units(3).checked_times(2),
            Some(Money::from_units(6))
        );
        assert_eq!(max.times(2), max);
        assert_eq!(max + Money::from_minor(1), max);
        assert_eq!(Money::from_minor(i64::MIN) - Money::from_minor(1), Money::from_minor(i64::MIN));
        assert_eq!(Money::from_units(i64::MAX), max);
    }

    #[test]
    fn displays_two_decimals() {
        assert_eq!(Money::from_minor(4005).to_string(), "40.05");
        assert_eq!(Money::from_minor(-150).to_string(), "-1.50");
    }
}
