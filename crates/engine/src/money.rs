use std::{
    cmp::Ordering,
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    EngineError, ResultEngine,
    util::{format_hundredths, parse_hundredths},
};

/// Signed money amount represented as **integer minor units** (cents).
///
/// Use this type for **all** monetary values in the engine (totals, shares,
/// paid amounts, settlements) to avoid floating-point drift. Every division
/// goes through [`Money::distribute_evenly`] or [`Money::allocate`], which
/// hand out the rounding residual one minor unit at a time so the parts always
/// add up to the original value.
///
/// # Examples
///
/// ```rust
/// use engine::Money;
///
/// let amount = Money::new(12_34);
/// assert_eq!(amount.minor(), 1234);
/// assert_eq!(amount.to_string(), "12.34");
///
/// let parts = Money::new(10_00).distribute_evenly(3).unwrap();
/// assert_eq!(parts, vec![Money::new(334), Money::new(333), Money::new(333)]);
/// ```
///
/// Parsing from user input (accepts `.` or `,` as decimal separator; rejects >
/// 2 decimals):
///
/// ```rust
/// use engine::Money;
///
/// assert_eq!("10".parse::<Money>().unwrap().minor(), 1000);
/// assert_eq!("10,5".parse::<Money>().unwrap().minor(), 1050);
/// assert!("12.345".parse::<Money>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Number of fraction digits carried by the minor units.
    pub const SCALE: u8 = 2;

    /// Creates a new amount from integer minor units.
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    #[must_use]
    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Sum of `amounts`, rejected as [`EngineError::InvalidAmount`] when it
    /// does not fit.
    pub fn try_sum(amounts: impl IntoIterator<Item = Money>) -> ResultEngine<Money> {
        amounts.into_iter().try_fold(Money::ZERO, |acc, amount| {
            acc.checked_add(amount).ok_or_else(|| {
                EngineError::InvalidAmount(format!("adding {amount} to {acc} overflows"))
            })
        })
    }

    /// Multiplies by `numerator / denominator`, rounding half away from zero.
    ///
    /// The intermediate product is computed on 128 bits, so
    /// `Money::new(i64::MAX).scale_by_rational(1, 1)` cannot overflow.
    pub fn scale_by_rational(self, numerator: i64, denominator: i64) -> ResultEngine<Money> {
        if denominator == 0 {
            return Err(EngineError::InvalidAmount(
                "cannot scale by a zero denominator".to_string(),
            ));
        }
        let product = i128::from(self.0) * i128::from(numerator);
        let denominator = i128::from(denominator);
        let mut quotient = product / denominator;
        let remainder = product % denominator;
        if remainder.abs() * 2 >= denominator.abs() {
            quotient += product.signum() * denominator.signum();
        }
        i64::try_from(quotient)
            .map(Money)
            .map_err(|_| EngineError::InvalidAmount("amount too large".to_string()))
    }

    /// Splits the amount into `parts` shares that add up exactly to `self`.
    ///
    /// The first `k` shares get one extra minor unit, where `k` is the
    /// remainder of the division.
    pub fn distribute_evenly(self, parts: usize) -> ResultEngine<Vec<Money>> {
        if parts == 0 {
            return Err(EngineError::InvalidAmount(
                "cannot distribute into zero parts".to_string(),
            ));
        }
        self.allocate(&vec![1; parts])
    }

    /// Splits the amount proportionally to `weights`.
    ///
    /// Each share is floored first; the leftover minor units go one each to
    /// the first recipients with a non-zero weight, in order. Zero-weight
    /// recipients always get zero.
    pub fn allocate(self, weights: &[u64]) -> ResultEngine<Vec<Money>> {
        let weight_total: u128 = weights.iter().map(|w| u128::from(*w)).sum();
        if weight_total == 0 {
            return Err(EngineError::InvalidAmount(
                "cannot allocate over zero weights".to_string(),
            ));
        }

        let magnitude = u128::from(self.0.unsigned_abs());
        let mut shares: Vec<u128> = weights
            .iter()
            .map(|w| magnitude * u128::from(*w) / weight_total)
            .collect();
        let mut residual = magnitude - shares.iter().sum::<u128>();
        for (share, weight) in shares.iter_mut().zip(weights) {
            if residual == 0 {
                break;
            }
            if *weight > 0 {
                *share += 1;
                residual -= 1;
            }
        }

        let sign = if self.0 < 0 { -1 } else { 1 };
        shares
            .into_iter()
            .map(|share| {
                i64::try_from(share)
                    .map(|v| Money(v * sign))
                    .map_err(|_| EngineError::InvalidAmount("amount too large".to_string()))
            })
            .collect()
    }

    /// Compares two amounts treating differences up to `epsilon_minor` as
    /// equal.
    #[must_use]
    pub fn compare_with_epsilon(self, other: Money, epsilon_minor: i64) -> Ordering {
        let diff = i128::from(self.0) - i128::from(other.0);
        if diff.abs() <= i128::from(epsilon_minor.max(0)) {
            Ordering::Equal
        } else {
            diff.cmp(&0)
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_hundredths(self.0))
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl FromStr for Money {
    type Err = EngineError;

    /// Parses a decimal string into minor units.
    ///
    /// Validation rules:
    /// - max 2 fractional digits (rejects `12.345`)
    /// - rejects empty/invalid strings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hundredths(s, "amount").map(Money)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_two_decimals() {
        assert_eq!(Money::new(0).to_string(), "0.00");
        assert_eq!(Money::new(1).to_string(), "0.01");
        assert_eq!(Money::new(1050).to_string(), "10.50");
        assert_eq!(Money::new(-1050).to_string(), "-10.50");
    }

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("10.5".parse::<Money>().unwrap().minor(), 1050);
        assert_eq!("10,50".parse::<Money>().unwrap().minor(), 1050);
        assert_eq!("-0.01".parse::<Money>().unwrap().minor(), -1);
        assert_eq!("  2.30 ".parse::<Money>().unwrap().minor(), 230);
    }

    #[test]
    fn parse_rejects_more_than_two_decimals() {
        assert!("12.345".parse::<Money>().is_err());
        assert!("0.001".parse::<Money>().is_err());
    }

    #[test]
    fn distribute_evenly_assigns_remainder_to_first_recipients() {
        let parts = Money::new(100).distribute_evenly(7).unwrap();
        assert_eq!(parts.iter().sum::<Money>(), Money::new(100));
        assert_eq!(parts[0], Money::new(15));
        assert_eq!(parts[1], Money::new(15));
        assert_eq!(parts[2], Money::new(14));
        assert_eq!(parts[6], Money::new(14));
    }

    #[test]
    fn distribute_evenly_keeps_sign() {
        let parts = Money::new(-10).distribute_evenly(3).unwrap();
        assert_eq!(parts, vec![Money::new(-4), Money::new(-3), Money::new(-3)]);
    }

    #[test]
    fn distribute_into_zero_parts_fails() {
        assert!(Money::new(100).distribute_evenly(0).is_err());
    }

    #[test]
    fn allocate_skips_zero_weights_when_assigning_residual() {
        let parts = Money::new(100).allocate(&[0, 1, 1, 1]).unwrap();
        assert_eq!(
            parts,
            vec![Money::ZERO, Money::new(34), Money::new(33), Money::new(33)]
        );
        assert!(Money::new(100).allocate(&[0, 0]).is_err());
    }

    #[test]
    fn try_sum_rejects_overflow() {
        let parts = [Money::new(1_00), Money::new(2_50)];
        assert_eq!(Money::try_sum(parts), Ok(Money::new(3_50)));
        let err = Money::try_sum([Money::new(i64::MAX), Money::new(1)]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }

    #[test]
    fn scale_by_rational_rounds_half_away_from_zero() {
        assert_eq!(Money::new(5000).scale_by_rational(800, 10_000).unwrap(), Money::new(400));
        assert_eq!(Money::new(5).scale_by_rational(1, 2).unwrap(), Money::new(3));
        assert_eq!(Money::new(-5).scale_by_rational(1, 2).unwrap(), Money::new(-3));
        assert_eq!(Money::new(4).scale_by_rational(1, 3).unwrap(), Money::new(1));
        assert!(Money::new(1).scale_by_rational(1, 0).is_err());
    }

    #[test]
    fn compare_with_epsilon_treats_close_values_as_equal() {
        assert_eq!(Money::new(100).compare_with_epsilon(Money::new(101), 1), Ordering::Equal);
        assert_eq!(Money::new(100).compare_with_epsilon(Money::new(102), 1), Ordering::Less);
        assert_eq!(Money::new(103).compare_with_epsilon(Money::new(100), 0), Ordering::Greater);
    }
}
