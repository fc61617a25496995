use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    EngineError, Money, ResultEngine,
    util::{format_hundredths, parse_hundredths},
};

/// A percentage stored as integer **basis points** (hundredths of a percent).
///
/// `33.34%` is `Percent::from_basis_points(3334)`; `100%` is
/// [`Percent::HUNDRED`]. Parsing follows the same rules as [`Money`].
///
/// ```rust
/// use engine::Percent;
///
/// let rate: Percent = "8".parse().unwrap();
/// assert_eq!(rate.basis_points(), 800);
/// assert_eq!(rate.to_string(), "8.00%");
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Percent(i64);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const HUNDRED: Percent = Percent(10_000);

    /// Basis points in one whole (100%).
    pub const BASIS_POINTS: i64 = 10_000;

    #[must_use]
    pub const fn from_basis_points(basis_points: i64) -> Self {
        Self(basis_points)
    }

    #[must_use]
    pub const fn basis_points(self) -> i64 {
        self.0
    }

    /// Applies the rate to `amount`, rounding half away from zero.
    pub fn of(self, amount: Money) -> ResultEngine<Money> {
        amount.scale_by_rational(self.0, Self::BASIS_POINTS)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", format_hundredths(self.0))
    }
}

impl FromStr for Percent {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed);
        parse_hundredths(trimmed, "percent").map(Percent)
    }
}
