use serde::{Deserialize, Serialize};

/// How far strategy sums may drift from their target before validation
/// fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    /// Allowed distance of the percentage sum from 100%, in basis points.
    pub percent_basis_points: i64,
    /// Allowed distance of exact-amount, itemized and payer sums from the
    /// expense total, in minor units.
    pub amount_minor: i64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            percent_basis_points: 1,
            amount_minor: 0,
        }
    }
}

/// Engine tunables.
///
/// Every field has a default, so an empty settings section deserializes to
/// [`EngineConfig::default`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tolerance: Tolerance,
    /// A settlement record within this many minor units of its bound counts as
    /// fully settled.
    pub settlement_epsilon_minor: i64,
    /// How many times a settlement is planned and committed before a conflict
    /// is surfaced to the caller.
    pub max_settlement_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            settlement_epsilon_minor: 1,
            max_settlement_attempts: 5,
        }
    }
}
