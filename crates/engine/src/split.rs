//! Split strategies: how an expense total turns into an owed amount per
//! participant.
//!
//! Every strategy hands out the total through [`Money::distribute_evenly`] or
//! [`Money::allocate`], so for the proportional strategies the owed amounts
//! always add up to the total to the minor unit.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    Allocation, EngineError, Money, Participant, ParticipantId, Percent, ResultEngine,
    SplitInput, SplitViolation, Tolerance,
};

pub use itemized::{ItemizedBill, ItemizedBreakdown, ItemizedLine};

mod itemized;

/// Discriminant of [`SplitStrategy`], used to pick per-participant inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitKind {
    Equally,
    Percentage,
    ExactAmounts,
    Shares,
    Itemized,
    TwoPerson,
}

impl SplitKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equally => "EQUALLY",
            Self::Percentage => "PERCENTAGE",
            Self::ExactAmounts => "EXACT_AMOUNTS",
            Self::Shares => "SHARES",
            Self::Itemized => "ITEMIZED",
            Self::TwoPerson => "TWO_PERSON",
        }
    }
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The rule deciding each participant's owed share of an expense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SplitStrategy {
    /// `total / N`, remainder to the first participants.
    Equally,
    /// `total * percent / 100` from each participant's [`SplitInput::Percent`].
    Percentage,
    /// Each participant's [`SplitInput::Exact`] passed through.
    ExactAmounts,
    /// `total * shares / sum(shares)` from [`SplitInput::Shares`].
    Shares,
    /// Per-line weighted split plus tax and tip shared equally.
    Itemized(ItemizedBill),
    /// One of exactly two participants owes the whole total.
    TwoPerson { full_ower: ParticipantId },
}

/// Non-fatal findings produced while splitting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum SplitWarning {
    /// An itemized line whose weights are all zero: nobody owes its amount.
    UnassignedLine { name: String, amount: Money },
}

impl fmt::Display for SplitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnassignedLine { name, amount } => {
                write!(f, "line \"{name}\" ({amount}) is not assigned to anyone")
            }
        }
    }
}

/// Result of [`SplitStrategy::compute_owed`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitOutcome {
    pub owed: Allocation,
    pub warnings: Vec<SplitWarning>,
    /// Part of the total that no participant owes (unassigned itemized lines).
    pub unallocated: Money,
    pub breakdown: Option<ItemizedBreakdown>,
}

impl SplitOutcome {
    fn plain(owed: Allocation) -> Self {
        Self {
            owed,
            warnings: Vec::new(),
            unallocated: Money::ZERO,
            breakdown: None,
        }
    }
}

impl SplitStrategy {
    #[must_use]
    pub fn kind(&self) -> SplitKind {
        match self {
            Self::Equally => SplitKind::Equally,
            Self::Percentage => SplitKind::Percentage,
            Self::ExactAmounts => SplitKind::ExactAmounts,
            Self::Shares => SplitKind::Shares,
            Self::Itemized(_) => SplitKind::Itemized,
            Self::TwoPerson { .. } => SplitKind::TwoPerson,
        }
    }

    /// Computes the owed amount of every participant.
    ///
    /// Fails with [`SplitViolation`] when the strategy invariant does not hold
    /// for the given participants and total.
    pub fn compute_owed(
        &self,
        participants: &[Participant],
        total: Money,
        tolerance: Tolerance,
    ) -> ResultEngine<SplitOutcome> {
        if participants.is_empty() {
            return Err(SplitViolation::NoParticipants.into());
        }
        if !total.is_positive() {
            return Err(SplitViolation::NonPositiveTotal(total).into());
        }
        let kind = self.kind();
        if let Some(participant) = participants.iter().find(|p| !p.input.matches(kind)) {
            return Err(SplitViolation::InputMismatch {
                participant: participant.id,
                expected: kind,
            }
            .into());
        }

        match self {
            Self::Equally => {
                let parts = total.distribute_evenly(participants.len())?;
                Ok(SplitOutcome::plain(Allocation::zip(participants, parts)))
            }
            Self::Percentage => split_by_percentage(participants, total, tolerance),
            Self::ExactAmounts => split_by_exact_amounts(participants, total, tolerance),
            Self::Shares => split_by_shares(participants, total),
            Self::Itemized(bill) => bill.compute_owed(participants, total, tolerance),
            Self::TwoPerson { full_ower } => split_two_person(participants, total, *full_ower),
        }
    }
}

fn split_by_percentage(
    participants: &[Participant],
    total: Money,
    tolerance: Tolerance,
) -> ResultEngine<SplitOutcome> {
    let mut weights = Vec::with_capacity(participants.len());
    for participant in participants {
        let SplitInput::Percent(percent) = participant.input else {
            continue;
        };
        let basis_points = u64::try_from(percent.basis_points())
            .map_err(|_| SplitViolation::NegativePercent(participant.id))?;
        weights.push(basis_points);
    }

    let sum = weights
        .iter()
        .try_fold(0i64, |acc, &bp| acc.checked_add(i64::try_from(bp).ok()?))
        .ok_or_else(|| EngineError::InvalidAmount("percentages overflow".to_string()))?;
    if (sum - Percent::BASIS_POINTS).abs() > tolerance.percent_basis_points {
        return Err(SplitViolation::PercentSum {
            actual_basis_points: sum,
        }
        .into());
    }

    // Weighting by the actual sum keeps the owed amounts complete when the
    // percentages are within tolerance but not exactly 100%.
    let parts = total.allocate(&weights)?;
    Ok(SplitOutcome::plain(Allocation::zip(participants, parts)))
}

fn split_by_exact_amounts(
    participants: &[Participant],
    total: Money,
    tolerance: Tolerance,
) -> ResultEngine<SplitOutcome> {
    let mut parts = Vec::with_capacity(participants.len());
    for participant in participants {
        let SplitInput::Exact(amount) = participant.input else {
            continue;
        };
        if amount.is_negative() {
            return Err(SplitViolation::NegativeAmount {
                label: format!("participant {}", participant.id),
                amount,
            }
            .into());
        }
        parts.push(amount);
    }

    let actual = Money::try_sum(parts.iter().copied())?;
    if (actual - total).abs().minor() > tolerance.amount_minor {
        return Err(SplitViolation::ExactSum {
            expected: total,
            actual,
        }
        .into());
    }

    Ok(SplitOutcome::plain(Allocation::zip(participants, parts)))
}

fn split_by_shares(participants: &[Participant], total: Money) -> ResultEngine<SplitOutcome> {
    let weights: Vec<u64> = participants
        .iter()
        .map(|p| match p.input {
            SplitInput::Shares(count) => u64::from(count),
            _ => 0,
        })
        .collect();
    if weights.iter().sum::<u64>() == 0 {
        return Err(SplitViolation::NonPositiveShares.into());
    }

    let parts = total.allocate(&weights)?;
    Ok(SplitOutcome::plain(Allocation::zip(participants, parts)))
}

fn split_two_person(
    participants: &[Participant],
    total: Money,
    full_ower: ParticipantId,
) -> ResultEngine<SplitOutcome> {
    if participants.len() != 2 {
        return Err(SplitViolation::ParticipantCount {
            kind: SplitKind::TwoPerson,
            expected: 2,
            actual: participants.len(),
        }
        .into());
    }
    if !participants.iter().any(|p| p.id == full_ower) {
        return Err(SplitViolation::UnknownParticipant(full_ower).into());
    }

    let mut owed = Allocation::zeroed(participants);
    owed.add_to(full_ower, total);
    Ok(SplitOutcome::plain(owed))
}
