//! Participants of an expense and their per-strategy inputs.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Money, Percent, ResultEngine, SplitKind};

/// Stable participant identifier, unique within one expense.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for ParticipantId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// The strategy-specific value a participant carries.
///
/// Only the variant matching the active strategy exists on a participant:
/// switching strategy rebuilds the input instead of leaving the old value
/// around.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SplitInput {
    #[default]
    None,
    Percent(Percent),
    Exact(Money),
    Shares(u32),
}

impl SplitInput {
    /// The input a participant starts with under `kind`.
    #[must_use]
    pub fn blank_for(kind: SplitKind) -> Self {
        match kind {
            SplitKind::Percentage => Self::Percent(Percent::ZERO),
            SplitKind::ExactAmounts => Self::Exact(Money::ZERO),
            SplitKind::Shares => Self::Shares(1),
            SplitKind::Equally | SplitKind::Itemized | SplitKind::TwoPerson => Self::None,
        }
    }

    /// Returns `true` if the input is addressable under `kind`.
    #[must_use]
    pub fn matches(self, kind: SplitKind) -> bool {
        matches!(
            (self, kind),
            (Self::Percent(_), SplitKind::Percentage)
                | (Self::Exact(_), SplitKind::ExactAmounts)
                | (Self::Shares(_), SplitKind::Shares)
                | (
                    Self::None,
                    SplitKind::Equally | SplitKind::Itemized | SplitKind::TwoPerson
                )
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub input: SplitInput,
}

impl Participant {
    #[must_use]
    pub fn new(id: ParticipantId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            input: SplitInput::None,
        }
    }

    #[must_use]
    pub fn with_input(mut self, input: SplitInput) -> Self {
        self.input = input;
        self
    }
}

/// Per-participant amounts, kept in participant order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    entries: Vec<(ParticipantId, Money)>,
}

impl Allocation {
    /// Pairs `participants` with `amounts` positionally.
    #[must_use]
    pub fn zip(participants: &[Participant], amounts: Vec<Money>) -> Self {
        Self {
            entries: participants.iter().map(|p| p.id).zip(amounts).collect(),
        }
    }

    /// Every participant gets zero.
    #[must_use]
    pub fn zeroed(participants: &[Participant]) -> Self {
        Self {
            entries: participants.iter().map(|p| (p.id, Money::ZERO)).collect(),
        }
    }

    /// Amount for `id`, zero if the participant is absent.
    #[must_use]
    pub fn get(&self, id: ParticipantId) -> Money {
        self.entries
            .iter()
            .find_map(|(pid, amount)| (*pid == id).then_some(*amount))
            .unwrap_or(Money::ZERO)
    }

    pub(crate) fn add_to(&mut self, id: ParticipantId, amount: Money) {
        if let Some((_, current)) = self.entries.iter_mut().find(|(pid, _)| *pid == id) {
            *current += amount;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParticipantId, Money)> + '_ {
        self.entries.iter().copied()
    }

    /// Sum of every entry; fails with `InvalidAmount` if it overflows.
    pub fn total(&self) -> ResultEngine<Money> {
        Money::try_sum(self.iter().map(|(_, amount)| amount))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
