use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    Allocation, Money, Participant, ParticipantId, Percent, ResultEngine, SplitViolation,
    Tolerance,
};

use super::{SplitOutcome, SplitWarning};

/// One line of an itemized bill.
///
/// Weights are relative within the line: `{a: 1, b: 1}` and `{a: 5, b: 5}`
/// split the same way. Participants missing from `weights` get nothing from
/// this line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemizedLine {
    pub name: String,
    pub amount: Money,
    #[serde(default)]
    pub weights: BTreeMap<ParticipantId, u32>,
}

impl ItemizedLine {
    #[must_use]
    pub fn new(name: impl Into<String>, amount: Money) -> Self {
        Self {
            name: name.into(),
            amount,
            weights: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn weight(mut self, participant: ParticipantId, weight: u32) -> Self {
        self.weights.insert(participant, weight);
        self
    }

    fn is_unassigned(&self) -> bool {
        self.weights.values().all(|w| *w == 0)
    }
}

/// Lines plus the flat tax and tip rates applied on top of them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemizedBill {
    pub lines: Vec<ItemizedLine>,
    #[serde(default)]
    pub tax_rate: Percent,
    #[serde(default)]
    pub tip_rate: Percent,
}

/// Subtotal, tax and tip of an [`ItemizedBill`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemizedBreakdown {
    pub subtotal: Money,
    pub tax: Money,
    pub tip: Money,
}

impl ItemizedBreakdown {
    /// Subtotal plus tax plus tip; fails with `InvalidAmount` if it overflows.
    pub fn total(&self) -> ResultEngine<Money> {
        Money::try_sum([self.subtotal, self.tax, self.tip])
    }
}

impl ItemizedBill {
    #[must_use]
    pub fn new(tax_rate: Percent, tip_rate: Percent) -> Self {
        Self {
            lines: Vec::new(),
            tax_rate,
            tip_rate,
        }
    }

    #[must_use]
    pub fn line(mut self, line: ItemizedLine) -> Self {
        self.lines.push(line);
        self
    }

    /// Subtotal of every line, tax on the subtotal and tip on subtotal plus
    /// tax.
    pub fn breakdown(&self) -> ResultEngine<ItemizedBreakdown> {
        if self.tax_rate.basis_points() < 0 {
            return Err(SplitViolation::NegativeRate("tax".to_string()).into());
        }
        if self.tip_rate.basis_points() < 0 {
            return Err(SplitViolation::NegativeRate("tip".to_string()).into());
        }
        let subtotal = Money::try_sum(self.lines.iter().map(|line| line.amount))?;
        let tax = self.tax_rate.of(subtotal)?;
        let tip = self.tip_rate.of(Money::try_sum([subtotal, tax])?)?;
        Ok(ItemizedBreakdown { subtotal, tax, tip })
    }

    pub(super) fn compute_owed(
        &self,
        participants: &[Participant],
        total: Money,
        tolerance: Tolerance,
    ) -> ResultEngine<SplitOutcome> {
        if self.lines.is_empty() {
            return Err(SplitViolation::NoItems.into());
        }

        let known: HashSet<ParticipantId> = participants.iter().map(|p| p.id).collect();
        for line in &self.lines {
            if line.amount.is_negative() {
                return Err(SplitViolation::NegativeAmount {
                    label: format!("line \"{}\"", line.name),
                    amount: line.amount,
                }
                .into());
            }
            if let Some(unknown) = line.weights.keys().find(|id| !known.contains(id)) {
                return Err(SplitViolation::UnknownParticipant(*unknown).into());
            }
        }

        let breakdown = self.breakdown()?;
        let expected = breakdown.total()?;
        if (expected - total).abs().minor() > tolerance.amount_minor {
            return Err(SplitViolation::ItemizedTotal {
                expected,
                actual: total,
            }
            .into());
        }

        let mut owed = Allocation::zeroed(participants);
        let mut warnings = Vec::new();
        let mut unallocated = Money::ZERO;

        for line in &self.lines {
            if line.is_unassigned() {
                warnings.push(SplitWarning::UnassignedLine {
                    name: line.name.clone(),
                    amount: line.amount,
                });
                unallocated += line.amount;
                continue;
            }
            let weights: Vec<u64> = participants
                .iter()
                .map(|p| u64::from(line.weights.get(&p.id).copied().unwrap_or(0)))
                .collect();
            let shares = line.amount.allocate(&weights)?;
            for (participant, share) in participants.iter().zip(shares) {
                owed.add_to(participant.id, share);
            }
        }

        // Tax and tip are shared equally, not by line weight.
        let extras = (breakdown.tax + breakdown.tip).distribute_evenly(participants.len())?;
        for (participant, share) in participants.iter().zip(extras) {
            owed.add_to(participant.id, share);
        }

        Ok(SplitOutcome {
            owed,
            warnings,
            unallocated,
            breakdown: Some(breakdown),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineError, SplitStrategy};

    fn pair() -> Vec<Participant> {
        vec![
            Participant::new(ParticipantId::new(), "Ann"),
            Participant::new(ParticipantId::new(), "Bo"),
        ]
    }

    #[test]
    fn tax_and_tip_are_shared_equally() {
        let people = pair();
        let bill = ItemizedBill::new(Percent::from_basis_points(800), Percent::from_basis_points(1500))
            .line(
                ItemizedLine::new("pizza", Money::new(5000))
                    .weight(people[0].id, 1)
                    .weight(people[1].id, 1),
            );
        let breakdown = bill.breakdown().unwrap();
        assert_eq!(breakdown.subtotal, Money::new(5000));
        assert_eq!(breakdown.tax, Money::new(400));
        assert_eq!(breakdown.tip, Money::new(810));

        let outcome = SplitStrategy::Itemized(bill)
            .compute_owed(&people, Money::new(6210), Tolerance::default())
            .unwrap();
        assert_eq!(outcome.owed.get(people[0].id), Money::new(3105));
        assert_eq!(outcome.owed.get(people[1].id), Money::new(3105));
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn unassigned_line_is_flagged_and_kept_in_subtotal() {
        let people = pair();
        let bill = ItemizedBill::default()
            .line(ItemizedLine::new("salad", Money::new(1000)).weight(people[0].id, 1))
            .line(ItemizedLine::new("wine", Money::new(600)).weight(people[1].id, 0));

        let outcome = SplitStrategy::Itemized(bill)
            .compute_owed(&people, Money::new(1600), Tolerance::default())
            .unwrap();
        assert_eq!(outcome.owed.get(people[0].id), Money::new(1000));
        assert_eq!(outcome.owed.get(people[1].id), Money::ZERO);
        assert_eq!(outcome.unallocated, Money::new(600));
        assert_eq!(outcome.breakdown.map(|b| b.subtotal), Some(Money::new(1600)));
        assert_eq!(
            outcome.warnings,
            vec![SplitWarning::UnassignedLine {
                name: "wine".to_string(),
                amount: Money::new(600)
            }]
        );
    }

    #[test]
    fn total_must_match_the_bill() {
        let people = pair();
        let bill = ItemizedBill::default()
            .line(ItemizedLine::new("bread", Money::new(300)).weight(people[0].id, 1));
        let err = SplitStrategy::Itemized(bill)
            .compute_owed(&people, Money::new(400), Tolerance::default())
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::SplitValidation(SplitViolation::ItemizedTotal {
                expected: Money::new(300),
                actual: Money::new(400)
            })
        );
    }

    #[test]
    fn weights_for_strangers_are_rejected() {
        let people = pair();
        let stranger = ParticipantId::new();
        let bill = ItemizedBill::default()
            .line(ItemizedLine::new("bread", Money::new(300)).weight(stranger, 1));
        let err = SplitStrategy::Itemized(bill)
            .compute_owed(&people, Money::new(300), Tolerance::default())
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::SplitValidation(SplitViolation::UnknownParticipant(stranger))
        );
    }

    #[test]
    fn oversized_lines_are_invalid() {
        let people = pair();
        let bill = ItemizedBill::default()
            .line(ItemizedLine::new("yacht", Money::new(i64::MAX)).weight(people[0].id, 1))
            .line(ItemizedLine::new("tip jar", Money::new(1)).weight(people[1].id, 1));
        let err = SplitStrategy::Itemized(bill)
            .compute_owed(&people, Money::new(i64::MAX), Tolerance::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));

        let breakdown = ItemizedBreakdown {
            subtotal: Money::new(i64::MAX),
            tax: Money::ZERO,
            tip: Money::new(1),
        };
        assert!(matches!(breakdown.total(), Err(EngineError::InvalidAmount(_))));
    }

    #[test]
    fn empty_bill_is_rejected() {
        let err = SplitStrategy::Itemized(ItemizedBill::default())
            .compute_owed(&pair(), Money::new(300), Tolerance::default())
            .unwrap_err();
        assert_eq!(err, EngineError::SplitValidation(SplitViolation::NoItems));
    }
}
