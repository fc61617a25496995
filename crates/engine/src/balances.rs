//! Per-participant paid / owed / net balances of one expense.

use serde::{Deserialize, Serialize};

use crate::{
    ItemizedBreakdown, Money, Participant, ParticipantId, PayerSpec, ResultEngine, SplitStrategy,
    SplitViolation, SplitWarning, Tolerance,
};

/// Balance of one participant. `net = paid - owed`: positive means the group
/// owes them money.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRow {
    pub participant_id: ParticipantId,
    pub paid: Money,
    pub owed: Money,
    pub net: Money,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub rows: Vec<BalanceRow>,
    pub warnings: Vec<SplitWarning>,
    /// Part of the total nobody owes; the nets add up to this amount.
    pub unallocated: Money,
    pub breakdown: Option<ItemizedBreakdown>,
}

impl BalanceSheet {
    #[must_use]
    pub fn row(&self, participant_id: ParticipantId) -> Option<&BalanceRow> {
        self.rows.iter().find(|r| r.participant_id == participant_id)
    }

    /// Net of `participant_id`, zero if absent.
    #[must_use]
    pub fn net(&self, participant_id: ParticipantId) -> Money {
        self.row(participant_id).map_or(Money::ZERO, |r| r.net)
    }

    #[must_use]
    pub fn net_total(&self) -> Money {
        self.rows.iter().map(|r| r.net).sum()
    }

    /// Sum of the positive nets: how much the debtors owe the creditors.
    #[must_use]
    pub fn outstanding(&self) -> Money {
        self.rows
            .iter()
            .filter(|r| r.net.is_positive())
            .map(|r| r.net)
            .sum()
    }
}

/// Composes a split strategy and a payer allocation into net balances.
///
/// Stateless; one value can be shared freely between threads.
#[derive(Clone, Copy, Debug, Default)]
pub struct BalanceCalculator {
    tolerance: Tolerance,
}

impl BalanceCalculator {
    #[must_use]
    pub fn new(tolerance: Tolerance) -> Self {
        Self { tolerance }
    }

    /// Computes every participant's balance.
    ///
    /// Besides the strategy and payer checks, verifies that the nets add up to
    /// the unallocated amount (zero unless an itemized line is unassigned).
    pub fn compute(
        &self,
        participants: &[Participant],
        total: Money,
        strategy: &SplitStrategy,
        payer: &PayerSpec,
    ) -> ResultEngine<BalanceSheet> {
        let outcome = strategy.compute_owed(participants, total, self.tolerance)?;
        let paid = payer.compute_paid(participants, total, self.tolerance)?;

        let rows: Vec<BalanceRow> = participants
            .iter()
            .map(|p| {
                let paid = paid.get(p.id);
                let owed = outcome.owed.get(p.id);
                BalanceRow {
                    participant_id: p.id,
                    paid,
                    owed,
                    net: paid - owed,
                }
            })
            .collect();

        let sheet = BalanceSheet {
            rows,
            warnings: outcome.warnings,
            unallocated: outcome.unallocated,
            breakdown: outcome.breakdown,
        };

        // Exact and payer sums may each drift by the amount tolerance.
        let residual = sheet.net_total();
        let allowed = self.tolerance.amount_minor.saturating_mul(2);
        if (residual - sheet.unallocated).abs().minor() > allowed {
            return Err(SplitViolation::Conservation {
                expected: sheet.unallocated,
                residual,
            }
            .into());
        }

        Ok(sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineError, PayerShare};

    fn people(n: usize) -> Vec<Participant> {
        (0..n)
            .map(|i| Participant::new(ParticipantId::new(), format!("p{i}")))
            .collect()
    }

    #[test]
    fn equal_split_with_single_payer() {
        let people = people(3);
        let sheet = BalanceCalculator::default()
            .compute(
                &people,
                Money::new(3000),
                &SplitStrategy::Equally,
                &PayerSpec::single(people[0].id),
            )
            .unwrap();
        let nets: Vec<i64> = sheet.rows.iter().map(|r| r.net.minor()).collect();
        assert_eq!(nets, vec![2000, -1000, -1000]);
        assert_eq!(sheet.net_total(), Money::ZERO);
        assert_eq!(sheet.outstanding(), Money::new(2000));
    }

    #[test]
    fn single_participant_nets_to_zero() {
        let people = people(1);
        let sheet = BalanceCalculator::default()
            .compute(
                &people,
                Money::new(1234),
                &SplitStrategy::Equally,
                &PayerSpec::single(people[0].id),
            )
            .unwrap();
        assert_eq!(sheet.rows[0].owed, Money::new(1234));
        assert_eq!(sheet.rows[0].net, Money::ZERO);
    }

    #[test]
    fn payer_errors_propagate() {
        let people = people(2);
        let payer = PayerSpec::multiple(vec![PayerShare::new(people[0].id, Money::new(10))]);
        let err = BalanceCalculator::default()
            .compute(&people, Money::new(1000), &SplitStrategy::Equally, &payer)
            .unwrap_err();
        assert!(matches!(err, EngineError::PayerValidation(_)));
    }
}
