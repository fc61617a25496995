//! Payer allocation: who put money in, and how much.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Allocation, EngineError, Money, Participant, ParticipantId, ResultEngine, Tolerance};

/// One payer's contribution in a multi-payer expense.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerShare {
    pub participant_id: ParticipantId,
    pub paid: Money,
}

impl PayerShare {
    #[must_use]
    pub fn new(participant_id: ParticipantId, paid: Money) -> Self {
        Self {
            participant_id,
            paid,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayerSpec {
    /// One participant paid the whole total.
    Single { participant_id: ParticipantId },
    /// Several participants paid; their amounts must add up to the total.
    Multiple { payers: Vec<PayerShare> },
}

impl PayerSpec {
    #[must_use]
    pub fn single(participant_id: ParticipantId) -> Self {
        Self::Single { participant_id }
    }

    #[must_use]
    pub fn multiple(payers: Vec<PayerShare>) -> Self {
        Self::Multiple { payers }
    }

    #[must_use]
    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::Multiple { .. })
    }

    /// Computes the paid amount of every participant.
    ///
    /// Non-payers get zero. Rejects unknown or duplicate payers, negative
    /// amounts, and paid sums that do not match `total`.
    pub fn compute_paid(
        &self,
        participants: &[Participant],
        total: Money,
        tolerance: Tolerance,
    ) -> ResultEngine<Allocation> {
        let known: HashSet<ParticipantId> = participants.iter().map(|p| p.id).collect();
        let mut paid = Allocation::zeroed(participants);

        match self {
            Self::Single { participant_id } => {
                if !known.contains(participant_id) {
                    return Err(EngineError::PayerValidation(format!(
                        "payer {participant_id} is not a participant"
                    )));
                }
                paid.add_to(*participant_id, total);
            }
            Self::Multiple { payers } => {
                if payers.is_empty() {
                    return Err(EngineError::PayerValidation(
                        "at least one payer is required".to_string(),
                    ));
                }
                let mut seen = HashSet::with_capacity(payers.len());
                for payer in payers {
                    if !known.contains(&payer.participant_id) {
                        return Err(EngineError::PayerValidation(format!(
                            "payer {} is not a participant",
                            payer.participant_id
                        )));
                    }
                    if !seen.insert(payer.participant_id) {
                        return Err(EngineError::PayerValidation(format!(
                            "payer {} listed twice",
                            payer.participant_id
                        )));
                    }
                    if payer.paid.is_negative() {
                        return Err(EngineError::PayerValidation(format!(
                            "payer {} has a negative amount",
                            payer.participant_id
                        )));
                    }
                    paid.add_to(payer.participant_id, payer.paid);
                }
                let sum = paid.total()?;
                if (sum - total).abs().minor() > tolerance.amount_minor {
                    return Err(EngineError::PayerValidation(format!(
                        "paid amounts add up to {sum}, expected {total}"
                    )));
                }
            }
        }

        Ok(paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people(n: usize) -> Vec<Participant> {
        (0..n)
            .map(|i| Participant::new(ParticipantId::new(), format!("p{i}")))
            .collect()
    }

    #[test]
    fn single_payer_gets_the_total() {
        let people = people(3);
        let paid = PayerSpec::single(people[1].id)
            .compute_paid(&people, Money::new(900), Tolerance::default())
            .unwrap();
        let amounts: Vec<i64> = paid.iter().map(|(_, m)| m.minor()).collect();
        assert_eq!(amounts, vec![0, 900, 0]);
    }

    #[test]
    fn multiple_payers_must_cover_the_total() {
        let people = people(2);
        let spec = PayerSpec::multiple(vec![
            PayerShare::new(people[0].id, Money::new(500)),
            PayerShare::new(people[1].id, Money::new(300)),
        ]);
        let err = spec
            .compute_paid(&people, Money::new(900), Tolerance::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::PayerValidation(_)));
    }

    #[test]
    fn paid_amounts_that_overflow_are_invalid() {
        let people = people(2);
        let spec = PayerSpec::multiple(vec![
            PayerShare::new(people[0].id, Money::new(i64::MAX)),
            PayerShare::new(people[1].id, Money::new(1)),
        ]);
        let err = spec
            .compute_paid(&people, Money::new(900), Tolerance::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }

    #[test]
    fn duplicate_or_unknown_payers_are_rejected() {
        let people = people(2);
        let dup = PayerSpec::multiple(vec![
            PayerShare::new(people[0].id, Money::new(500)),
            PayerShare::new(people[0].id, Money::new(400)),
        ]);
        assert!(dup
            .compute_paid(&people, Money::new(900), Tolerance::default())
            .is_err());

        let stranger = PayerSpec::single(ParticipantId::new());
        assert!(stranger
            .compute_paid(&people, Money::new(900), Tolerance::default())
            .is_err());
    }

    #[test]
    fn non_payers_get_zero() {
        let people = people(3);
        let spec = PayerSpec::multiple(vec![
            PayerShare::new(people[0].id, Money::new(800)),
            PayerShare::new(people[2].id, Money::new(200)),
        ]);
        let paid = spec
            .compute_paid(&people, Money::new(1000), Tolerance::default())
            .unwrap();
        assert_eq!(paid.get(people[1].id), Money::ZERO);
        assert_eq!(paid.get(people[0].id), Money::new(800));
    }
}
