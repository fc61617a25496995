//! Raw expense input, validated into an [`ExpenseAggregate`] by
//! [`ExpenseDraft::build`].

use std::collections::HashSet;

use crate::{
    BalanceCalculator, Directory, EngineConfig, EngineError, ExpenseAggregate, Money,
    Participant, ParticipantId, PayerSpec, ResultEngine, SplitInput, SplitKind, SplitStrategy,
    SplitViolation, util::normalize_display,
};

/// An expense being put together.
///
/// Participants are kept in insertion order and de-duplicated by id. Each
/// participant carries only the input of the active strategy:
/// [`ExpenseDraft::set_strategy`] rebuilds every input, so a value entered
/// under another strategy can never come back.
#[derive(Clone, Debug)]
pub struct ExpenseDraft {
    description: String,
    total: Money,
    strategy: SplitStrategy,
    payer: Option<PayerSpec>,
    participants: Vec<Participant>,
    ids: HashSet<ParticipantId>,
    personal: bool,
}

impl ExpenseDraft {
    /// Starts an equal split of `total` with no participants.
    #[must_use]
    pub fn new(description: impl Into<String>, total: Money) -> Self {
        Self {
            description: description.into(),
            total,
            strategy: SplitStrategy::Equally,
            payer: None,
            participants: Vec::new(),
            ids: HashSet::new(),
            personal: false,
        }
    }

    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    #[must_use]
    pub fn strategy(&self) -> &SplitStrategy {
        &self.strategy
    }

    pub fn set_total(&mut self, total: Money) {
        self.total = total;
    }

    /// Adds a participant with the blank input of the active strategy.
    pub fn add_participant(&mut self, id: ParticipantId, display_name: &str) -> ResultEngine<()> {
        let display_name = normalize_display(display_name).ok_or_else(|| {
            EngineError::InvalidAmount("participant name must not be empty".to_string())
        })?;
        if !self.ids.insert(id) {
            return Err(EngineError::ExistingKey(format!("participant {id}")));
        }
        self.participants.push(
            Participant::new(id, display_name)
                .with_input(SplitInput::blank_for(self.strategy.kind())),
        );
        Ok(())
    }

    /// Adds a participant resolved through the directory.
    pub fn add_from_directory(
        &mut self,
        directory: &impl Directory,
        id: ParticipantId,
    ) -> ResultEngine<()> {
        let entry = directory
            .lookup(id)
            .ok_or_else(|| EngineError::KeyNotFound(format!("participant {id}")))?;
        self.add_participant(entry.id, &entry.display_name)
    }

    pub fn remove_participant(&mut self, id: ParticipantId) -> ResultEngine<()> {
        if !self.ids.remove(&id) {
            return Err(EngineError::KeyNotFound(format!("participant {id}")));
        }
        self.participants.retain(|p| p.id != id);
        Ok(())
    }

    /// Switches strategy and resets every participant's input.
    pub fn set_strategy(&mut self, strategy: SplitStrategy) {
        let kind = strategy.kind();
        for participant in &mut self.participants {
            participant.input = SplitInput::blank_for(kind);
        }
        self.strategy = strategy;
    }

    /// Sets a participant's input; the variant must match the active strategy.
    pub fn set_input(&mut self, id: ParticipantId, input: SplitInput) -> ResultEngine<()> {
        let kind = self.strategy.kind();
        if !input.matches(kind) {
            return Err(SplitViolation::InputMismatch {
                participant: id,
                expected: kind,
            }
            .into());
        }
        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| EngineError::KeyNotFound(format!("participant {id}")))?;
        participant.input = input;
        Ok(())
    }

    pub fn set_payer(&mut self, payer: PayerSpec) {
        self.payer = Some(payer);
    }

    /// Marks the expense as personal: one participant, equal split, paid by
    /// that participant.
    pub fn mark_personal(&mut self) {
        self.personal = true;
        self.set_strategy(SplitStrategy::Equally);
    }

    /// Validates the draft and creates the aggregate.
    ///
    /// Nothing is created when any split, payer or personal-expense rule
    /// fails.
    pub fn build(self, config: &EngineConfig) -> ResultEngine<ExpenseAggregate> {
        let payer = if self.personal {
            self.personal_payer()?
        } else {
            self.payer
                .clone()
                .ok_or_else(|| EngineError::PayerValidation("payer is missing".to_string()))?
        };

        let balances = BalanceCalculator::new(config.tolerance).compute(
            &self.participants,
            self.total,
            &self.strategy,
            &payer,
        )?;

        Ok(ExpenseAggregate::new(
            self.description,
            self.total,
            self.strategy,
            payer,
            self.participants,
            self.personal,
            balances,
            config.settlement_epsilon_minor,
        ))
    }

    fn personal_payer(&self) -> ResultEngine<PayerSpec> {
        let [only] = self.participants.as_slice() else {
            return Err(SplitViolation::PersonalExpense(format!(
                "needs exactly one participant, got {}",
                self.participants.len()
            ))
            .into());
        };
        if self.strategy.kind() != SplitKind::Equally {
            return Err(SplitViolation::PersonalExpense(format!(
                "must be split {}, got {}",
                SplitKind::Equally,
                self.strategy.kind()
            ))
            .into());
        }
        match &self.payer {
            None => Ok(PayerSpec::single(only.id)),
            Some(PayerSpec::Single { participant_id }) if *participant_id == only.id => {
                Ok(PayerSpec::single(only.id))
            }
            Some(_) => Err(SplitViolation::PersonalExpense(
                "must be paid by its only participant".to_string(),
            )
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryDirectory, Percent};

    #[test]
    fn duplicate_participants_are_rejected() {
        let mut draft = ExpenseDraft::new("dinner", Money::new(1000));
        let id = ParticipantId::new();
        draft.add_participant(id, "Ann").unwrap();
        assert_eq!(
            draft.add_participant(id, "Ann again"),
            Err(EngineError::ExistingKey(format!("participant {id}")))
        );
        assert_eq!(draft.participants().len(), 1);
    }

    #[test]
    fn switching_strategy_rebuilds_inputs() {
        let mut draft = ExpenseDraft::new("dinner", Money::new(1000));
        let id = ParticipantId::new();
        draft.add_participant(id, "Ann").unwrap();
        draft.set_strategy(SplitStrategy::Percentage);
        draft
            .set_input(id, SplitInput::Percent(Percent::from_basis_points(4000)))
            .unwrap();

        draft.set_strategy(SplitStrategy::Shares);
        assert_eq!(draft.participants()[0].input, SplitInput::Shares(1));

        draft.set_strategy(SplitStrategy::Percentage);
        assert_eq!(
            draft.participants()[0].input,
            SplitInput::Percent(Percent::ZERO)
        );
    }

    #[test]
    fn inputs_of_another_strategy_are_not_addressable() {
        let mut draft = ExpenseDraft::new("dinner", Money::new(1000));
        let id = ParticipantId::new();
        draft.add_participant(id, "Ann").unwrap();
        let err = draft.set_input(id, SplitInput::Shares(3)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::SplitValidation(SplitViolation::InputMismatch { .. })
        ));
    }

    #[test]
    fn personal_expense_needs_one_participant() {
        let mut draft = ExpenseDraft::new("coffee", Money::new(350));
        draft.add_participant(ParticipantId::new(), "Ann").unwrap();
        draft.add_participant(ParticipantId::new(), "Bo").unwrap();
        draft.mark_personal();
        let err = draft.build(&EngineConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::SplitValidation(SplitViolation::PersonalExpense(_))
        ));
    }

    #[test]
    fn personal_expense_defaults_payer() {
        let mut draft = ExpenseDraft::new("coffee", Money::new(350));
        let id = ParticipantId::new();
        draft.add_participant(id, "Ann").unwrap();
        draft.mark_personal();
        let expense = draft.build(&EngineConfig::default()).unwrap();
        assert!(expense.is_personal());
        assert_eq!(expense.payer(), &PayerSpec::single(id));
        assert_eq!(expense.balances().net(id), Money::ZERO);
    }

    #[test]
    fn missing_payer_fails_creation() {
        let mut draft = ExpenseDraft::new("dinner", Money::new(1000));
        draft.add_participant(ParticipantId::new(), "Ann").unwrap();
        assert!(matches!(
            draft.build(&EngineConfig::default()),
            Err(EngineError::PayerValidation(_))
        ));
    }

    #[test]
    fn participants_come_from_the_directory() {
        let mut directory = MemoryDirectory::new();
        let id = ParticipantId::new();
        directory.insert(id, "Zoë");

        let mut draft = ExpenseDraft::new("dinner", Money::new(1000));
        draft.add_from_directory(&directory, id).unwrap();
        assert_eq!(draft.participants()[0].display_name, "Zoë");
        assert!(draft
            .add_from_directory(&directory, ParticipantId::new())
            .is_err());
    }
}
