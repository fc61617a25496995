//! The expense aggregate: the unit of consistency for one shared cost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    BalanceSheet, EngineError, ItemizedBreakdown, Money, Participant, ParticipantId, PayerSpec,
    ResultEngine, SettlementBatch, SettlementRecord, SettlementState, SplitStrategy, SplitWarning,
};

/// One recorded expense.
///
/// Built only through [`ExpenseDraft::build`](crate::ExpenseDraft::build),
/// which validates the split and the payers first. After creation everything
/// is immutable except the settlement records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseAggregate {
    id: Uuid,
    description: String,
    created_at: DateTime<Utc>,
    total: Money,
    strategy: SplitStrategy,
    payer: PayerSpec,
    participants: Vec<Participant>,
    is_personal: bool,
    balances: BalanceSheet,
    settlements: Vec<SettlementRecord>,
}

impl ExpenseAggregate {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        description: String,
        total: Money,
        strategy: SplitStrategy,
        payer: PayerSpec,
        participants: Vec<Participant>,
        is_personal: bool,
        balances: BalanceSheet,
        epsilon_minor: i64,
    ) -> Self {
        let settlements = balances
            .rows
            .iter()
            .map(|row| SettlementRecord::open(row.participant_id, row.net, epsilon_minor))
            .collect();
        Self {
            id: Uuid::new_v4(),
            description,
            created_at: Utc::now(),
            total,
            strategy,
            payer,
            participants,
            is_personal,
            balances,
            settlements,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn total(&self) -> Money {
        self.total
    }

    #[must_use]
    pub fn strategy(&self) -> &SplitStrategy {
        &self.strategy
    }

    #[must_use]
    pub fn payer(&self) -> &PayerSpec {
        &self.payer
    }

    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    #[must_use]
    pub fn is_personal(&self) -> bool {
        self.is_personal
    }

    #[must_use]
    pub fn balances(&self) -> &BalanceSheet {
        &self.balances
    }

    #[must_use]
    pub fn settlements(&self) -> &[SettlementRecord] {
        &self.settlements
    }

    pub fn record(&self, participant_id: ParticipantId) -> ResultEngine<&SettlementRecord> {
        self.settlements
            .iter()
            .find(|r| r.participant_id() == participant_id)
            .ok_or_else(|| EngineError::KeyNotFound(format!("participant {participant_id}")))
    }

    /// What `participant_id` paid and what all payers paid together.
    #[must_use]
    pub fn paid_share(&self, participant_id: ParticipantId) -> (Money, Money) {
        let paid = self
            .balances
            .row(participant_id)
            .map_or(Money::ZERO, |row| row.paid);
        let total_paid = self.balances.rows.iter().map(|row| row.paid).sum();
        (paid, total_paid)
    }

    /// Writes a planned batch after checking every record is still at the
    /// version the batch was planned against. Nothing is written on conflict.
    pub fn apply_batch(&mut self, batch: &SettlementBatch) -> ResultEngine<()> {
        if batch.expense_id != self.id {
            return Err(EngineError::KeyNotFound(format!(
                "expense {}",
                batch.expense_id
            )));
        }
        for update in &batch.updates {
            let current = self.record(update.record.participant_id())?;
            if current.version() != update.expected_version {
                return Err(EngineError::SettlementStateConflict(format!(
                    "participant {} moved from version {} to {}",
                    update.record.participant_id(),
                    update.expected_version,
                    current.version()
                )));
            }
        }
        for update in &batch.updates {
            self.replace_record(update.record.clone());
        }
        Ok(())
    }

    pub(crate) fn replace_record(&mut self, record: SettlementRecord) {
        if let Some(slot) = self
            .settlements
            .iter_mut()
            .find(|r| r.participant_id() == record.participant_id())
        {
            *slot = record;
        }
    }

    /// Balances joined with settlement progress, in participant order.
    #[must_use]
    pub fn view(&self) -> BalanceView {
        let rows = self
            .participants
            .iter()
            .filter_map(|participant| {
                let row = self.balances.row(participant.id)?;
                let record = self.record(participant.id).ok()?;
                Some(ParticipantBalance {
                    participant_id: participant.id,
                    display_name: participant.display_name.clone(),
                    paid: row.paid,
                    owed: row.owed,
                    net: row.net,
                    settled: record.settled(),
                    remaining: record.remaining(),
                    state: record.state(),
                })
            })
            .collect();
        BalanceView {
            expense_id: self.id,
            total: self.total,
            rows,
            unallocated: self.balances.unallocated,
            breakdown: self.balances.breakdown,
            warnings: self.balances.warnings.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantBalance {
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub paid: Money,
    pub owed: Money,
    pub net: Money,
    pub settled: Money,
    pub remaining: Money,
    pub state: SettlementState,
}

/// What collaborators see of an expense: balances plus settlement progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceView {
    pub expense_id: Uuid,
    pub total: Money,
    pub rows: Vec<ParticipantBalance>,
    pub unallocated: Money,
    pub breakdown: Option<ItemizedBreakdown>,
    pub warnings: Vec<SplitWarning>,
}

impl BalanceView {
    #[must_use]
    pub fn row(&self, participant_id: ParticipantId) -> Option<&ParticipantBalance> {
        self.rows.iter().find(|r| r.participant_id == participant_id)
    }

    /// `true` once every participant's record is fully settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.rows
            .iter()
            .all(|r| r.state == SettlementState::FullySettled)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{EngineConfig, ExpenseDraft, SettleAmount, SettlementLedger};

    fn taxi() -> (ExpenseAggregate, ParticipantId) {
        let (ann, bo) = (ParticipantId::new(), ParticipantId::new());
        let mut draft = ExpenseDraft::new("taxi", Money::new(3000));
        draft.add_participant(ann, "Ann").unwrap();
        draft.add_participant(bo, "Bo").unwrap();
        draft.set_payer(PayerSpec::single(ann));
        (draft.build(&EngineConfig::default()).unwrap(), bo)
    }

    #[test]
    fn stale_batch_leaves_the_snapshot_untouched() {
        let (mut expense, bo) = taxi();
        let ledger = SettlementLedger::new(1);
        let partial = SettleAmount::Partial(Money::new(500));
        let first = ledger
            .settle_own_debt(&expense, bo, partial, None, Utc::now())
            .unwrap();
        let second = ledger
            .settle_own_debt(&expense, bo, partial, None, Utc::now())
            .unwrap();

        expense.apply_batch(&first).unwrap();
        assert!(expense.apply_batch(&second).unwrap_err().is_retryable());
        assert_eq!(expense.record(bo).unwrap().settled(), Money::new(500));
        assert_eq!(expense.view().row(bo).unwrap().remaining, Money::new(1000));
    }

    #[test]
    fn aggregate_survives_serialization() {
        let (expense, _) = taxi();
        let json = serde_json::to_string(&expense).unwrap();
        let back: ExpenseAggregate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, expense);
    }
}
