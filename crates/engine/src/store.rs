//! Persistence port and the in-memory reference store.
//!
//! The contract every store must honour for settlements:
//!
//! - each settlement record is written by one writer at a time;
//! - a batch is written only if every record in it is still at the version the
//!   batch was planned against, otherwise nothing is written and
//!   [`EngineError::SettlementStateConflict`] is returned;
//! - a batch is all-or-nothing.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, RwLock},
};

use uuid::Uuid;

use crate::{
    EngineError, ExpenseAggregate, ParticipantId, ResultEngine, SettlementBatch, SettlementRecord,
};

pub trait ExpenseStore: Send + Sync {
    /// Persists a freshly created expense with its initial records.
    fn insert(&self, expense: &ExpenseAggregate) -> ResultEngine<()>;

    /// Loads the current snapshot of an expense and its records.
    fn load(&self, expense_id: Uuid) -> ResultEngine<ExpenseAggregate>;

    /// Commits a settlement batch (see the module docs for the contract).
    fn commit_settlements(&self, batch: &SettlementBatch) -> ResultEngine<()>;
}

struct StoredExpense {
    base: ExpenseAggregate,
    records: BTreeMap<ParticipantId, Mutex<SettlementRecord>>,
}

/// Store keeping expenses in memory, with one lock per settlement record.
#[derive(Default)]
pub struct MemoryStore {
    expenses: RwLock<HashMap<Uuid, Arc<StoredExpense>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn stored(&self, expense_id: Uuid) -> ResultEngine<Arc<StoredExpense>> {
        let expenses = self.expenses.read().map_err(|_| poisoned())?;
        expenses
            .get(&expense_id)
            .cloned()
            .ok_or_else(|| EngineError::KeyNotFound(format!("expense {expense_id}")))
    }
}

fn poisoned() -> EngineError {
    EngineError::StoreUnavailable("lock poisoned".to_string())
}

impl ExpenseStore for MemoryStore {
    fn insert(&self, expense: &ExpenseAggregate) -> ResultEngine<()> {
        let mut expenses = self.expenses.write().map_err(|_| poisoned())?;
        if expenses.contains_key(&expense.id()) {
            return Err(EngineError::ExistingKey(format!("expense {}", expense.id())));
        }
        let records = expense
            .settlements()
            .iter()
            .map(|record| (record.participant_id(), Mutex::new(record.clone())))
            .collect();
        expenses.insert(
            expense.id(),
            Arc::new(StoredExpense {
                base: expense.clone(),
                records,
            }),
        );
        Ok(())
    }

    fn load(&self, expense_id: Uuid) -> ResultEngine<ExpenseAggregate> {
        let stored = self.stored(expense_id)?;
        let mut snapshot = stored.base.clone();
        for record in stored.records.values() {
            let record = record.lock().map_err(|_| poisoned())?;
            snapshot.replace_record(record.clone());
        }
        Ok(snapshot)
    }

    fn commit_settlements(&self, batch: &SettlementBatch) -> ResultEngine<()> {
        let stored = self.stored(batch.expense_id)?;

        let mut updates: Vec<_> = batch.updates.iter().collect();
        updates.sort_by_key(|u| u.record.participant_id());

        // Locks are always taken in participant order.
        let mut guards: Vec<MutexGuard<'_, SettlementRecord>> = Vec::with_capacity(updates.len());
        for update in &updates {
            let participant_id = update.record.participant_id();
            let slot = stored.records.get(&participant_id).ok_or_else(|| {
                EngineError::KeyNotFound(format!("participant {participant_id}"))
            })?;
            let guard = slot.lock().map_err(|_| poisoned())?;
            if guard.version() != update.expected_version {
                return Err(EngineError::SettlementStateConflict(format!(
                    "participant {participant_id} moved from version {} to {}",
                    update.expected_version,
                    guard.version()
                )));
            }
            guards.push(guard);
        }

        for (guard, update) in guards.iter_mut().zip(updates) {
            **guard = update.record.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{EngineConfig, ExpenseDraft, Money, PayerSpec, SettleAmount, SettlementLedger};

    fn expense() -> (ExpenseAggregate, ParticipantId, ParticipantId) {
        let payer = ParticipantId::new();
        let debtor = ParticipantId::new();
        let mut draft = ExpenseDraft::new("taxi", Money::new(2000));
        draft.add_participant(payer, "Ann").unwrap();
        draft.add_participant(debtor, "Bo").unwrap();
        draft.set_payer(PayerSpec::single(payer));
        (draft.build(&EngineConfig::default()).unwrap(), payer, debtor)
    }

    #[test]
    fn stale_batches_are_rejected_without_writing() {
        let (expense, _, debtor) = expense();
        let store = MemoryStore::new();
        store.insert(&expense).unwrap();

        let ledger = SettlementLedger::new(1);
        let snapshot = store.load(expense.id()).unwrap();
        let first = ledger
            .settle_own_debt(&snapshot, debtor, SettleAmount::Partial(Money::new(300)), None, Utc::now())
            .unwrap();
        let second = ledger
            .settle_own_debt(&snapshot, debtor, SettleAmount::Partial(Money::new(500)), None, Utc::now())
            .unwrap();

        store.commit_settlements(&first).unwrap();
        let err = store.commit_settlements(&second).unwrap_err();
        assert!(err.is_retryable());

        let reloaded = store.load(expense.id()).unwrap();
        assert_eq!(reloaded.record(debtor).unwrap().settled(), Money::new(300));
    }

    #[test]
    fn inserting_twice_fails() {
        let (expense, _, _) = expense();
        let store = MemoryStore::new();
        store.insert(&expense).unwrap();
        assert!(matches!(store.insert(&expense), Err(EngineError::ExistingKey(_))));
        assert!(matches!(store.load(Uuid::new_v4()), Err(EngineError::KeyNotFound(_))));
    }
}
