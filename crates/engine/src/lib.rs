//! Shared-expense engine.
//!
//! Splits an expense total between participants, works out who paid and who
//! owes, and tracks settlements until every balance is closed. The engine never
//! performs I/O itself: persistence, the participant directory and change
//! notifications are reached through the [`ExpenseStore`], [`Directory`] and
//! [`EventPublisher`] ports.
//!
//! ```rust
//! use engine::{Engine, ExpenseDraft, Money, ParticipantId, PayerSpec, SettleOwnDebtCmd};
//!
//! let engine = Engine::builder().build();
//! let (ann, bo) = (ParticipantId::new(), ParticipantId::new());
//!
//! let mut draft = ExpenseDraft::new("taxi", Money::new(30_00));
//! draft.add_participant(ann, "Ann").unwrap();
//! draft.add_participant(bo, "Bo").unwrap();
//! draft.set_payer(PayerSpec::single(ann));
//! let expense = engine.create_expense(draft).unwrap();
//!
//! let view = engine.settle_own_debt(SettleOwnDebtCmd::full(expense.id(), bo)).unwrap();
//! assert!(view.is_settled());
//! ```

use chrono::Utc;
use uuid::Uuid;

pub use balances::{BalanceCalculator, BalanceRow, BalanceSheet};
pub use commands::{PaymentsReceivedCmd, SettleOwnDebtCmd};
pub use config::{EngineConfig, Tolerance};
pub use directory::{Directory, DirectoryEntry, MemoryDirectory};
pub use draft::ExpenseDraft;
pub use error::{EngineError, SplitViolation};
pub use events::{EventPublisher, ExpenseEvent, NoopPublisher};
pub use expense::{BalanceView, ExpenseAggregate, ParticipantBalance};
pub use money::Money;
pub use participant::{Allocation, Participant, ParticipantId, SplitInput};
pub use payers::{PayerShare, PayerSpec};
pub use percent::Percent;
pub use settlement::{
    RecordUpdate, SettleAmount, SettlementBatch, SettlementLedger, SettlementRecord,
    SettlementState,
};
pub use split::{
    ItemizedBill, ItemizedBreakdown, ItemizedLine, SplitKind, SplitOutcome, SplitStrategy,
    SplitWarning,
};
pub use store::{ExpenseStore, MemoryStore};

mod balances;
mod commands;
mod config;
mod directory;
mod draft;
mod error;
mod events;
mod expense;
mod money;
mod participant;
mod payers;
mod percent;
mod settlement;
mod split;
mod store;
mod util;

type ResultEngine<T> = Result<T, EngineError>;

/// Entry point for collaborators: creates expenses, reports balances and
/// applies settlements.
///
/// Every method takes `&self`; an `Engine` can be shared between threads
/// (behind an `Arc` or a scoped borrow) as long as its store and publisher
/// can.
pub struct Engine<S = MemoryStore, P = NoopPublisher> {
    store: S,
    publisher: P,
    config: EngineConfig,
    ledger: SettlementLedger,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

impl<S: ExpenseStore, P: EventPublisher> Engine<S, P> {
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validates the draft and persists the resulting expense.
    pub fn create_expense(&self, draft: ExpenseDraft) -> ResultEngine<ExpenseAggregate> {
        let expense = draft.build(&self.config)?;
        self.store.insert(&expense)?;

        for warning in &expense.balances().warnings {
            tracing::warn!(expense_id = %expense.id(), "{warning}");
        }
        tracing::info!(
            expense_id = %expense.id(),
            total = %expense.total(),
            strategy = %expense.strategy().kind(),
            participants = expense.participants().len(),
            "expense created"
        );
        self.publisher.publish(ExpenseEvent::Created {
            expense_id: expense.id(),
        });
        Ok(expense)
    }

    /// Loads the current snapshot of an expense.
    pub fn expense(&self, expense_id: Uuid) -> ResultEngine<ExpenseAggregate> {
        self.store.load(expense_id)
    }

    /// Paid / owed / net and settlement progress of every participant.
    pub fn balances(&self, expense_id: Uuid) -> ResultEngine<BalanceView> {
        self.store.load(expense_id).map(|expense| expense.view())
    }

    pub fn settle_own_debt(&self, cmd: SettleOwnDebtCmd) -> ResultEngine<BalanceView> {
        let key = cmd.idempotency_key.as_deref();
        self.settle_with_retry(cmd.expense_id, |expense| {
            self.ledger
                .settle_own_debt(expense, cmd.participant_id, cmd.amount, key, Utc::now())
        })
    }

    pub fn record_payments_received(&self, cmd: PaymentsReceivedCmd) -> ResultEngine<BalanceView> {
        let key = cmd.idempotency_key.as_deref();
        self.settle_with_retry(cmd.expense_id, |expense| {
            self.ledger.record_payments_received(
                expense,
                cmd.recipient_id,
                &cmd.payments,
                key,
                Utc::now(),
            )
        })
    }

    /// Re-derives the state an event refers to by reloading the expense.
    pub fn handle_event(&self, event: &ExpenseEvent) -> ResultEngine<BalanceView> {
        tracing::debug!(?event, "reloading expense for event");
        self.balances(event.expense_id())
    }

    /// Plans against a fresh snapshot and commits; conflicts are retried with
    /// a new snapshot until `max_settlement_attempts` is reached.
    fn settle_with_retry<F>(&self, expense_id: Uuid, plan: F) -> ResultEngine<BalanceView>
    where
        F: Fn(&ExpenseAggregate) -> ResultEngine<SettlementBatch>,
    {
        let max_attempts = self.config.max_settlement_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut expense = self.store.load(expense_id)?;
            let batch = plan(&expense)?;
            if batch.is_empty() {
                tracing::debug!(%expense_id, "settlement changes nothing");
                return Ok(expense.view());
            }

            match self.store.commit_settlements(&batch) {
                Ok(()) => {
                    expense.apply_batch(&batch)?;
                    for update in &batch.updates {
                        tracing::info!(
                            %expense_id,
                            participant_id = %update.record.participant_id(),
                            settled = %update.record.settled(),
                            remaining = %update.record.remaining(),
                            "settlement committed"
                        );
                    }
                    self.publisher.publish(ExpenseEvent::Settled { expense_id });
                    return Ok(expense.view());
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(%expense_id, attempt, "retrying settlement: {err}");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

pub struct EngineBuilder<S = MemoryStore, P = NoopPublisher> {
    store: S,
    publisher: P,
    config: EngineConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            store: MemoryStore::new(),
            publisher: NoopPublisher,
            config: EngineConfig::default(),
        }
    }
}

impl<S, P> EngineBuilder<S, P> {
    /// Pass the store holding expenses and settlement records.
    pub fn store<T: ExpenseStore>(self, store: T) -> EngineBuilder<T, P> {
        EngineBuilder {
            store,
            publisher: self.publisher,
            config: self.config,
        }
    }

    /// Pass the sink for expense events.
    pub fn publisher<Q: EventPublisher>(self, publisher: Q) -> EngineBuilder<S, Q> {
        EngineBuilder {
            store: self.store,
            publisher,
            config: self.config,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Construct `Engine`.
    pub fn build(self) -> Engine<S, P> {
        Engine {
            store: self.store,
            publisher: self.publisher,
            ledger: SettlementLedger::new(self.config.settlement_epsilon_minor),
            config: self.config,
        }
    }
}
