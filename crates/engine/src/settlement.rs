//! Settlement records and the ledger transitions that move them.
//!
//! A [`SettlementRecord`] tracks, for one participant of one expense, how much
//! of their original net balance has been settled. Records only move forward:
//! `Unsettled -> PartiallySettled -> FullySettled`, and `settled` never
//! decreases.
//!
//! The [`SettlementLedger`] never mutates a record in place. It reads an
//! expense snapshot and plans a [`SettlementBatch`]: the new records plus the
//! version each was planned against. The store commits the batch atomically or
//! rejects it with [`EngineError::SettlementStateConflict`] if any record moved
//! in the meantime.
//!
//! Every amount a debtor settles is credited to creditors in the same batch,
//! so the sum settled by debtors always equals the sum received by creditors.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ExpenseAggregate, Money, ParticipantId, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementState {
    Unsettled,
    PartiallySettled,
    FullySettled,
}

/// How much of their own debt a participant settles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum SettleAmount {
    /// Everything still outstanding.
    Full,
    /// An explicit amount in `[0, remaining]`.
    Partial(Money),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    participant_id: ParticipantId,
    /// `|net|` at expense creation: the most that can ever be settled.
    bound: Money,
    settled: Money,
    fully_settled: bool,
    version: u64,
    /// Amount credited to each recipient through payments received.
    #[serde(default)]
    credits: BTreeMap<ParticipantId, Money>,
    #[serde(default)]
    applied_keys: BTreeSet<String>,
    last_settled_at: Option<DateTime<Utc>>,
}

impl SettlementRecord {
    /// A fresh record for a participant whose net balance is `net`.
    pub(crate) fn open(participant_id: ParticipantId, net: Money, epsilon_minor: i64) -> Self {
        let mut record = Self {
            participant_id,
            bound: net.abs(),
            settled: Money::ZERO,
            fully_settled: false,
            version: 0,
            credits: BTreeMap::new(),
            applied_keys: BTreeSet::new(),
            last_settled_at: None,
        };
        record.refresh(epsilon_minor);
        record
    }

    #[must_use]
    pub fn participant_id(&self) -> ParticipantId {
        self.participant_id
    }

    #[must_use]
    pub fn bound(&self) -> Money {
        self.bound
    }

    #[must_use]
    pub fn settled(&self) -> Money {
        self.settled
    }

    #[must_use]
    pub fn remaining(&self) -> Money {
        self.bound - self.settled
    }

    #[must_use]
    pub fn is_fully_settled(&self) -> bool {
        self.fully_settled
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn last_settled_at(&self) -> Option<DateTime<Utc>> {
        self.last_settled_at
    }

    /// Amount of this participant's debt already credited to `recipient`.
    #[must_use]
    pub fn credited_to(&self, recipient: ParticipantId) -> Money {
        self.credits.get(&recipient).copied().unwrap_or(Money::ZERO)
    }

    #[must_use]
    pub fn has_applied(&self, key: &str) -> bool {
        self.applied_keys.contains(key)
    }

    #[must_use]
    pub fn state(&self) -> SettlementState {
        if self.fully_settled {
            SettlementState::FullySettled
        } else if self.settled.is_zero() {
            SettlementState::Unsettled
        } else {
            SettlementState::PartiallySettled
        }
    }

    fn refresh(&mut self, epsilon_minor: i64) {
        self.fully_settled = self.settled.compare_with_epsilon(self.bound, epsilon_minor).is_eq();
    }

    /// Next version of this record with `amount` more settled.
    fn advanced(
        &self,
        amount: Money,
        key: Option<&str>,
        now: DateTime<Utc>,
        epsilon_minor: i64,
    ) -> Self {
        let mut next = self.clone();
        next.settled += amount;
        next.refresh(epsilon_minor);
        next.version += 1;
        if !amount.is_zero() {
            next.last_settled_at = Some(now);
        }
        if let Some(key) = key {
            next.applied_keys.insert(key.to_string());
        }
        next
    }
}

/// A record to write and the version it was planned against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordUpdate {
    pub expected_version: u64,
    pub record: SettlementRecord,
}

/// All record writes of one settlement call; committed all-or-nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementBatch {
    pub expense_id: Uuid,
    pub updates: Vec<RecordUpdate>,
}

impl SettlementBatch {
    fn empty(expense_id: Uuid) -> Self {
        Self {
            expense_id,
            updates: Vec::new(),
        }
    }

    fn push(&mut self, before: &SettlementRecord, record: SettlementRecord) {
        self.updates.push(RecordUpdate {
            expected_version: before.version,
            record,
        });
    }

    /// `true` when the call changes nothing (replays, zero amounts).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Plans settlement transitions against an expense snapshot.
#[derive(Clone, Copy, Debug)]
pub struct SettlementLedger {
    epsilon_minor: i64,
}

impl SettlementLedger {
    #[must_use]
    pub fn new(epsilon_minor: i64) -> Self {
        Self { epsilon_minor }
    }

    /// A debtor settles (part of) their own debt.
    ///
    /// Only participants with a negative net may call this. `Full` on an
    /// already settled record and any replay of `key` plan an empty batch.
    ///
    /// The settled amount is credited to the creditors still owed money,
    /// weighted by what each is still owed and never past their remaining.
    /// With a single payer the payer receives all of it.
    pub fn settle_own_debt(
        &self,
        expense: &ExpenseAggregate,
        participant_id: ParticipantId,
        amount: SettleAmount,
        key: Option<&str>,
        now: DateTime<Utc>,
    ) -> ResultEngine<SettlementBatch> {
        let mut batch = SettlementBatch::empty(expense.id());
        let record = expense.record(participant_id)?;
        let net = expense.balances().net(participant_id);
        if !net.is_negative() {
            return Err(EngineError::NotEligible(format!(
                "participant {participant_id} does not owe money (net {net})"
            )));
        }
        if key.is_some_and(|k| record.has_applied(k)) {
            return Ok(batch);
        }

        let remaining = record.remaining();
        let applied = match amount {
            SettleAmount::Full if record.is_fully_settled() => return Ok(batch),
            SettleAmount::Full => remaining,
            SettleAmount::Partial(amount) => {
                if amount.is_negative() || amount > remaining {
                    return Err(EngineError::SettlementRange(format!(
                        "{amount} is outside [0, {remaining}] for participant {participant_id}"
                    )));
                }
                amount
            }
        };
        if applied.is_zero() && key.is_none() {
            return Ok(batch);
        }

        let mut next = record.advanced(applied, key, now, self.epsilon_minor);
        for (creditor, credit) in Self::creditor_shares(expense, participant_id, applied)? {
            *next.credits.entry(creditor.participant_id).or_insert(Money::ZERO) += credit;
            batch.push(
                creditor,
                creditor.advanced(credit, None, now, self.epsilon_minor),
            );
        }
        batch.push(record, next);
        Ok(batch)
    }

    /// Splits `amount` across the creditors of `expense` other than
    /// `debtor_id`, in row order. Zero credits are left out.
    fn creditor_shares(
        expense: &ExpenseAggregate,
        debtor_id: ParticipantId,
        amount: Money,
    ) -> ResultEngine<Vec<(&SettlementRecord, Money)>> {
        let creditors: Vec<&SettlementRecord> = expense
            .settlements()
            .iter()
            .filter(|r| r.participant_id != debtor_id)
            .filter(|r| expense.balances().net(r.participant_id).is_positive())
            .filter(|r| r.remaining().is_positive())
            .collect();
        if creditors.is_empty() || !amount.is_positive() {
            return Ok(Vec::new());
        }

        let weights = creditors
            .iter()
            .map(|r| u64::try_from(r.remaining().minor()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| EngineError::InvalidAmount("negative creditor balance".to_string()))?;
        let mut shares = amount.allocate(&weights)?;

        // Anything a creditor cannot take goes to the next one with room.
        let mut spill = Money::ZERO;
        for (share, creditor) in shares.iter_mut().zip(&creditors) {
            if *share > creditor.remaining() {
                spill += *share - creditor.remaining();
                *share = creditor.remaining();
            }
        }
        for (share, creditor) in shares.iter_mut().zip(&creditors) {
            let extra = spill.min(creditor.remaining() - *share);
            *share += extra;
            spill -= extra;
        }

        Ok(creditors
            .into_iter()
            .zip(shares)
            .filter(|(_, share)| share.is_positive())
            .collect())
    }

    /// A creditor records payments received from debtors.
    ///
    /// In a multi-payer expense each payment is credited only for the fraction
    /// the recipient paid in (`recipient paid / total paid`). Each credit is
    /// clamped to what that debtor still owes this recipient, and the running
    /// total to what the recipient is still owed. Any invalid entry rejects the
    /// whole call.
    pub fn record_payments_received(
        &self,
        expense: &ExpenseAggregate,
        recipient_id: ParticipantId,
        payments: &BTreeMap<ParticipantId, Money>,
        key: Option<&str>,
        now: DateTime<Utc>,
    ) -> ResultEngine<SettlementBatch> {
        let mut batch = SettlementBatch::empty(expense.id());
        let recipient = expense.record(recipient_id)?;
        let recipient_net = expense.balances().net(recipient_id);
        if !recipient_net.is_positive() {
            return Err(EngineError::NotEligible(format!(
                "participant {recipient_id} is not owed money (net {recipient_net})"
            )));
        }
        if key.is_some_and(|k| recipient.has_applied(k)) {
            return Ok(batch);
        }

        let (recipient_paid, paid_total) = expense.paid_share(recipient_id);
        let mut room_left = recipient.remaining();
        let mut received = Money::ZERO;

        for (&debtor_id, &amount) in payments {
            if debtor_id == recipient_id {
                return Err(EngineError::NotEligible(format!(
                    "participant {recipient_id} cannot pay themselves"
                )));
            }
            let debtor = expense.record(debtor_id)?;
            let debtor_net = expense.balances().net(debtor_id);
            if !debtor_net.is_negative() {
                return Err(EngineError::NotEligible(format!(
                    "participant {debtor_id} does not owe money (net {debtor_net})"
                )));
            }
            if amount.is_negative() {
                return Err(EngineError::SettlementRange(format!(
                    "negative payment {amount} from participant {debtor_id}"
                )));
            }

            let credit = amount.scale_by_rational(recipient_paid.minor(), paid_total.minor())?;
            let attributable = debtor_net
                .abs()
                .scale_by_rational(recipient_paid.minor(), paid_total.minor())?;
            let owed_to_recipient = (attributable - debtor.credited_to(recipient_id)).max(Money::ZERO);
            let applied = credit
                .min(owed_to_recipient)
                .min(debtor.remaining())
                .min(room_left)
                .max(Money::ZERO);
            if applied.is_zero() {
                continue;
            }

            let mut next = debtor.advanced(applied, key, now, self.epsilon_minor);
            *next.credits.entry(recipient_id).or_insert(Money::ZERO) += applied;
            batch.push(debtor, next);
            room_left -= applied;
            received += applied;
        }

        if received.is_zero() && key.is_none() {
            return Ok(batch);
        }
        batch.push(
            recipient,
            recipient.advanced(received, key, now, self.epsilon_minor),
        );
        Ok(batch)
    }
}
