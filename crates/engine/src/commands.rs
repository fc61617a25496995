//! Command structs for settlement operations.
//!
//! These types group parameters for the settlement entry points, keeping call
//! sites readable and avoiding long argument lists.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::{Money, ParticipantId, SettleAmount};

/// A debtor settles (part of) their own debt.
#[derive(Clone, Debug)]
pub struct SettleOwnDebtCmd {
    pub expense_id: Uuid,
    pub participant_id: ParticipantId,
    pub amount: SettleAmount,
    pub idempotency_key: Option<String>,
}

impl SettleOwnDebtCmd {
    #[must_use]
    pub fn new(expense_id: Uuid, participant_id: ParticipantId, amount: SettleAmount) -> Self {
        Self {
            expense_id,
            participant_id,
            amount,
            idempotency_key: None,
        }
    }

    #[must_use]
    pub fn full(expense_id: Uuid, participant_id: ParticipantId) -> Self {
        Self::new(expense_id, participant_id, SettleAmount::Full)
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// A creditor records payments received from one or more debtors.
#[derive(Clone, Debug)]
pub struct PaymentsReceivedCmd {
    pub expense_id: Uuid,
    pub recipient_id: ParticipantId,
    pub payments: BTreeMap<ParticipantId, Money>,
    pub idempotency_key: Option<String>,
}

impl PaymentsReceivedCmd {
    #[must_use]
    pub fn new(expense_id: Uuid, recipient_id: ParticipantId) -> Self {
        Self {
            expense_id,
            recipient_id,
            payments: BTreeMap::new(),
            idempotency_key: None,
        }
    }

    /// Adds a payment; a second payment from the same debtor adds up.
    #[must_use]
    pub fn payment(mut self, debtor_id: ParticipantId, amount: Money) -> Self {
        *self.payments.entry(debtor_id).or_insert(Money::ZERO) += amount;
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}
