//! The module contains the errors the engine can return.
//!
//! The errors are:
//!
//! - [`SplitValidation`] returned when a split strategy invariant is violated.
//! - [`PayerValidation`] returned when the paid amounts do not add up.
//! - [`SettlementRange`] returned when a settlement amount is out of range.
//! - [`SettlementStateConflict`] returned when a settlement raced with another
//!   writer. This is the only retryable error.
//! - [`NotEligible`] returned when a participant cannot perform a settlement.
//!
//!  [`SplitValidation`]: EngineError::SplitValidation
//!  [`PayerValidation`]: EngineError::PayerValidation
//!  [`SettlementRange`]: EngineError::SettlementRange
//!  [`SettlementStateConflict`]: EngineError::SettlementStateConflict
//!  [`NotEligible`]: EngineError::NotEligible
use thiserror::Error;

use crate::{Money, ParticipantId, SplitKind};

/// Engine custom errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid split: {0}")]
    SplitValidation(#[from] SplitViolation),
    #[error("Invalid payers: {0}")]
    PayerValidation(String),
    #[error("Settlement out of range: {0}")]
    SettlementRange(String),
    #[error("Settlement conflict: {0}")]
    SettlementStateConflict(String),
    #[error("Not eligible: {0}")]
    NotEligible(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl EngineError {
    /// Returns `true` when the request may succeed if retried with fresh
    /// state.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SettlementStateConflict(_))
    }
}

/// The split invariant an expense failed to satisfy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplitViolation {
    #[error("an expense needs at least one participant")]
    NoParticipants,
    #[error("expense total must be positive, got {0}")]
    NonPositiveTotal(Money),
    #[error("percentages must add up to 100%, got {actual_basis_points} basis points")]
    PercentSum { actual_basis_points: i64 },
    #[error("exact amounts add up to {actual}, expected {expected}")]
    ExactSum { expected: Money, actual: Money },
    #[error("share counts must add up to more than zero")]
    NonPositiveShares,
    #[error("{kind} needs exactly {expected} participants, got {actual}")]
    ParticipantCount {
        kind: SplitKind,
        expected: usize,
        actual: usize,
    },
    #[error("participant {participant} has no {expected} input")]
    InputMismatch {
        participant: ParticipantId,
        expected: SplitKind,
    },
    #[error("participant {0} is not part of the expense")]
    UnknownParticipant(ParticipantId),
    #[error("itemized split needs at least one line")]
    NoItems,
    #[error("itemized total is {expected}, expense total is {actual}")]
    ItemizedTotal { expected: Money, actual: Money },
    #[error("negative amount {amount} for {label}")]
    NegativeAmount { label: String, amount: Money },
    #[error("participant {0} has a negative percentage")]
    NegativePercent(ParticipantId),
    #[error("{0} rate must not be negative")]
    NegativeRate(String),
    #[error("personal expense: {0}")]
    PersonalExpense(String),
    #[error("net balances add up to {residual}, expected {expected}")]
    Conservation { expected: Money, residual: Money },
}
