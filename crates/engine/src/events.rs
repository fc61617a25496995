//! Expense change notifications.
//!
//! Events carry only the expense id. Consumers reload the expense through
//! [`Engine::handle_event`](crate::Engine::handle_event) instead of trusting
//! the payload, so duplicated or reordered deliveries are harmless.

use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExpenseEvent {
    Created { expense_id: Uuid },
    Settled { expense_id: Uuid },
}

impl ExpenseEvent {
    #[must_use]
    pub fn expense_id(&self) -> Uuid {
        match self {
            Self::Created { expense_id } | Self::Settled { expense_id } => *expense_id,
        }
    }
}

pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: ExpenseEvent);
}

/// Drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: ExpenseEvent) {}
}

impl EventPublisher for Sender<ExpenseEvent> {
    fn publish(&self, event: ExpenseEvent) {
        if self.send(event).is_err() {
            tracing::debug!(expense_id = %event.expense_id(), "event receiver gone");
        }
    }
}
