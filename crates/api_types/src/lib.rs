use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod money {
    use super::*;

    /// A monetary amount on the wire.
    ///
    /// `minor` counts units of `10^-scale`: `{ "minor": 1234, "scale": 2 }` is
    /// 12.34. Amounts with a scale different from the engine's are rejected,
    /// never rescaled.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Amount {
        pub minor: i64,
        pub scale: u8,
    }
}

pub mod expense {
    use super::{money::Amount, *};

    /// Per-participant value of the chosen split.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum SplitInput {
        Percent { basis_points: i64 },
        Exact { amount: Amount },
        Shares { count: u32 },
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ParticipantNew {
        pub id: Uuid,
        pub display_name: String,
        /// Must match the split kind; absent means the split's default.
        #[serde(default)]
        pub input: Option<SplitInput>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ItemNew {
        pub name: String,
        pub amount: Amount,
        /// Relative weight per participant id; missing ids get nothing.
        #[serde(default)]
        pub weights: BTreeMap<Uuid, u32>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum SplitNew {
        Equally,
        Percentage,
        ExactAmounts,
        Shares,
        Itemized {
            items: Vec<ItemNew>,
            #[serde(default)]
            tax_rate_basis_points: i64,
            #[serde(default)]
            tip_rate_basis_points: i64,
        },
        TwoPerson {
            full_ower: Uuid,
        },
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct PayerShareNew {
        pub participant_id: Uuid,
        pub paid: Amount,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum PayerNew {
        Single { participant_id: Uuid },
        Multiple { payers: Vec<PayerShareNew> },
    }

    /// Request body for creating an expense.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ExpenseNew {
        pub description: String,
        pub total: Amount,
        pub split: SplitNew,
        pub participants: Vec<ParticipantNew>,
        /// Optional for personal expenses, required otherwise.
        #[serde(default)]
        pub payer: Option<PayerNew>,
        #[serde(default)]
        pub personal: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseCreated {
        pub id: Uuid,
        pub created_at: DateTime<Utc>,
    }
}

pub mod balance {
    use super::{money::Amount, *};

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum SettlementState {
        Unsettled,
        PartiallySettled,
        FullySettled,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ParticipantBalance {
        pub participant_id: Uuid,
        pub display_name: String,
        pub paid: Amount,
        pub owed: Amount,
        /// Paid minus owed: positive is owed by the group.
        pub net: Amount,
        pub settled: Amount,
        pub remaining: Amount,
        pub state: SettlementState,
    }

    /// Response body for the balances of one expense.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceView {
        pub expense_id: Uuid,
        pub total: Amount,
        pub participants: Vec<ParticipantBalance>,
        /// Part of the total no participant owes.
        pub unallocated: Amount,
        pub warnings: Vec<String>,
    }
}

pub mod settlement {
    use super::{money::Amount, *};

    /// Request body for a debtor settling their own debt.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct SettleOwnDebt {
        pub participant_id: Uuid,
        /// Absent settles everything still outstanding.
        #[serde(default)]
        pub amount: Option<Amount>,
        /// Optional idempotency key for safely retrying the same request.
        #[serde(default)]
        pub idempotency_key: Option<String>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct PaymentReceived {
        pub debtor_id: Uuid,
        pub amount: Amount,
    }

    /// Request body for a creditor recording payments received.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct PaymentsReceived {
        pub recipient_id: Uuid,
        pub payments: Vec<PaymentReceived>,
        /// Optional idempotency key for safely retrying the same request.
        #[serde(default)]
        pub idempotency_key: Option<String>,
    }
}
