//! Conversions between the wire types in `api_types` and the engine.

use api_types::{balance, expense, money::Amount, settlement};
use engine::{
    EngineError, ExpenseDraft, ItemizedBill, ItemizedLine, MemoryDirectory, Money, ParticipantId,
    PayerShare, PayerSpec, PaymentsReceivedCmd, Percent, SettleAmount, SettleOwnDebtCmd,
    SettlementState, SplitInput, SplitStrategy,
};
use uuid::Uuid;

pub fn money(amount: Amount) -> Result<Money, EngineError> {
    if amount.scale != Money::SCALE {
        return Err(EngineError::InvalidAmount(format!(
            "scale {} is not supported, expected {}",
            amount.scale,
            Money::SCALE
        )));
    }
    Ok(Money::new(amount.minor))
}

pub fn amount(money: Money) -> Amount {
    Amount {
        minor: money.minor(),
        scale: Money::SCALE,
    }
}

/// Directory holding every participant named in the request.
pub fn directory(new: &expense::ExpenseNew) -> MemoryDirectory {
    let mut directory = MemoryDirectory::new();
    for participant in &new.participants {
        directory.insert(participant.id.into(), &participant.display_name);
    }
    directory
}

fn strategy(split: expense::SplitNew) -> Result<SplitStrategy, EngineError> {
    Ok(match split {
        expense::SplitNew::Equally => SplitStrategy::Equally,
        expense::SplitNew::Percentage => SplitStrategy::Percentage,
        expense::SplitNew::ExactAmounts => SplitStrategy::ExactAmounts,
        expense::SplitNew::Shares => SplitStrategy::Shares,
        expense::SplitNew::TwoPerson { full_ower } => SplitStrategy::TwoPerson {
            full_ower: full_ower.into(),
        },
        expense::SplitNew::Itemized {
            items,
            tax_rate_basis_points,
            tip_rate_basis_points,
        } => {
            let mut bill = ItemizedBill::new(
                Percent::from_basis_points(tax_rate_basis_points),
                Percent::from_basis_points(tip_rate_basis_points),
            );
            for item in items {
                let mut line = ItemizedLine::new(item.name, money(item.amount)?);
                for (id, weight) in item.weights {
                    line = line.weight(id.into(), weight);
                }
                bill = bill.line(line);
            }
            SplitStrategy::Itemized(bill)
        }
    })
}

fn split_input(input: expense::SplitInput) -> Result<SplitInput, EngineError> {
    Ok(match input {
        expense::SplitInput::Percent { basis_points } => {
            SplitInput::Percent(Percent::from_basis_points(basis_points))
        }
        expense::SplitInput::Exact { amount } => SplitInput::Exact(money(amount)?),
        expense::SplitInput::Shares { count } => SplitInput::Shares(count),
    })
}

fn payer(payer: expense::PayerNew) -> Result<PayerSpec, EngineError> {
    Ok(match payer {
        expense::PayerNew::Single { participant_id } => PayerSpec::single(participant_id.into()),
        expense::PayerNew::Multiple { payers } => PayerSpec::multiple(
            payers
                .into_iter()
                .map(|share| Ok(PayerShare::new(share.participant_id.into(), money(share.paid)?)))
                .collect::<Result<_, EngineError>>()?,
        ),
    })
}

/// Builds a draft from a creation request, resolving participants through
/// `directory`.
pub fn draft(
    new: expense::ExpenseNew,
    directory: &MemoryDirectory,
) -> Result<ExpenseDraft, EngineError> {
    let mut draft = ExpenseDraft::new(new.description, money(new.total)?);
    draft.set_strategy(strategy(new.split)?);
    for participant in new.participants {
        let id = ParticipantId::from(participant.id);
        draft.add_from_directory(directory, id)?;
        if let Some(input) = participant.input {
            draft.set_input(id, split_input(input)?)?;
        }
    }
    if let Some(spec) = new.payer {
        draft.set_payer(payer(spec)?);
    }
    if new.personal {
        draft.mark_personal();
    }
    Ok(draft)
}

pub fn settle_cmd(
    expense_id: Uuid,
    request: settlement::SettleOwnDebt,
) -> Result<SettleOwnDebtCmd, EngineError> {
    let amount = match request.amount {
        Some(amount) => SettleAmount::Partial(money(amount)?),
        None => SettleAmount::Full,
    };
    let cmd = SettleOwnDebtCmd::new(expense_id, request.participant_id.into(), amount);
    Ok(match request.idempotency_key {
        Some(key) => cmd.idempotency_key(key),
        None => cmd,
    })
}

pub fn payments_cmd(
    expense_id: Uuid,
    request: settlement::PaymentsReceived,
) -> Result<PaymentsReceivedCmd, EngineError> {
    let mut cmd = PaymentsReceivedCmd::new(expense_id, request.recipient_id.into());
    for payment in request.payments {
        cmd = cmd.payment(payment.debtor_id.into(), money(payment.amount)?);
    }
    Ok(match request.idempotency_key {
        Some(key) => cmd.idempotency_key(key),
        None => cmd,
    })
}

pub fn balance_view(view: engine::BalanceView) -> balance::BalanceView {
    balance::BalanceView {
        expense_id: view.expense_id,
        total: amount(view.total),
        participants: view
            .rows
            .into_iter()
            .map(|row| balance::ParticipantBalance {
                participant_id: *row.participant_id.as_uuid(),
                display_name: row.display_name,
                paid: amount(row.paid),
                owed: amount(row.owed),
                net: amount(row.net),
                settled: amount(row.settled),
                remaining: amount(row.remaining),
                state: match row.state {
                    SettlementState::Unsettled => balance::SettlementState::Unsettled,
                    SettlementState::PartiallySettled => balance::SettlementState::PartiallySettled,
                    SettlementState::FullySettled => balance::SettlementState::FullySettled,
                },
            })
            .collect(),
        unallocated: amount(view.unallocated),
        warnings: view.warnings.iter().map(ToString::to_string).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_scale_is_rejected() {
        let err = money(Amount { minor: 1234, scale: 3 }).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
        assert_eq!(money(Amount { minor: 1234, scale: 2 }), Ok(Money::new(1234)));
    }

    #[test]
    fn request_becomes_a_buildable_draft() {
        let (ann, bo) = (Uuid::new_v4(), Uuid::new_v4());
        let new: expense::ExpenseNew = serde_json::from_value(serde_json::json!({
            "description": "cabin",
            "total": { "minor": 9000, "scale": 2 },
            "split": { "kind": "SHARES" },
            "participants": [
                { "id": ann, "display_name": "Ann", "input": { "kind": "shares", "count": 2 } },
                { "id": bo, "display_name": "Bo" }
            ],
            "payer": { "kind": "single", "participant_id": ann }
        }))
        .unwrap();

        let directory = directory(&new);
        let expense = draft(new, &directory)
            .unwrap()
            .build(&engine::EngineConfig::default())
            .unwrap();
        let view = balance_view(expense.view());
        assert_eq!(view.participants[0].owed.minor, 6000);
        assert_eq!(view.participants[1].net.minor, -3000);
    }

    #[test]
    fn missing_amount_settles_everything() {
        let request = settlement::SettleOwnDebt {
            participant_id: Uuid::new_v4(),
            amount: None,
            idempotency_key: Some("k".to_string()),
        };
        let cmd = settle_cmd(Uuid::new_v4(), request).unwrap();
        assert_eq!(cmd.amount, SettleAmount::Full);
        assert_eq!(cmd.idempotency_key.as_deref(), Some("k"));
    }
}
