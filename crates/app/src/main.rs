use std::{error::Error, fs, path::Path, path::PathBuf, sync::mpsc};

use api_types::{
    expense::ExpenseNew,
    settlement::{PaymentsReceived, SettleOwnDebt},
};
use clap::{Parser, Subcommand};
use engine::{
    BalanceView, Directory, Engine, EngineConfig, EngineError, EventPublisher, ExpenseEvent,
    ExpenseStore,
};
use serde::{Deserialize, Serialize};

mod convert;
mod settings;

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "spese")]
#[command(about = "Split shared expenses and track how they are settled")]
struct Cli {
    /// Settings file, with or without extension (also read from `SPESE_CONFIG`).
    #[arg(long, env = "SPESE_CONFIG", default_value = "settings")]
    config: String,

    /// Log level; overrides `app.level` from the settings.
    #[arg(long)]
    level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the scenario's expense and print its balances.
    Split { scenario: PathBuf },
    /// Create the expense, apply every operation and print the balances after
    /// each step.
    Run { scenario: PathBuf },
    /// Search the scenario's participants by name.
    Search { scenario: PathBuf, term: String },
}

/// A JSON file with one expense and the settlements applied to it.
#[derive(Debug, Deserialize)]
struct Scenario {
    expense: ExpenseNew,
    #[serde(default)]
    operations: Vec<Operation>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Operation {
    SettleOwnDebt(SettleOwnDebt),
    PaymentsReceived(PaymentsReceived),
}

fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(&cli.config)?;
    let level = cli.level.as_deref().unwrap_or(&settings.app.level);

    tracing_subscriber::fmt()
        .with_env_filter(format!("spese={level},engine={level}"))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli.command, settings.engine) {
        tracing::error!("{err}");
        return Err(err);
    }
    Ok(())
}

fn run(command: Command, config: EngineConfig) -> Result<(), BoxError> {
    match command {
        Command::Split { scenario } => {
            let scenario = load(&scenario)?;
            let engine = Engine::builder().config(config).build();
            let view = create(&engine, scenario.expense)?;
            print(&convert::balance_view(view))
        }
        Command::Run { scenario } => {
            let scenario = load(&scenario)?;
            let (sender, receiver) = mpsc::channel::<ExpenseEvent>();
            let engine = Engine::builder().config(config).publisher(sender).build();

            let created = create(&engine, scenario.expense)?;
            let expense_id = created.expense_id;
            let mut views = vec![convert::balance_view(created)];
            for (step, operation) in scenario.operations.into_iter().enumerate() {
                tracing::debug!(step, ?operation, "applying operation");
                let view = match operation {
                    Operation::SettleOwnDebt(request) => {
                        engine.settle_own_debt(convert::settle_cmd(expense_id, request)?)?
                    }
                    Operation::PaymentsReceived(request) => engine
                        .record_payments_received(convert::payments_cmd(expense_id, request)?)?,
                };
                views.push(convert::balance_view(view));
            }

            // The last event is enough: handlers reload state instead of
            // trusting the payload.
            if let Some(event) = receiver.try_iter().last() {
                let latest = engine.handle_event(&event)?;
                tracing::info!(
                    %expense_id,
                    settled = latest.is_settled(),
                    "scenario applied"
                );
            }
            print(&views)
        }
        Command::Search { scenario, term } => {
            let scenario = load(&scenario)?;
            let directory = convert::directory(&scenario.expense);
            for entry in directory.search(&term) {
                println!("{}\t{}", entry.id, entry.display_name);
            }
            Ok(())
        }
    }
}

fn load(path: &Path) -> Result<Scenario, BoxError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn create<S: ExpenseStore, P: EventPublisher>(
    engine: &Engine<S, P>,
    new: ExpenseNew,
) -> Result<BalanceView, EngineError> {
    let directory = convert::directory(&new);
    let draft = convert::draft(new, &directory)?;
    Ok(engine.create_expense(draft)?.view())
}

fn print(value: &impl Serialize) -> Result<(), BoxError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_operations_are_tagged() {
        let scenario: Scenario = serde_json::from_value(serde_json::json!({
            "expense": {
                "description": "taxi",
                "total": { "minor": 3000, "scale": 2 },
                "split": { "kind": "EQUALLY" },
                "participants": [
                    { "id": "6f1c2b9e-3a52-4c39-8f53-0d6e1b9a7c11", "display_name": "Ann" },
                    { "id": "0b8e7a54-9d1f-4e2a-b6c3-5f4d3e2a1b00", "display_name": "Bo" }
                ],
                "payer": { "kind": "single", "participant_id": "6f1c2b9e-3a52-4c39-8f53-0d6e1b9a7c11" }
            },
            "operations": [
                { "op": "settle_own_debt", "participant_id": "0b8e7a54-9d1f-4e2a-b6c3-5f4d3e2a1b00" }
            ]
        }))
        .unwrap();
        assert!(matches!(
            scenario.operations.as_slice(),
            [Operation::SettleOwnDebt(SettleOwnDebt { amount: None, .. })]
        ));

        let engine = Engine::builder().build();
        let view = create(&engine, scenario.expense).unwrap();
        assert_eq!(view.rows[1].net.minor(), -1500);
    }
}
