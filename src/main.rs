use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;

use tallybook::category::{FlowKind, NewCategory};
use tallybook::notify::{ChannelNotifier, Level};
use tallybook::prefs::PrefsHandle;
use tallybook::report;
use tallybook::source::NewSource;
use tallybook::store::memory::{MemoryBackend, OpKind};
use tallybook::time::DateRange;
use tallybook::transaction::NewTransaction;
use tallybook::{budget, category, logging, source, transaction, AppError, AppState};

/// Drives the finance client engine against the in-memory backend and
/// prints the dashboard a UI would render.
#[derive(Parser)]
#[command(name = "tallybook", about = "Personal finance tracking demo client")]
struct Cli {
    /// Owner recorded on created rows.
    #[arg(long, default_value = "demo-user")]
    user: String,

    /// Preference file to load and persist; defaults to in-memory.
    #[arg(long)]
    prefs: Option<PathBuf>,

    /// Simulate a backend failure during the demo deletion.
    #[arg(long)]
    fail_delete: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    let prefs = match &cli.prefs {
        Some(path) => PrefsHandle::load_from(path.clone())?,
        None => PrefsHandle::in_memory(),
    };
    let backend = Arc::new(MemoryBackend::new(&cli.user));
    let (notifier, mut toasts) = ChannelNotifier::channel();
    let state = AppState::new(backend.clone(), Arc::new(notifier), prefs);

    let groceries = category::add(
        &state,
        NewCategory {
            name: "Groceries".into(),
            description: None,
            kind: FlowKind::Expense,
        },
    )
    .await?;
    let salary = category::add(
        &state,
        NewCategory {
            name: "Salary".into(),
            description: None,
            kind: FlowKind::Income,
        },
    )
    .await?;
    let card = source::add(
        &state,
        NewSource {
            name: "Debit card".into(),
            description: None,
        },
    )
    .await?;

    let range = state
        .prefs()
        .date_range()
        .unwrap_or_else(|| DateRange::last_month(Utc::now()));
    let monthly = budget::add(
        &state,
        budget::NewBudget {
            name: "Monthly budget".into(),
            amount: 1200.0,
            start: range.from,
            end: range.to,
        },
    )
    .await?;

    for (name, amount, kind, cat) in [
        ("Weekly shop", 84.30, FlowKind::Expense, &groceries),
        ("Farmers market", 23.75, FlowKind::Expense, &groceries),
        ("Paycheck", 2100.0, FlowKind::Income, &salary),
    ] {
        transaction::add(
            &state,
            NewTransaction {
                name: name.into(),
                amount,
                kind,
                category: cat.id.clone(),
                source: card.id.clone(),
                event: None,
            },
        )
        .await?;
    }

    let doomed = transaction::add(
        &state,
        NewTransaction {
            name: "Duplicate entry".into(),
            amount: 9.99,
            kind: FlowKind::Expense,
            category: groceries.id.clone(),
            source: card.id.clone(),
            event: None,
        },
    )
    .await?;
    if cli.fail_delete {
        backend
            .fail_next(OpKind::Delete, AppError::new("STORE/DOWN", "backend offline"))
            .await;
    }
    let delete_result = transaction::delete(&state, &doomed.id).await;
    if let Err(err) = &delete_result {
        tracing::warn!(target: "tallybook", error = %err, "demo delete failed");
    }

    let expanded = transaction::expanded_in_range(&state, Some(&range)).await?;
    let breakdown = report::budget_breakdown(&monthly, &expanded);
    let expense_buckets = report::aggregate_by_category(&expanded, FlowKind::Expense);
    let history = report::history_points(&expanded, FlowKind::Expense, None);

    println!("Budget '{}' — {} transactions in range", monthly.name, expanded.len());
    println!(
        "  used {:.2} of {:.2} ({}%), available {:.2}",
        breakdown.used,
        breakdown.total_budget,
        breakdown.usage_percentage(),
        breakdown.available
    );
    for bucket in &expense_buckets {
        println!("  {}: {:.2} [{}]", bucket.name, bucket.value, bucket.color);
    }
    for point in &history {
        println!("  {} {} {:.2}", point.date, point.name, point.amount);
    }

    while let Ok(toast) = toasts.try_recv() {
        let tag = match toast.level {
            Level::Success => "ok",
            Level::Error => "error",
            Level::Loading => "...",
        };
        println!("toast[{tag}] {}", toast.message);
    }

    Ok(())
}
