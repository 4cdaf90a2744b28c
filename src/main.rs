use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use stable_ledger::{LedgerState, Operation};
use std::env;
use std::fs;
use std::process;
use uuid::Uuid;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: stable-ledger <export.csv> [tracked-address]");
        process::exit(2);
    }

    run_import(&args[1], args.get(2).map(String::as_str))
}

fn run_import(csv_path: &str, tracked_address: Option<&str>) -> Result<()> {
    let raw_text = fs::read_to_string(csv_path)
        .with_context(|| format!("Failed to read export file: {}", csv_path))?;

    // One caller-supplied id per data row.
    let rows = stable_ledger::parse_import(&raw_text)?;
    let transaction_ids: Vec<String> = rows.iter().map(|_| Uuid::new_v4().to_string()).collect();
    println!("✓ Parsed {} data rows from {}", rows.len(), csv_path);

    let mut state = LedgerState::new();
    state.apply(Operation::ImportBatch {
        raw_text,
        transaction_ids,
        tracked_address: tracked_address.map(str::to_string),
        excluded_contracts: Vec::new(),
        default_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })?;
    state.apply(Operation::CalculateAnalytics)?;

    let ledger = &state.ledger;
    println!("✓ Ledger holds {} transactions", ledger.metadata.total_transactions);
    if let Some(range) = &ledger.metadata.date_range {
        println!("✓ Date range: {} - {}", range.start_date, range.end_date);
    }

    match &state.detected_base_currency {
        Some(detected) => {
            println!(
                "\nBase currency: {} ({}) at {:.0}% confidence",
                detected.stablecoin,
                detected.currency_code,
                detected.confidence * 100.0
            );
            println!("  {}", detected.reason);
        }
        None => println!("\nBase currency: none detected"),
    }

    if let Some(analytics) = &state.analytics {
        if let Some(total) = &analytics.total_spent {
            println!("\nTotal spent: {:.2} {}", total.amount, total.token);
        }
        if let Some(average) = &analytics.average_transaction {
            println!("Average transaction: {:.2} {}", average.amount, average.token);
        }
        if !analytics.transactions_by_token.is_empty() {
            println!("\nSpend by token:");
            for entry in &analytics.transactions_by_token {
                println!("  {:>12.2} {}", entry.amount, entry.token);
            }
        }
        if !analytics.monthly_breakdown.is_empty() {
            println!("\nMonthly breakdown:");
            for month in &analytics.monthly_breakdown {
                println!(
                    "  {:04}-{:02}: income {:.2}, expenses {:.2}, net {:.2} ({} transactions)",
                    month.year,
                    month.month,
                    month.income,
                    month.expenses,
                    month.net,
                    month.transaction_count
                );
            }
        }
    }

    Ok(())
}
