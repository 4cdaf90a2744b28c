// Analytics aggregation
// Walks the ledger to produce base-currency totals, raw token exposure,
// and a month-keyed income/expense series.

use crate::model::{TokenValue, Transaction};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// One month of cash flow, keyed by (year, month).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBreakdown {
    pub month: u32,
    pub year: i32,
    pub income: f64,
    pub expenses: f64,
    pub net: f64,
    pub transaction_count: usize,
}

/// Fully derived view over the ledger. Recomputation replaces it
/// wholesale; it has no identity of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_spent: Option<TokenValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_transaction: Option<TokenValue>,
    /// Raw token exposure: grouped by the ORIGINAL valueOut token,
    /// summing unconverted amounts. Distinct from the base-currency
    /// totals above.
    pub transactions_by_token: Vec<TokenValue>,
    /// Sorted descending by (year, month).
    pub monthly_breakdown: Vec<MonthlyBreakdown>,
}

impl Analytics {
    pub fn empty() -> Self {
        Analytics {
            total_spent: None,
            average_transaction: None,
            transactions_by_token: Vec::new(),
            monthly_breakdown: Vec::new(),
        }
    }

    /// Current-month spend extrapolated over the full month by elapsed-day
    /// fraction. `None` when the current month has no entry.
    pub fn projected_monthly_spend(&self, now: DateTime<Utc>) -> Option<f64> {
        let current = self
            .monthly_breakdown
            .iter()
            .find(|m| m.year == now.year() && m.month == now.month())?;

        let elapsed_days = now.day() as f64;
        let month_days = days_in_month(now.year(), now.month()) as f64;
        Some(current.expenses / elapsed_days * month_days)
    }

    /// Raised when the projected spend for the current month exceeds the
    /// given budget.
    pub fn budget_alert(&self, monthly_budget: f64, now: DateTime<Utc>) -> Option<BudgetAlert> {
        let projected = self.projected_monthly_spend(now)?;
        if projected > monthly_budget {
            Some(BudgetAlert {
                budget: monthly_budget,
                projected,
                overrun: projected - monthly_budget,
            })
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAlert {
    pub budget: f64,
    pub projected: f64,
    pub overrun: f64,
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Aggregate the ledger against a resolved base currency.
///
/// An empty ledger yields the all-empty Analytics. `average_transaction`
/// divides by the count of ALL transactions, not just those with a
/// resolved amount — deliberate, and pinned by tests.
pub fn aggregate(transactions: &[Transaction], base_currency: &str) -> Analytics {
    if transactions.is_empty() {
        return Analytics::empty();
    }

    let mut total_spent = 0.0;
    let mut by_token: Vec<TokenValue> = Vec::new();
    let mut months: BTreeMap<(i32, u32), MonthlyBreakdown> = BTreeMap::new();

    for tx in transactions {
        let expense = resolve_expense_amount(tx, base_currency);
        let income = resolve_income_amount(tx, base_currency);
        total_spent += expense;

        if let Some(out) = &tx.value_out {
            accumulate_token(&mut by_token, out);
        }

        if let Some((year, month)) = tx.month_key() {
            let entry = months.entry((year, month)).or_insert(MonthlyBreakdown {
                month,
                year,
                income: 0.0,
                expenses: 0.0,
                net: 0.0,
                transaction_count: 0,
            });
            entry.income += income;
            entry.expenses += expense;
            entry.transaction_count += 1;
        }
    }

    let monthly_breakdown: Vec<MonthlyBreakdown> = months
        .into_values()
        .rev()
        .map(|mut entry| {
            entry.net = entry.income - entry.expenses;
            entry
        })
        .collect();

    let average = total_spent / transactions.len() as f64;

    Analytics {
        total_spent: Some(TokenValue::new(total_spent, base_currency)),
        average_transaction: Some(TokenValue::new(average, base_currency)),
        transactions_by_token: by_token,
        monthly_breakdown,
    }
}

/// Expense amount in base currency: convertedValue if present, else
/// valueOut when already denominated in the base currency, else the cached
/// USD value when the base is USD, else 0 (excluded from totals).
pub fn resolve_expense_amount(tx: &Transaction, base_currency: &str) -> f64 {
    if let Some(converted) = &tx.converted_value {
        return converted.amount;
    }
    if let Some(out) = &tx.value_out {
        if out.token == base_currency {
            return out.amount;
        }
        if base_currency == "USD" {
            if let Some(usd) = out.usd_value {
                return usd;
            }
        }
    }
    0.0
}

/// Income resolution mirrors the expense path over valueIn.
pub fn resolve_income_amount(tx: &Transaction, base_currency: &str) -> f64 {
    if let Some(converted) = &tx.converted_value {
        return converted.amount;
    }
    if let Some(value_in) = &tx.value_in {
        if value_in.token == base_currency {
            return value_in.amount;
        }
        if base_currency == "USD" {
            if let Some(usd) = value_in.usd_value {
                return usd;
            }
        }
    }
    0.0
}

fn accumulate_token(by_token: &mut Vec<TokenValue>, out: &TokenValue) {
    match by_token.iter_mut().find(|entry| entry.token == out.token) {
        Some(entry) => {
            entry.amount += out.amount;
            entry.usd_value = match (entry.usd_value, out.usd_value) {
                (None, None) => None,
                (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
            };
        }
        None => by_token.push(out.clone()),
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (first, next) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 30,
    }
}
