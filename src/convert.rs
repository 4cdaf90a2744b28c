// Currency conversion
// Applies stored exchange rates to patch converted/USD values onto a
// transaction on demand.

use crate::model::{ExchangeRate, PriceInfo, TokenValue, Transaction};

/// First exact `(from, to)` match in list order wins. No recency sorting —
/// list order is caller-controlled.
pub fn find_rate(rates: &[ExchangeRate], from_currency: &str, to_currency: &str) -> Option<f64> {
    rates
        .iter()
        .find(|rate| rate.from_currency == from_currency && rate.to_currency == to_currency)
        .map(|rate| rate.rate)
}

/// Patch conversion fields onto a transaction.
///
/// Sets `converted_value` from `value_in` when a rate to the target
/// currency exists. Independently, when the target is USD, back-fills the
/// `usd_value` of fee/in/out from separate rate lookups — any subset may
/// succeed; a missing rate leaves that field untouched, never erased.
pub fn convert_transaction(
    tx: &mut Transaction,
    exchange_rates: &[ExchangeRate],
    target_currency: &str,
) {
    if let Some(value_in) = &tx.value_in {
        if value_in.token != target_currency {
            if let Some(rate) = find_rate(exchange_rates, &value_in.token, target_currency) {
                tx.converted_value = Some(PriceInfo {
                    amount: value_in.amount * rate,
                    currency: target_currency.to_string(),
                });
            }
        }
    }

    if target_currency == "USD" {
        patch_usd_value(&mut tx.txn_fee, exchange_rates);
        if let Some(value_in) = tx.value_in.as_mut() {
            patch_usd_value(value_in, exchange_rates);
        }
        if let Some(value_out) = tx.value_out.as_mut() {
            patch_usd_value(value_out, exchange_rates);
        }
    }
}

fn patch_usd_value(value: &mut TokenValue, exchange_rates: &[ExchangeRate]) {
    if let Some(rate) = find_rate(exchange_rates, &value.token, "USD") {
        value.usd_value = Some(value.amount * rate);
    }
}
