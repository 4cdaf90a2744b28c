// Transaction builder
// Converts parsed rows (import path) or structured inputs (manual/API path)
// into canonical transactions, classifying each one relative to a tracked
// address.

use crate::error::LedgerError;
use crate::import::{self, ImportField, ParsedRow};
use crate::model::{
    Classification, TokenValue, Transaction, TransactionStatus, TransactionType,
};
use crate::token;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context shared by every row of one import batch.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Address the ledger is tracked against. Without one, transactions
    /// are built as basic (unclassified) ledger entries.
    pub tracked_address: Option<String>,

    /// ISO-8601 fallback for rows whose timestamp cell is empty or
    /// unparseable.
    pub default_timestamp: String,
}

/// Build one transaction per data row.
///
/// Hard precondition: at least as many externally-supplied identifiers as
/// data rows. Violations fail the whole batch before anything is built —
/// this is all-or-nothing, not a per-row skip.
pub fn build_transactions(
    rows: &[ParsedRow],
    transaction_ids: &[String],
    ctx: &BuildContext,
) -> Result<Vec<Transaction>, LedgerError> {
    if transaction_ids.len() < rows.len() {
        return Err(LedgerError::InvalidFormat(format!(
            "{} transaction ids supplied for {} data rows",
            transaction_ids.len(),
            rows.len()
        )));
    }

    Ok(rows
        .iter()
        .zip(transaction_ids)
        .map(|(row, id)| build_from_row(row, id, ctx))
        .collect())
}

/// Import path: canonical transaction from a parsed row.
pub fn build_from_row(row: &ParsedRow, id: &str, ctx: &BuildContext) -> Transaction {
    let timestamp = import::normalize_timestamp(
        import::field_cell(row, ImportField::Timestamp).unwrap_or(""),
        &ctx.default_timestamp,
    );

    let tx_hash = import::field_cell(row, ImportField::TxHash)
        .unwrap_or("")
        .to_string();
    let block_number = import::field_cell(row, ImportField::BlockNumber)
        .and_then(|cell| cell.trim().parse::<u64>().ok());
    let from_address = non_empty(import::field_cell(row, ImportField::FromAddress));
    let to_address = non_empty(import::field_cell(row, ImportField::ToAddress));
    let contract_address = non_empty(import::field_cell(row, ImportField::ContractAddress));
    let symbol_cell = non_empty(import::field_cell(row, ImportField::TokenSymbol));

    let value_in = side_value(
        row,
        ImportField::ValueIn,
        symbol_cell.as_deref(),
        contract_address.as_deref(),
    );
    let value_out = side_value(
        row,
        ImportField::ValueOut,
        symbol_cell.as_deref(),
        contract_address.as_deref(),
    );

    let txn_fee = fee_value(row);

    let status = import::field_cell(row, ImportField::Status)
        .map(resolve_status)
        .unwrap_or(TransactionStatus::Failed);

    let classification = ctx.tracked_address.as_deref().map(|tracked| {
        classify(
            from_address.as_deref(),
            to_address.as_deref(),
            tracked,
            value_in.as_ref(),
            value_out.as_ref(),
        )
    });

    Transaction {
        id: id.to_string(),
        tx_hash,
        block_number,
        timestamp,
        from_address,
        to_address,
        contract_address,
        value_in,
        value_out,
        txn_fee,
        historical_price: None,
        current_value: None,
        converted_value: None,
        status,
        error_code: non_empty(import::field_cell(row, ImportField::ErrorCode)),
        method: non_empty(import::field_cell(row, ImportField::Method)),
        classification,
    }
}

/// Token precedence for a value side: explicit symbol column → token hint
/// from the matched header's parenthetical → contract address → "ETH".
fn side_value(
    row: &ParsedRow,
    field: ImportField,
    symbol_cell: Option<&str>,
    contract_address: Option<&str>,
) -> Option<TokenValue> {
    let header = import::field_header(row, field)?;
    let amount = import::parse_value_cell(row.get(header)?)?;

    let resolved_token = symbol_cell
        .map(token::normalize)
        .or_else(|| import::header_token_hint(header).map(|hint| token::normalize(&hint)))
        .or_else(|| contract_address.map(str::to_string))
        .unwrap_or_else(|| "ETH".to_string());

    Some(TokenValue::new(amount, resolved_token))
}

/// Fee is always present; its token comes verbatim from the fee header's
/// parenthetical hint (a populated `TxnFee(DAI)` column implies "DAI"),
/// defaulting to "USD".
fn fee_value(row: &ParsedRow) -> TokenValue {
    match import::field_header(row, ImportField::TxnFee) {
        Some(header) => {
            let amount = row.get(header).map(import::parse_fee_cell).unwrap_or(0.0);
            let fee_token =
                import::header_token_hint(header).unwrap_or_else(|| "USD".to_string());
            TokenValue::new(amount, fee_token)
        }
        None => TokenValue::zero("USD"),
    }
}

/// SUCCESS iff the raw cell is "1" or case-insensitively "success".
pub fn resolve_status(raw: &str) -> TransactionStatus {
    let raw = raw.trim();
    if raw == "1" || raw.eq_ignore_ascii_case("success") {
        TransactionStatus::Success
    } else {
        TransactionStatus::Failed
    }
}

/// Classify a transaction relative to a tracked address.
///
/// Addresses compare lower-cased. Outgoing amount prefers valueOut over
/// valueIn; incoming prefers valueIn over valueOut. Both-or-neither
/// matching yields NEUTRAL with a zero signed amount.
pub fn classify(
    from_address: Option<&str>,
    to_address: Option<&str>,
    tracked_address: &str,
    value_in: Option<&TokenValue>,
    value_out: Option<&TokenValue>,
) -> Classification {
    let tracked = tracked_address.trim().to_lowercase();
    let from_matches = from_address
        .map(|addr| addr.trim().to_lowercase() == tracked)
        .unwrap_or(false);
    let to_matches = to_address
        .map(|addr| addr.trim().to_lowercase() == tracked)
        .unwrap_or(false);

    if from_matches && !to_matches {
        let outgoing = value_out
            .map(|v| v.amount)
            .or_else(|| value_in.map(|v| v.amount))
            .unwrap_or(0.0);
        Classification {
            kind: TransactionType::Expense,
            signed_amount: -outgoing,
        }
    } else if to_matches && !from_matches {
        let incoming = value_in
            .map(|v| v.amount)
            .or_else(|| value_out.map(|v| v.amount))
            .unwrap_or(0.0);
        Classification {
            kind: TransactionType::Income,
            signed_amount: incoming,
        }
    } else {
        Classification {
            kind: TransactionType::Neutral,
            signed_amount: 0.0,
        }
    }
}

// ============================================================================
// MANUAL / API PATH
// ============================================================================

/// Externally-supplied structured input: manual entry, or an explorer API
/// record after the fetch collaborator has decimal-scaled the amounts.
/// No header matching happens here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionInput {
    pub id: Option<String>,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub timestamp: String,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub contract_address: Option<String>,
    pub value_in: Option<TokenValue>,
    pub value_out: Option<TokenValue>,
    pub txn_fee: Option<TokenValue>,
    pub status: Option<TransactionStatus>,
    pub error_code: Option<String>,
    pub method: Option<String>,
}

/// Direct path: canonical transaction from structured input.
///
/// Ids are generated when absent; hashless entries get a synthetic dedup
/// hash so they still participate in merge deduplication.
pub fn build_from_input(input: TransactionInput, tracked_address: Option<&str>) -> Transaction {
    let timestamp = import::parse_datetime(&input.timestamp)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or(input.timestamp);

    let value_in = input.value_in.and_then(sanitize_value);
    let value_out = input.value_out.and_then(sanitize_value);

    let txn_fee = input
        .txn_fee
        .map(|fee| TokenValue {
            amount: if fee.amount > 0.0 { fee.amount } else { 0.0 },
            token: token::normalize(&fee.token),
            usd_value: fee.usd_value,
        })
        .unwrap_or_else(|| TokenValue::zero("USD"));

    let tx_hash = match input.tx_hash {
        Some(hash) if !hash.trim().is_empty() => hash,
        _ => {
            let amount = value_out
                .as_ref()
                .or(value_in.as_ref())
                .map(|v| v.amount)
                .unwrap_or(0.0);
            Transaction::synthetic_hash(
                &timestamp,
                input.from_address.as_deref(),
                input.to_address.as_deref(),
                amount,
            )
        }
    };

    let classification = tracked_address.map(|tracked| {
        classify(
            input.from_address.as_deref(),
            input.to_address.as_deref(),
            tracked,
            value_in.as_ref(),
            value_out.as_ref(),
        )
    });

    Transaction {
        id: input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        tx_hash,
        block_number: input.block_number,
        timestamp,
        from_address: input.from_address,
        to_address: input.to_address,
        contract_address: input.contract_address,
        value_in,
        value_out,
        txn_fee,
        historical_price: None,
        current_value: None,
        converted_value: None,
        status: input.status.unwrap_or(TransactionStatus::Success),
        error_code: input.error_code,
        method: input.method,
        classification,
    }
}

/// Value invariant: amounts must be > 0; tokens are canonicalized.
fn sanitize_value(value: TokenValue) -> Option<TokenValue> {
    if value.amount > 0.0 {
        Some(TokenValue {
            amount: value.amount,
            token: token::normalize(&value.token),
            usd_value: value.usd_value,
        })
    } else {
        None
    }
}

fn non_empty(cell: Option<&str>) -> Option<String> {
    cell.map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::parse_import;

    fn ctx(tracked: Option<&str>) -> BuildContext {
        BuildContext {
            tracked_address: tracked.map(str::to_string),
            default_timestamp: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("tx-{}", i)).collect()
    }

    #[test]
    fn test_value_in_from_header_hint() {
        // Header hint carries the token; zero Value_OUT collapses to None.
        let raw = "\
Transaction Hash,DateTime (UTC),Value_IN(EURe),Value_OUT(EURe),Status
0xaaa,2024-05-01 10:00:00,25.5,0,1
";
        let rows = parse_import(raw).unwrap();
        let txs = build_transactions(&rows, &ids(1), &ctx(None)).unwrap();

        assert_eq!(txs.len(), 1);
        let tx = &txs[0];
        assert_eq!(tx.value_in, Some(TokenValue::new(25.5, "EURe")));
        assert_eq!(tx.value_out, None);
        assert_eq!(tx.timestamp, "2024-05-01T10:00:00Z");
        assert_eq!(tx.status, TransactionStatus::Success);
    }

    #[test]
    fn test_symbol_column_beats_header_hint() {
        let raw = "\
Txhash,TokenSymbol,Value_IN(EURe),Status
0xaaa,usd,10,1
";
        let rows = parse_import(raw).unwrap();
        let txs = build_transactions(&rows, &ids(1), &ctx(None)).unwrap();

        assert_eq!(
            txs[0].value_in.as_ref().unwrap().token,
            "USDC",
            "explicit symbol column wins over the header hint"
        );
    }

    #[test]
    fn test_contract_address_fallback_then_eth() {
        let raw = "\
Txhash,ContractAddress,Value_OUT(x),Status
0xaaa,0xCONTRACT,5,1
0xbbb,,5,1
";
        let rows = parse_import(raw).unwrap();
        let txs = build_transactions(&rows, &ids(2), &ctx(None)).unwrap();

        assert_eq!(txs[0].value_out.as_ref().unwrap().token, "0xCONTRACT");
        assert_eq!(txs[1].value_out.as_ref().unwrap().token, "ETH");
    }

    #[test]
    fn test_fee_token_from_header_variant() {
        let raw = "\
Txhash,TxnFee(DAI),Status
0xaaa,0.002,1
";
        let rows = parse_import(raw).unwrap();
        let txs = build_transactions(&rows, &ids(1), &ctx(None)).unwrap();

        assert_eq!(txs[0].txn_fee, TokenValue::new(0.002, "DAI"));
    }

    #[test]
    fn test_fee_defaults_to_zero_usd() {
        let raw = "\
Txhash,Status
0xaaa,1
";
        let rows = parse_import(raw).unwrap();
        let txs = build_transactions(&rows, &ids(1), &ctx(None)).unwrap();

        assert_eq!(txs[0].txn_fee, TokenValue::zero("USD"));
    }

    #[test]
    fn test_status_resolution() {
        assert_eq!(resolve_status("1"), TransactionStatus::Success);
        assert_eq!(resolve_status("Success"), TransactionStatus::Success);
        assert_eq!(resolve_status("SUCCESS"), TransactionStatus::Success);
        assert_eq!(resolve_status("0"), TransactionStatus::Failed);
        assert_eq!(resolve_status("error"), TransactionStatus::Failed);
        assert_eq!(resolve_status(""), TransactionStatus::Failed);
    }

    #[test]
    fn test_classify_expense() {
        let value_out = TokenValue::new(50.0, "USDC");
        let c = classify(
            Some("0xME"),
            Some("0xshop"),
            "0xme",
            None,
            Some(&value_out),
        );

        assert_eq!(c.kind, TransactionType::Expense);
        assert_eq!(c.signed_amount, -50.0);
    }

    #[test]
    fn test_classify_income() {
        let value_in = TokenValue::new(120.0, "EURe");
        let c = classify(
            Some("0xemployer"),
            Some("0xme"),
            "0xME",
            Some(&value_in),
            None,
        );

        assert_eq!(c.kind, TransactionType::Income);
        assert_eq!(c.signed_amount, 120.0);
    }

    #[test]
    fn test_classify_neutral_both_or_neither() {
        let self_transfer = classify(Some("0xme"), Some("0xme"), "0xme", None, None);
        assert_eq!(self_transfer.kind, TransactionType::Neutral);
        assert_eq!(self_transfer.signed_amount, 0.0);

        let unrelated = classify(Some("0xa"), Some("0xb"), "0xme", None, None);
        assert_eq!(unrelated.kind, TransactionType::Neutral);
        assert_eq!(unrelated.signed_amount, 0.0);
    }

    #[test]
    fn test_classify_expense_falls_back_to_value_in() {
        // Outgoing amount prefers valueOut but falls back to valueIn.
        let value_in = TokenValue::new(10.0, "USDC");
        let c = classify(Some("0xme"), Some("0xb"), "0xme", Some(&value_in), None);

        assert_eq!(c.kind, TransactionType::Expense);
        assert_eq!(c.signed_amount, -10.0);
    }

    #[test]
    fn test_too_few_transaction_ids_fails_whole_batch() {
        let raw = "\
Txhash,Value_OUT(USDC),Status
0xaaa,5,1
0xbbb,6,1
0xccc,7,1
";
        let rows = parse_import(raw).unwrap();
        let result = build_transactions(&rows, &ids(2), &ctx(None));

        assert_eq!(
            result,
            Err(LedgerError::InvalidFormat(
                "2 transaction ids supplied for 3 data rows".to_string()
            ))
        );
    }

    #[test]
    fn test_no_tracked_address_builds_basic_entries() {
        let raw = "\
Txhash,From,To,Value_OUT(USDC),Status
0xaaa,0xme,0xshop,5,1
";
        let rows = parse_import(raw).unwrap();
        let txs = build_transactions(&rows, &ids(1), &ctx(None)).unwrap();

        assert!(txs[0].classification.is_none());
    }

    #[test]
    fn test_tracked_address_builds_classified_entries() {
        let raw = "\
Txhash,From,To,Value_OUT(USDC),Status
0xaaa,0xME,0xshop,5,1
";
        let rows = parse_import(raw).unwrap();
        let txs = build_transactions(&rows, &ids(1), &ctx(Some("0xme"))).unwrap();

        let c = txs[0].classification.expect("classified entry expected");
        assert_eq!(c.kind, TransactionType::Expense);
        assert_eq!(c.signed_amount, -5.0);
    }

    #[test]
    fn test_build_from_input_generates_id_and_synthetic_hash() {
        let input = TransactionInput {
            timestamp: "2024-05-01T10:00:00Z".to_string(),
            from_address: Some("0xme".to_string()),
            to_address: Some("0xshop".to_string()),
            value_out: Some(TokenValue::new(9.99, "usd")),
            ..TransactionInput::default()
        };

        let tx = build_from_input(input, Some("0xme"));

        assert!(!tx.id.is_empty());
        assert_eq!(tx.tx_hash.len(), 64, "hashless entries get a synthetic hash");
        assert_eq!(tx.value_out.as_ref().unwrap().token, "USDC");
        assert_eq!(tx.status, TransactionStatus::Success);
        let c = tx.classification.expect("classified entry expected");
        assert_eq!(c.kind, TransactionType::Expense);
        assert_eq!(c.signed_amount, -9.99);
    }

    #[test]
    fn test_build_from_input_drops_non_positive_values() {
        let input = TransactionInput {
            tx_hash: Some("0xabc".to_string()),
            timestamp: "2024-05-01T10:00:00Z".to_string(),
            value_in: Some(TokenValue::new(0.0, "USDC")),
            value_out: Some(TokenValue::new(-5.0, "EURe")),
            ..TransactionInput::default()
        };

        let tx = build_from_input(input, None);

        assert_eq!(tx.value_in, None);
        assert_eq!(tx.value_out, None);
        assert_eq!(tx.txn_fee, TokenValue::zero("USD"));
    }
}
