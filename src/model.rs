// Canonical data model
// Core record shapes shared by the import, ledger, detection and
// analytics stages. Wire names are camelCase to match the document format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// VALUE TYPES
// ============================================================================

/// A monetary amount denominated in a token, with an optional cached
/// USD equivalent. Immutable once attached to a transaction except through
/// explicit update operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenValue {
    pub amount: f64,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usd_value: Option<f64>,
}

impl TokenValue {
    pub fn new(amount: f64, token: impl Into<String>) -> Self {
        TokenValue {
            amount,
            token: token.into(),
            usd_value: None,
        }
    }

    /// Zero-amount value, used as the fee default.
    pub fn zero(token: impl Into<String>) -> Self {
        TokenValue::new(0.0, token)
    }
}

/// A point-in-time price quotation (historical or current).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceInfo {
    pub amount: f64,
    pub currency: String,
}

// ============================================================================
// TRANSACTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Income,
    Expense,
    Neutral,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "INCOME",
            TransactionType::Expense => "EXPENSE",
            TransactionType::Neutral => "NEUTRAL",
        }
    }
}

/// Address-relative classification. A transaction built without a tracked
/// address never carries one — the basic ledger entry and the classified
/// entry are two shapes, not one shape with fields that may or may not
/// mean anything.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "transactionType")]
    pub kind: TransactionType,

    /// Positive for income, negative for expense, zero for neutral.
    #[serde(rename = "signedAmount")]
    pub signed_amount: f64,
}

/// The central entity.
///
/// Invariants:
/// - `txn_fee` is always present (zero-value default).
/// - `value_in`/`value_out` amounts, when present, are > 0. Non-positive
///   parses collapse to `None`, never to a zero-amount value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Opaque unique identifier, caller-supplied (not derived).
    pub id: String,

    /// Blockchain transaction hash; the natural dedup key within a ledger.
    pub tx_hash: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,

    /// ISO-8601.
    pub timestamp: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_in: Option<TokenValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_out: Option<TokenValue>,

    pub txn_fee: TokenValue,

    // Populated by external pricing/conversion steps, never by import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_price: Option<PriceInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_value: Option<PriceInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_value: Option<PriceInfo>,

    pub status: TransactionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(flatten)]
    pub classification: Option<Classification>,
}

impl Transaction {
    /// Timestamp parsed back to UTC, `None` when malformed.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        crate::import::parse_datetime(&self.timestamp)
    }

    /// `(year, month)` bucket for monthly aggregation.
    pub fn month_key(&self) -> Option<(i32, u32)> {
        use chrono::Datelike;
        let ts = self.parsed_timestamp()?;
        Some((ts.year(), ts.month()))
    }

    /// Dedup hash for manual entries that carry no blockchain hash, so
    /// they still participate in merge deduplication.
    pub fn synthetic_hash(
        timestamp: &str,
        from_address: Option<&str>,
        to_address: Option<&str>,
        amount: f64,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}",
            timestamp,
            from_address.unwrap_or(""),
            to_address.unwrap_or(""),
            amount
        ));
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// LEDGER METADATA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

/// Recomputed wholesale after every ledger change, never independently
/// mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMetadata {
    pub imported_at: DateTime<Utc>,
    pub total_transactions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked_address: Option<String>,
}

impl TransactionMetadata {
    pub fn new() -> Self {
        TransactionMetadata {
            imported_at: Utc::now(),
            total_transactions: 0,
            date_range: None,
            tracked_address: None,
        }
    }
}

impl Default for TransactionMetadata {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

/// One quoted rate. The rates list is flat, keyed by the
/// `(from_currency, to_currency)` pair; on lookup the FIRST matching
/// entry in list order wins — list order is caller-controlled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
}

/// User-controlled configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub base_currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_forex_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exchange_rates: Vec<ExchangeRate>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_currency: "USD".to_string(),
            last_forex_update: None,
            exchange_rates: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_round_trips_camel_case() {
        let tx = Transaction {
            id: "tx-1".to_string(),
            tx_hash: "0xabc".to_string(),
            block_number: Some(123),
            timestamp: "2024-05-01T10:00:00Z".to_string(),
            from_address: Some("0xaaa".to_string()),
            to_address: Some("0xbbb".to_string()),
            contract_address: None,
            value_in: Some(TokenValue::new(25.5, "EURe")),
            value_out: None,
            txn_fee: TokenValue::zero("USD"),
            historical_price: None,
            current_value: None,
            converted_value: None,
            status: TransactionStatus::Success,
            error_code: None,
            method: None,
            classification: Some(Classification {
                kind: TransactionType::Income,
                signed_amount: 25.5,
            }),
        };

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["txHash"], "0xabc");
        assert_eq!(json["valueIn"]["token"], "EURe");
        assert_eq!(json["transactionType"], "INCOME");
        assert_eq!(json["signedAmount"], 25.5);
        assert!(json.get("valueOut").is_none());

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn test_basic_entry_has_no_classification_fields() {
        let tx = Transaction {
            id: "tx-2".to_string(),
            tx_hash: "0xdef".to_string(),
            block_number: None,
            timestamp: "2024-05-01T10:00:00Z".to_string(),
            from_address: None,
            to_address: None,
            contract_address: None,
            value_in: None,
            value_out: None,
            txn_fee: TokenValue::zero("USD"),
            historical_price: None,
            current_value: None,
            converted_value: None,
            status: TransactionStatus::Failed,
            error_code: Some("Out of gas".to_string()),
            method: None,
            classification: None,
        };

        let json = serde_json::to_value(&tx).unwrap();
        assert!(json.get("transactionType").is_none());
        assert!(json.get("signedAmount").is_none());
    }

    #[test]
    fn test_month_key() {
        let mut tx = Transaction {
            id: "tx-3".to_string(),
            tx_hash: "0x1".to_string(),
            block_number: None,
            timestamp: "2024-12-31T23:59:59Z".to_string(),
            from_address: None,
            to_address: None,
            contract_address: None,
            value_in: None,
            value_out: None,
            txn_fee: TokenValue::zero("USD"),
            historical_price: None,
            current_value: None,
            converted_value: None,
            status: TransactionStatus::Success,
            error_code: None,
            method: None,
            classification: None,
        };

        assert_eq!(tx.month_key(), Some((2024, 12)));

        tx.timestamp = "not a date".to_string();
        assert_eq!(tx.month_key(), None);
    }

    #[test]
    fn test_synthetic_hash_is_stable() {
        let h1 = Transaction::synthetic_hash("2024-05-01T10:00:00Z", Some("0xa"), Some("0xb"), 10.0);
        let h2 = Transaction::synthetic_hash("2024-05-01T10:00:00Z", Some("0xa"), Some("0xb"), 10.0);
        let h3 = Transaction::synthetic_hash("2024-05-01T10:00:00Z", Some("0xa"), Some("0xb"), 11.0);

        assert_eq!(h1, h2, "same inputs must produce the same hash");
        assert_ne!(h1, h3, "different amounts must produce different hashes");
        assert_eq!(h1.len(), 64, "SHA-256 hash should be 64 hex characters");
    }
}
