// Operations surface
// The action vocabulary the core executes, one operation at a time, in
// whatever order the owning log replays them. Structural errors abort the
// operation; `apply_recorded` attaches them to an audit record instead.

use crate::analytics::{self, Analytics};
use crate::builder::{self, BuildContext, TransactionInput};
use crate::convert;
use crate::detector::{self, DetectedBaseCurrency, DetectionPolicy};
use crate::error::{LedgerError, OperationError};
use crate::import;
use crate::ledger::{Ledger, TransactionPatch};
use crate::model::{ExchangeRate, Settings};
use crate::token;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

// ============================================================================
// DOCUMENT STATE
// ============================================================================

/// The document the operations run against: the ledger, user settings,
/// and the derived snapshots the caller stores back. The core never
/// retains references across calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerState {
    pub ledger: Ledger,
    pub settings: Settings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<Analytics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_base_currency: Option<DetectedBaseCurrency>,
    #[serde(default)]
    pub detection_policy: DetectionPolicy,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// One user action. Serialized form uses the action names of the owning
/// document log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Operation {
    #[serde(rename = "import-batch")]
    ImportBatch {
        raw_text: String,
        transaction_ids: Vec<String>,
        tracked_address: Option<String>,
        excluded_contracts: Vec<String>,
        default_timestamp: String,
    },

    #[serde(rename = "add-one")]
    AddOne { input: TransactionInput },

    #[serde(rename = "update-one")]
    UpdateOne { id: String, patch: TransactionPatch },

    #[serde(rename = "delete-one")]
    DeleteOne { id: String },

    #[serde(rename = "set-base-currency")]
    SetBaseCurrency { currency: String },

    #[serde(rename = "update-exchange-rates")]
    UpdateExchangeRates { rates: Vec<ExchangeRate> },

    #[serde(rename = "convert-transaction-values")]
    ConvertTransactionValues,

    #[serde(rename = "calculate-analytics")]
    CalculateAnalytics,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ImportBatch { .. } => "import-batch",
            Operation::AddOne { .. } => "add-one",
            Operation::UpdateOne { .. } => "update-one",
            Operation::DeleteOne { .. } => "delete-one",
            Operation::SetBaseCurrency { .. } => "set-base-currency",
            Operation::UpdateExchangeRates { .. } => "update-exchange-rates",
            Operation::ConvertTransactionValues => "convert-transaction-values",
            Operation::CalculateAnalytics => "calculate-analytics",
        }
    }
}

/// Audit record for one applied operation. Call sites that must not throw
/// keep the structured failure here instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    pub record_id: String,
    pub applied_at: DateTime<Utc>,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl OperationRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

impl LedgerState {
    /// Execute one operation. Structural errors abort the whole operation
    /// and surface to the caller; nothing is partially applied for the
    /// all-or-nothing preconditions.
    pub fn apply(&mut self, op: Operation) -> Result<(), LedgerError> {
        match op {
            Operation::ImportBatch {
                raw_text,
                transaction_ids,
                tracked_address,
                excluded_contracts,
                default_timestamp,
            } => {
                let rows = import::parse_import(&raw_text)?;
                let ctx = BuildContext {
                    tracked_address: tracked_address.clone(),
                    default_timestamp,
                };
                let incoming = builder::build_transactions(&rows, &transaction_ids, &ctx)?;
                let excluded: HashSet<String> = excluded_contracts.into_iter().collect();
                let summary = self
                    .ledger
                    .import_batch(incoming, &excluded, tracked_address)?;
                debug!(
                    added = summary.added,
                    duplicates = summary.duplicates,
                    excluded = summary.excluded,
                    "import batch merged"
                );
                Ok(())
            }

            Operation::AddOne { input } => {
                let tracked = self.ledger.metadata.tracked_address.clone();
                let tx = builder::build_from_input(input, tracked.as_deref());
                self.ledger.add_one(tx);
                Ok(())
            }

            Operation::UpdateOne { id, patch } => self.ledger.update_one(&id, &patch),

            Operation::DeleteOne { id } => self.ledger.delete_one(&id).map(|_| ()),

            Operation::SetBaseCurrency { currency } => {
                self.settings.base_currency = token::normalize(&currency);
                Ok(())
            }

            Operation::UpdateExchangeRates { rates } => {
                self.settings.exchange_rates = rates;
                self.settings.last_forex_update = Some(Utc::now());
                Ok(())
            }

            Operation::ConvertTransactionValues => {
                let target = self.settings.base_currency.clone();
                for tx in &mut self.ledger.transactions {
                    convert::convert_transaction(tx, &self.settings.exchange_rates, &target);
                }
                Ok(())
            }

            Operation::CalculateAnalytics => {
                self.calculate_analytics();
                Ok(())
            }
        }
    }

    /// Error-as-data mode: the operation's outcome lands on the record,
    /// never on the call stack.
    pub fn apply_recorded(&mut self, op: Operation) -> OperationRecord {
        let operation = op.name().to_string();
        let error = self.apply(op).err().map(|err| OperationError::from(&err));
        OperationRecord {
            record_id: Uuid::new_v4().to_string(),
            applied_at: Utc::now(),
            operation,
            error,
        }
    }

    /// Recompute the derived snapshots. Detection is always re-run here —
    /// callers that only asked for analytics still get a fresh cached
    /// detection, and an empty ledger clears it.
    pub fn calculate_analytics(&mut self) {
        if self.ledger.transactions.is_empty() {
            self.analytics = Some(Analytics::empty());
            self.detected_base_currency = None;
            return;
        }

        self.detected_base_currency =
            detector::detect(&self.ledger.transactions, self.detection_policy);
        self.analytics = Some(analytics::aggregate(
            &self.ledger.transactions,
            &self.settings.base_currency,
        ));
    }
}
