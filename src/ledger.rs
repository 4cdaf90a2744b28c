// Ledger merge and lifecycle
// Appends import batches with txHash dedup and contract exclusion, and
// recomputes metadata after every change.

use crate::error::LedgerError;
use crate::model::{
    DateRange, PriceInfo, TokenValue, Transaction, TransactionMetadata, TransactionStatus,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// The running transaction collection plus its derived metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    pub transactions: Vec<Transaction>,
    pub metadata: TransactionMetadata,
}

/// Outcome tallies for one merge call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: usize,
    pub duplicates: usize,
    pub excluded: usize,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger {
            transactions: Vec::new(),
            metadata: TransactionMetadata::new(),
        }
    }

    /// Bulk import entry point. An empty incoming batch is a user error
    /// here — single-transaction add goes through `add_one` instead.
    pub fn import_batch(
        &mut self,
        incoming: Vec<Transaction>,
        excluded_contracts: &HashSet<String>,
        tracked_address: Option<String>,
    ) -> Result<MergeSummary, LedgerError> {
        if incoming.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }
        Ok(self.merge(incoming, excluded_contracts, tracked_address))
    }

    /// Add a single transaction. Dedup still applies; returns whether the
    /// transaction actually entered the ledger.
    pub fn add_one(&mut self, tx: Transaction) -> bool {
        let tracked = self.metadata.tracked_address.clone();
        let summary = self.merge(vec![tx], &HashSet::new(), tracked);
        summary.added == 1
    }

    /// Merge incoming transactions into the ledger.
    ///
    /// An incoming transaction is dropped when its hash is already present —
    /// across the whole merge, including hashes added earlier in the same
    /// batch — or when its contract address is excluded (case-insensitive).
    /// Survivor order is preserved; survivors append after existing entries.
    fn merge(
        &mut self,
        incoming: Vec<Transaction>,
        excluded_contracts: &HashSet<String>,
        tracked_address: Option<String>,
    ) -> MergeSummary {
        let excluded: HashSet<String> = excluded_contracts
            .iter()
            .map(|addr| addr.to_lowercase())
            .collect();

        let mut seen: HashSet<String> = self
            .transactions
            .iter()
            .map(|tx| tx.tx_hash.clone())
            .collect();

        let mut summary = MergeSummary::default();
        let mut added: Vec<Transaction> = Vec::new();

        for tx in incoming {
            let contract_excluded = tx
                .contract_address
                .as_deref()
                .map(|addr| excluded.contains(&addr.to_lowercase()))
                .unwrap_or(false);
            if contract_excluded {
                debug!(tx_hash = %tx.tx_hash, "dropping transaction from excluded contract");
                summary.excluded += 1;
                continue;
            }

            if !seen.insert(tx.tx_hash.clone()) {
                debug!(tx_hash = %tx.tx_hash, "dropping duplicate transaction");
                summary.duplicates += 1;
                continue;
            }

            added.push(tx);
        }

        summary.added = added.len();

        // Date range comes from the transactions added in THIS call; when
        // none of them parsed to a valid date, the previous range stands.
        let added_range = date_range_of(&added);
        let previous_range = self.metadata.date_range.take();

        self.transactions.extend(added);
        self.metadata = TransactionMetadata {
            imported_at: Utc::now(),
            total_transactions: self.transactions.len(),
            date_range: added_range.or(previous_range),
            tracked_address,
        };

        summary
    }

    /// Partial-field update. Fails with NotFound for unknown ids.
    pub fn update_one(&mut self, id: &str, patch: &TransactionPatch) -> Result<(), LedgerError> {
        let tx = self
            .transactions
            .iter_mut()
            .find(|tx| tx.id == id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
        patch.apply_to(tx);
        self.metadata.total_transactions = self.transactions.len();
        Ok(())
    }

    /// Delete by id. Fails with NotFound for unknown ids.
    pub fn delete_one(&mut self, id: &str) -> Result<Transaction, LedgerError> {
        let index = self
            .transactions
            .iter()
            .position(|tx| tx.id == id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
        let removed = self.transactions.remove(index);
        self.metadata.total_transactions = self.transactions.len();
        Ok(removed)
    }
}

fn date_range_of(transactions: &[Transaction]) -> Option<DateRange> {
    let timestamps: Vec<DateTime<Utc>> = transactions
        .iter()
        .filter_map(|tx| tx.parsed_timestamp())
        .collect();

    let start = timestamps.iter().min()?;
    let end = timestamps.iter().max()?;
    Some(DateRange {
        start_date: start.to_rfc3339_opts(SecondsFormat::Secs, true),
        end_date: end.to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

// ============================================================================
// PARTIAL PATCH
// ============================================================================

/// Partial update: every field independently optional, absent fields stay
/// unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionPatch {
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub timestamp: Option<String>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub contract_address: Option<String>,
    pub value_in: Option<TokenValue>,
    pub value_out: Option<TokenValue>,
    pub txn_fee: Option<TokenValue>,
    pub historical_price: Option<PriceInfo>,
    pub current_value: Option<PriceInfo>,
    pub converted_value: Option<PriceInfo>,
    pub status: Option<TransactionStatus>,
    pub error_code: Option<String>,
    pub method: Option<String>,
}

impl TransactionPatch {
    pub fn apply_to(&self, tx: &mut Transaction) {
        if let Some(tx_hash) = &self.tx_hash {
            tx.tx_hash = tx_hash.clone();
        }
        if let Some(block_number) = self.block_number {
            tx.block_number = Some(block_number);
        }
        if let Some(timestamp) = &self.timestamp {
            tx.timestamp = timestamp.clone();
        }
        if let Some(from_address) = &self.from_address {
            tx.from_address = Some(from_address.clone());
        }
        if let Some(to_address) = &self.to_address {
            tx.to_address = Some(to_address.clone());
        }
        if let Some(contract_address) = &self.contract_address {
            tx.contract_address = Some(contract_address.clone());
        }
        if let Some(value_in) = &self.value_in {
            tx.value_in = Some(value_in.clone());
        }
        if let Some(value_out) = &self.value_out {
            tx.value_out = Some(value_out.clone());
        }
        if let Some(txn_fee) = &self.txn_fee {
            tx.txn_fee = txn_fee.clone();
        }
        if let Some(historical_price) = &self.historical_price {
            tx.historical_price = Some(historical_price.clone());
        }
        if let Some(current_value) = &self.current_value {
            tx.current_value = Some(current_value.clone());
        }
        if let Some(converted_value) = &self.converted_value {
            tx.converted_value = Some(converted_value.clone());
        }
        if let Some(status) = self.status {
            tx.status = status;
        }
        if let Some(error_code) = &self.error_code {
            tx.error_code = Some(error_code.clone());
        }
        if let Some(method) = &self.method {
            tx.method = Some(method.clone());
        }
    }
}
