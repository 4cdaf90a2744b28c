// Stablecoin Spending Ledger - Core Library
// Normalizes blockchain transaction exports into a canonical ledger,
// infers the dominant settlement stablecoin, and aggregates analytics.

pub mod analytics;
pub mod builder;
pub mod convert;
pub mod detector;
pub mod error;
pub mod import;
pub mod ledger;
pub mod model;
pub mod ops;
pub mod token;

// Re-export commonly used types
pub use analytics::{aggregate, Analytics, BudgetAlert, MonthlyBreakdown};
pub use builder::{
    build_from_input, build_from_row, build_transactions, classify, BuildContext,
    TransactionInput,
};
pub use convert::{convert_transaction, find_rate};
pub use detector::{
    detect, detect_or_no_data, DetectedBaseCurrency, DetectionPolicy, RankingMetric,
    StablecoinTally, StablecoinVolume, NO_DATA_REASON,
};
pub use error::{ErrorKind, LedgerError, OperationError};
pub use import::{parse_import, ImportField, ParsedRow};
pub use ledger::{Ledger, MergeSummary, TransactionPatch};
pub use model::{
    Classification, DateRange, ExchangeRate, PriceInfo, Settings, TokenValue, Transaction,
    TransactionMetadata, TransactionStatus, TransactionType,
};
pub use ops::{LedgerState, Operation, OperationRecord};
pub use token::{is_supported_stablecoin, normalize, Stablecoin};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
