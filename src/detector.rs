// Base-currency detection
// Infers the dominant settlement stablecoin from per-coin transaction
// counts and volumes, with an explicit ranking policy and tie-breaking.

use crate::model::{TokenValue, Transaction};
use crate::token::{self, Stablecoin};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Reason attached to the "no data" sentinel. User-visible, so the exact
/// wording matters.
pub const NO_DATA_REASON: &str = "No Gnosis Pay stablecoin transactions found";

// ============================================================================
// POLICY
// ============================================================================

/// Which metric ranks candidates first. Historical call sites disagreed
/// on this, so it is a named configuration rather than a hard-coded rule:
/// the analytics recalculation path ran count-first, the standalone
/// detection path volume-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RankingMetric {
    CountFirst,
    VolumeFirst,
}

/// Detection configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionPolicy {
    pub primary: RankingMetric,

    /// Whether transaction fee tokens count toward the tallies. Call sites
    /// historically disagreed here too; excluding fees is the default
    /// since fee tokens are often chain-native rather than settlement
    /// currency.
    pub include_fees: bool,
}

impl DetectionPolicy {
    pub fn count_first() -> Self {
        DetectionPolicy {
            primary: RankingMetric::CountFirst,
            include_fees: false,
        }
    }

    pub fn volume_first() -> Self {
        DetectionPolicy {
            primary: RankingMetric::VolumeFirst,
            include_fees: false,
        }
    }
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self::count_first()
    }
}

// ============================================================================
// TALLIES
// ============================================================================

/// Per-stablecoin transaction counts, serialized under the coin symbols.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StablecoinTally {
    #[serde(rename = "USDC")]
    pub usdc: u32,
    #[serde(rename = "EURe")]
    pub eure: u32,
    #[serde(rename = "GBPe")]
    pub gbpe: u32,
}

impl StablecoinTally {
    pub fn get(&self, coin: Stablecoin) -> u32 {
        match coin {
            Stablecoin::Usdc => self.usdc,
            Stablecoin::Eure => self.eure,
            Stablecoin::Gbpe => self.gbpe,
        }
    }

    fn bump(&mut self, coin: Stablecoin) {
        match coin {
            Stablecoin::Usdc => self.usdc += 1,
            Stablecoin::Eure => self.eure += 1,
            Stablecoin::Gbpe => self.gbpe += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.usdc + self.eure + self.gbpe
    }
}

/// Per-stablecoin volume sums over ABSOLUTE amounts, never net/signed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StablecoinVolume {
    #[serde(rename = "USDC")]
    pub usdc: f64,
    #[serde(rename = "EURe")]
    pub eure: f64,
    #[serde(rename = "GBPe")]
    pub gbpe: f64,
}

impl StablecoinVolume {
    pub fn get(&self, coin: Stablecoin) -> f64 {
        match coin {
            Stablecoin::Usdc => self.usdc,
            Stablecoin::Eure => self.eure,
            Stablecoin::Gbpe => self.gbpe,
        }
    }

    fn add(&mut self, coin: Stablecoin, amount: f64) {
        match coin {
            Stablecoin::Usdc => self.usdc += amount,
            Stablecoin::Eure => self.eure += amount,
            Stablecoin::Gbpe => self.gbpe += amount,
        }
    }
}

// ============================================================================
// RESULT
// ============================================================================

/// Derived, cached detection result. Recomputed whenever analytics are
/// recalculated, never incrementally maintained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedBaseCurrency {
    pub stablecoin: String,
    pub currency_code: String,
    /// In [0.4, 1.0] for real detections: near 1.0 for a clean win, near
    /// 0.4 for a narrow one.
    pub confidence: f64,
    pub transaction_counts: StablecoinTally,
    pub total_volume: StablecoinVolume,
    /// Human-readable explanation of which metric and margin drove the
    /// decision. Shown to the user, not just logged.
    pub reason: String,
}

impl DetectedBaseCurrency {
    /// Zero-valued sentinel for call sites that want "no data" as a value
    /// rather than an absence.
    pub fn no_data() -> Self {
        DetectedBaseCurrency {
            stablecoin: String::new(),
            currency_code: String::new(),
            confidence: 0.0,
            transaction_counts: StablecoinTally::default(),
            total_volume: StablecoinVolume::default(),
            reason: NO_DATA_REASON.to_string(),
        }
    }
}

// ============================================================================
// DETECTION
// ============================================================================

/// The dimension that actually separated the top candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metric {
    Count,
    Volume,
}

impl Metric {
    fn label(&self) -> &'static str {
        match self {
            Metric::Count => "transaction count",
            Metric::Volume => "total volume",
        }
    }

    fn format(&self, value: f64) -> String {
        match self {
            Metric::Count => format!("{}", value as u64),
            Metric::Volume => format!("{:.2}", value),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    coin: Stablecoin,
    count: u32,
    volume: f64,
}

impl Candidate {
    fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Count => self.count as f64,
            Metric::Volume => self.volume,
        }
    }
}

/// Scan the ledger's stablecoin-denominated flows and infer the dominant
/// settlement currency. Pure over its input snapshot; returns `None` when
/// no stablecoin flow exists.
pub fn detect(transactions: &[Transaction], policy: DetectionPolicy) -> Option<DetectedBaseCurrency> {
    let mut counts = StablecoinTally::default();
    let mut volume = StablecoinVolume::default();

    for tx in transactions {
        for value in [tx.value_in.as_ref(), tx.value_out.as_ref()]
            .into_iter()
            .flatten()
        {
            tally(value, &mut counts, &mut volume);
        }
        // Zero-amount fees carry no signal even when their token maps to
        // a stablecoin.
        if policy.include_fees && tx.txn_fee.amount > 0.0 {
            tally(&tx.txn_fee, &mut counts, &mut volume);
        }
    }

    if counts.total() == 0 {
        debug!("no stablecoin flows in ledger snapshot");
        return None;
    }

    let (primary, secondary) = match policy.primary {
        RankingMetric::CountFirst => (Metric::Count, Metric::Volume),
        RankingMetric::VolumeFirst => (Metric::Volume, Metric::Count),
    };

    // Stable sort: on full ties, Stablecoin::ALL order decides.
    let mut ranked: Vec<Candidate> = Stablecoin::ALL
        .iter()
        .map(|&coin| Candidate {
            coin,
            count: counts.get(coin),
            volume: volume.get(coin),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.metric(primary)
            .partial_cmp(&a.metric(primary))
            .unwrap_or(Ordering::Equal)
    });

    let top = ranked[0];
    let second = ranked[1];

    let (winner, decisive, top_value, second_value, reason) = if top.metric(primary)
        != second.metric(primary)
    {
        let (top_value, second_value) = (top.metric(primary), second.metric(primary));
        let reason = format!(
            "{} selected by {}: {} vs {} ({:.1}% margin)",
            top.coin.symbol(),
            primary.label(),
            primary.format(top_value),
            primary.format(second_value),
            margin_percent(top_value, second_value),
        );
        (top, primary, top_value, second_value, reason)
    } else if top.metric(secondary) != second.metric(secondary) {
        // Exact tie on the primary metric: the secondary decides.
        let (winner, loser) = if second.metric(secondary) > top.metric(secondary) {
            (second, top)
        } else {
            (top, second)
        };
        let (top_value, second_value) = (winner.metric(secondary), loser.metric(secondary));
        let reason = format!(
            "{} selected by {} tie-break: {} vs {} ({:.1}% margin) after {} tie",
            winner.coin.symbol(),
            secondary.label(),
            secondary.format(top_value),
            secondary.format(second_value),
            margin_percent(top_value, second_value),
            primary.label(),
        );
        (winner, secondary, top_value, second_value, reason)
    } else {
        // Neither metric separates the top two: the primary-sort leader
        // is kept and the confidence floor applies.
        let reason = format!(
            "{} retained by candidate order: {} and {} tied on transaction count and total volume",
            top.coin.symbol(),
            top.coin.symbol(),
            second.coin.symbol(),
        );
        (top, primary, top.metric(primary), second.metric(primary), reason)
    };

    let confidence = confidence_score(top_value, second_value);
    debug!(
        stablecoin = winner.coin.symbol(),
        metric = decisive.label(),
        confidence,
        "base currency detected"
    );

    Some(DetectedBaseCurrency {
        stablecoin: winner.coin.symbol().to_string(),
        currency_code: winner.coin.currency_code().to_string(),
        confidence,
        transaction_counts: counts,
        total_volume: volume,
        reason,
    })
}

/// Like `detect`, but yields the zero-valued sentinel instead of `None`.
pub fn detect_or_no_data(
    transactions: &[Transaction],
    policy: DetectionPolicy,
) -> DetectedBaseCurrency {
    detect(transactions, policy).unwrap_or_else(DetectedBaseCurrency::no_data)
}

fn tally(value: &TokenValue, counts: &mut StablecoinTally, volume: &mut StablecoinVolume) {
    if let Some(coin) = Stablecoin::from_symbol(&token::normalize(&value.token)) {
        counts.bump(coin);
        volume.add(coin, value.amount.abs());
    }
}

/// `0.6 * min(gap / max(top, 1), 1) + 0.4`, yielding [0.4, 1.0].
fn confidence_score(top_value: f64, second_value: f64) -> f64 {
    let gap = top_value - second_value;
    0.6 * (gap / top_value.max(1.0)).min(1.0) + 0.4
}

fn margin_percent(top_value: f64, second_value: f64) -> f64 {
    100.0 * (top_value - second_value) / top_value.max(1.0)
}
