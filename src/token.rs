// Token symbol normalization
// Canonicalizes free-text token symbols into the three supported
// Gnosis Pay stablecoins. Everything downstream builds on this.

use serde::{Deserialize, Serialize};

/// The supported settlement stablecoins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stablecoin {
    Usdc,
    Eure,
    Gbpe,
}

impl Stablecoin {
    /// Candidate order is load-bearing: ties during detection keep the
    /// earlier coin in this order.
    pub const ALL: [Stablecoin; 3] = [Stablecoin::Usdc, Stablecoin::Eure, Stablecoin::Gbpe];

    /// Canonical display symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Stablecoin::Usdc => "USDC",
            Stablecoin::Eure => "EURe",
            Stablecoin::Gbpe => "GBPe",
        }
    }

    /// ISO currency code the coin settles in.
    pub fn currency_code(&self) -> &'static str {
        match self {
            Stablecoin::Usdc => "USD",
            Stablecoin::Eure => "EUR",
            Stablecoin::Gbpe => "GBP",
        }
    }

    /// Match a canonical symbol back to its coin.
    pub fn from_symbol(symbol: &str) -> Option<Stablecoin> {
        match symbol {
            "USDC" => Some(Stablecoin::Usdc),
            "EURe" => Some(Stablecoin::Eure),
            "GBPe" => Some(Stablecoin::Gbpe),
            _ => None,
        }
    }
}

/// Normalize a free-text token symbol to its canonical display form.
///
/// Comparison is trimmed and upper-cased, but the returned value is the
/// canonical display form ("EURe", not "EURE"). Unrecognized symbols pass
/// through trimmed with their original case. Total: never fails, empty
/// input yields an empty string.
pub fn normalize(token: &str) -> String {
    let trimmed = token.trim();
    match trimmed.to_ascii_uppercase().as_str() {
        "USDC" | "USD" => "USDC".to_string(),
        "EUR" | "EURE" => "EURe".to_string(),
        "GBP" | "GBPE" => "GBPe".to_string(),
        _ => trimmed.to_string(),
    }
}

/// Normalize an optional symbol; `None` yields an empty string.
pub fn normalize_opt(token: Option<&str>) -> String {
    token.map(normalize).unwrap_or_default()
}

/// True iff the symbol normalizes to one of the supported stablecoins.
pub fn is_supported_stablecoin(token: &str) -> bool {
    Stablecoin::from_symbol(&normalize(token)).is_some()
}
