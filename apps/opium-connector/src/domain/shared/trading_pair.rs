//! Trading pair value object.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tradeable instrument identifier.
///
/// Opium instruments are derivative contracts quoted against a collateral
/// asset, e.g. `OEX_FUT_1JAN_135.00-DAI`: everything before the final `-`
/// names the contract (base), the suffix names the quote asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradingPair(String);

impl TradingPair {
    /// Create a trading pair from an instrument name.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the full instrument name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The base (contract) part of the instrument name.
    ///
    /// Falls back to the whole name when no quote suffix is present.
    #[must_use]
    pub fn base(&self) -> &str {
        self.0.rsplit_once('-').map_or(self.0.as_str(), |(b, _)| b)
    }

    /// The quote asset part of the instrument name.
    #[must_use]
    pub fn quote(&self) -> Option<&str> {
        self.0.rsplit_once('-').map(|(_, q)| q)
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TradingPair {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for TradingPair {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TradingPair {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
