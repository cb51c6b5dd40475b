//! Rate pairs served by the engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::UnknownPairError;

/// Source label used when the hardcoded default is served.
pub const DEFAULT_SOURCE: &str = "Tasa por Defecto";

/// Source label used for operator-injected rates.
pub const MANUAL_SOURCE: &str = "Manual";

/// One of the three independently fetched, validated and stored rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatePair {
    /// Official Banco Central de Venezuela USD/VES rate.
    Bcv,
    /// Binance P2P USDT/VES market rate.
    Binance,
    /// USD/CNY rate.
    Cny,
}

impl RatePair {
    /// All pairs, in the order they are mounted and reported.
    pub const ALL: [RatePair; 3] = [RatePair::Bcv, RatePair::Binance, RatePair::Cny];

    /// URL segment and CLI name.
    pub fn slug(&self) -> &'static str {
        match self {
            RatePair::Bcv => "bcv",
            RatePair::Binance => "binance",
            RatePair::Cny => "cny",
        }
    }

    /// Human-readable currency pair.
    pub fn currency_pair(&self) -> &'static str {
        match self {
            RatePair::Bcv | RatePair::Binance => "USD/VES",
            RatePair::Cny => "USD/CNY",
        }
    }

    /// Table holding this pair's rate records.
    pub fn table(&self) -> &'static str {
        match self {
            RatePair::Bcv => "exchange_rates_bcv",
            RatePair::Binance => "exchange_rates_binance",
            RatePair::Cny => "exchange_rates_cny",
        }
    }

    /// Exclusive plausibility bounds `(min, max)`.
    pub fn bounds(&self) -> (Decimal, Decimal) {
        match self {
            RatePair::Bcv | RatePair::Binance => (Decimal::from(10), Decimal::from(500)),
            RatePair::Cny => (Decimal::from(5), Decimal::from(10)),
        }
    }

    /// Last-resort rate served when every source and the store come up empty.
    pub fn default_rate(&self) -> Decimal {
        match self {
            RatePair::Bcv => Decimal::new(29951, 2),
            RatePair::Binance => Decimal::new(35000, 2),
            RatePair::Cny => Decimal::new(725, 2),
        }
    }
}

impl fmt::Display for RatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for RatePair {
    type Err = UnknownPairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bcv" => Ok(RatePair::Bcv),
            "binance" => Ok(RatePair::Binance),
            "cny" => Ok(RatePair::Cny),
            other => Err(UnknownPairError(other.to_string())),
        }
    }
}
