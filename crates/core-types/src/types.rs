// In crates/core-types/src/types.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// An exchange symbol, e.g. "BTCUSDT".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tradable pair together with the assets that make it up.
///
/// The base asset is what a Buy acquires; the quote asset is what it spends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingPair {
    pub symbol: Symbol,
    pub base_asset: String,
    pub quote_asset: String,
}

impl TradingPair {
    pub fn new(symbol: &str, base_asset: &str, quote_asset: &str) -> Self {
        Self {
            symbol: Symbol(symbol.to_string()),
            base_asset: base_asset.to_string(),
            quote_asset: quote_asset.to_string(),
        }
    }

    /// The asset whose balance must cover an order on the given side.
    pub fn funding_asset(&self, side: Side) -> &str {
        match side {
            Side::Buy => &self.quote_asset,
            Side::Sell => &self.base_asset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buy" => Ok(Side::Buy),
            "Sell" => Ok(Side::Sell),
            other => Err(Error::UnknownVariant {
                field: "side",
                value: other.to_string(),
            }),
        }
    }
}

/// The output of the signal engine for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// The order side this signal asks for, if any.
    pub fn side(&self) -> Option<Side> {
        match self {
            Signal::Buy => Some(Side::Buy),
            Signal::Sell => Some(Side::Sell),
            Signal::Hold => None,
        }
    }
}

/// A balance as reported by the exchange.
///
/// Only valid for the cycle that fetched it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    /// Free amount that can back a new order.
    pub available: Decimal,
    /// Amount held by open orders.
    pub locked: Decimal,
}

impl Balance {
    pub fn empty(asset: &str) -> Self {
        Self {
            asset: asset.to_string(),
            available: Decimal::ZERO,
            locked: Decimal::ZERO,
        }
    }
}
