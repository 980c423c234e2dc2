// In crates/risk/src/types.rs

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// How much of the funding balance a Buy may commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SizingRule {
    /// Spend this fraction of the available quote balance, in (0, 1].
    FixedFraction { fraction: Decimal },
    /// Spend a fixed quote amount per order.
    FixedQuote { amount: Decimal },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingSettings {
    pub rule: SizingRule,
    /// Fraction of the free base balance sold on a Sell signal.
    #[serde(default = "default_sell_fraction")]
    pub sell_fraction: Decimal,
    /// Orders worth less than this (in quote units) are not placed.
    #[serde(default)]
    pub min_order_notional: Decimal,
    /// Decimal places the exchange accepts for the order quantity.
    #[serde(default = "default_quantity_scale")]
    pub quantity_scale: u32,
}

fn default_sell_fraction() -> Decimal {
    dec!(1)
}

fn default_quantity_scale() -> u32 {
    6
}
