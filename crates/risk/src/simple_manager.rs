// In crates/risk/src/simple_manager.rs

use crate::types::{SizingRule, SizingSettings};
use crate::{Error, OrderPlan, PositionSizer, Result};
use core_types::{Balance, Side};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Sizes orders from a configured rule.
///
/// Buys commit either a fraction of the free quote balance or a fixed quote
/// amount; sells release a fraction of the free base balance. Quantities are
/// truncated to the exchange's scale and orders under the minimum notional are refused.
#[derive(Debug, Clone)]
pub struct RuleBasedSizer {
    settings: SizingSettings,
}

impl RuleBasedSizer {
    /// Creates a sizer after checking its parameters make sense.
    pub fn new(settings: SizingSettings) -> Result<Self> {
        match &settings.rule {
            SizingRule::FixedFraction { fraction } => {
                if *fraction <= Decimal::ZERO || *fraction > dec!(1) {
                    return Err(Error::InvalidParameters(format!(
                        "fixed_fraction must be in (0, 1], got {fraction}"
                    )));
                }
            }
            SizingRule::FixedQuote { amount } => {
                if *amount <= Decimal::ZERO {
                    return Err(Error::InvalidParameters(format!(
                        "fixed_quote amount must be positive, got {amount}"
                    )));
                }
            }
        }
        if settings.sell_fraction <= Decimal::ZERO || settings.sell_fraction > dec!(1) {
            return Err(Error::InvalidParameters(format!(
                "sell_fraction must be in (0, 1], got {}",
                settings.sell_fraction
            )));
        }
        if settings.min_order_notional < Decimal::ZERO {
            return Err(Error::InvalidParameters(
                "min_order_notional cannot be negative".to_string(),
            ));
        }
        Ok(Self { settings })
    }

    fn truncate(&self, quantity: Decimal) -> Decimal {
        quantity.round_dp_with_strategy(self.settings.quantity_scale, RoundingStrategy::ToZero)
    }

    fn buy_quantity(&self, funding: &Balance, price: Decimal) -> Result<Decimal> {
        let spend = match &self.settings.rule {
            SizingRule::FixedFraction { fraction } => funding.available * *fraction,
            SizingRule::FixedQuote { amount } => *amount,
        };
        if spend > funding.available || funding.available <= Decimal::ZERO {
            return Err(Error::InsufficientBalance {
                asset: funding.asset.clone(),
                available: funding.available,
                required: spend,
            });
        }
        Ok(self.truncate(spend / price))
    }

    fn sell_quantity(&self, funding: &Balance) -> Result<Decimal> {
        if funding.available <= Decimal::ZERO {
            return Err(Error::InsufficientBalance {
                asset: funding.asset.clone(),
                available: funding.available,
                required: Decimal::ZERO,
            });
        }
        Ok(self.truncate(funding.available * self.settings.sell_fraction))
    }
}

impl PositionSizer for RuleBasedSizer {
    fn name(&self) -> &'static str {
        "RuleBasedSizer"
    }

    fn plan(&self, side: Side, funding: &Balance, price: Decimal) -> Result<OrderPlan> {
        if price <= Decimal::ZERO {
            return Err(Error::InvalidParameters(format!(
                "price must be positive, got {price}"
            )));
        }

        let quantity = match side {
            Side::Buy => self.buy_quantity(funding, price)?,
            Side::Sell => self.sell_quantity(funding)?,
        };

        let notional = quantity * price;
        if quantity.is_zero() || notional < self.settings.min_order_notional {
            return Err(Error::BelowMinimumNotional {
                notional,
                minimum: self.settings.min_order_notional,
            });
        }

        Ok(OrderPlan {
            side,
            quantity,
            notional,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(asset: &str, available: Decimal) -> Balance {
        Balance {
            asset: asset.to_string(),
            available,
            locked: Decimal::ZERO,
        }
    }

    fn fraction_sizer(fraction: Decimal, min_notional: Decimal) -> RuleBasedSizer {
        RuleBasedSizer::new(SizingSettings {
            rule: SizingRule::FixedFraction { fraction },
            sell_fraction: dec!(1),
            min_order_notional: min_notional,
            quantity_scale: 4,
        })
        .unwrap()
    }

    #[test]
    fn test_buy_uses_fraction_of_quote() {
        let sizer = fraction_sizer(dec!(0.5), dec!(10));
        let plan = sizer
            .plan(Side::Buy, &balance("USDT", dec!(1000)), dec!(200))
            .unwrap();

        // 1000 * 0.5 = 500 USDT at 200 = 2.5
        assert_eq!(plan.quantity, dec!(2.5));
        assert_eq!(plan.notional, dec!(500));
    }

    #[test]
    fn test_quantity_truncated_to_scale() {
        let sizer = fraction_sizer(dec!(1), dec!(0));
        let plan = sizer
            .plan(Side::Buy, &balance("USDT", dec!(100)), dec!(3))
            .unwrap();

        assert_eq!(plan.quantity, dec!(33.3333));
        assert!(plan.notional <= dec!(100));
    }

    #[test]
    fn test_sell_releases_free_base() {
        let sizer = fraction_sizer(dec!(0.5), dec!(10));
        let plan = sizer
            .plan(Side::Sell, &balance("BTC", dec!(0.75)), dec!(100))
            .unwrap();

        assert_eq!(plan.quantity, dec!(0.75));
        assert_eq!(plan.notional, dec!(75));
    }

    #[test]
    fn test_empty_balance_is_insufficient() {
        let sizer = fraction_sizer(dec!(0.5), dec!(10));
        let result = sizer.plan(Side::Sell, &balance("BTC", Decimal::ZERO), dec!(100));

        assert!(matches!(result, Err(Error::InsufficientBalance { .. })));
    }

    #[test]
    fn test_below_minimum_notional_refused() {
        let sizer = fraction_sizer(dec!(0.5), dec!(5000));
        let result = sizer.plan(Side::Buy, &balance("KRW", dec!(8000)), dec!(100));

        assert_eq!(
            result,
            Err(Error::BelowMinimumNotional {
                notional: dec!(4000),
                minimum: dec!(5000),
            })
        );
    }

    #[test]
    fn test_fixed_quote_needs_enough_balance() {
        let sizer = RuleBasedSizer::new(SizingSettings {
            rule: SizingRule::FixedQuote { amount: dec!(250) },
            sell_fraction: dec!(1),
            min_order_notional: dec!(10),
            quantity_scale: 6,
        })
        .unwrap();

        let ok = sizer.plan(Side::Buy, &balance("USDT", dec!(300)), dec!(50)).unwrap();
        assert_eq!(ok.quantity, dec!(5));

        let short = sizer.plan(Side::Buy, &balance("USDT", dec!(200)), dec!(50));
        assert!(matches!(short, Err(Error::InsufficientBalance { .. })));
    }

    #[test]
    fn test_rejects_bad_fraction() {
        let result = RuleBasedSizer::new(SizingSettings {
            rule: SizingRule::FixedFraction { fraction: dec!(1.5) },
            sell_fraction: dec!(1),
            min_order_notional: dec!(0),
            quantity_scale: 6,
        });
        assert!(matches!(result, Err(Error::InvalidParameters(_))));
    }
}
