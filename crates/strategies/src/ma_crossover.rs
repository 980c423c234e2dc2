// In crates/strategies/src/ma_crossover.rs

use crate::types::MACrossoverSettings;
use crate::{Error, Result};
use core_types::{PriceWindow, Signal};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The short/long simple moving averages from one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragePair {
    pub short: Decimal,
    pub long: Decimal,
}

/// Simple moving average over the most recent `period` points of the window.
pub fn sma(window: &PriceWindow, period: usize) -> Option<Decimal> {
    if period == 0 || window.len() < period {
        return None;
    }
    let sum: Decimal = window.tail_prices(period).sum();
    Some(sum / Decimal::from(period))
}

/// Crossover rule between the previous and current evaluation.
///
/// Golden cross (short rises above long) is a Buy, death cross is a Sell.
/// With no previous evaluation there is nothing to cross, so it is a Hold.
pub fn crossover(previous: Option<AveragePair>, current: AveragePair) -> Signal {
    let Some(prev) = previous else {
        return Signal::Hold;
    };

    if prev.short <= prev.long && current.short > current.long {
        Signal::Buy
    } else if prev.short >= prev.long && current.short < current.long {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Moving-average crossover signal engine.
///
/// The only state it owns is the averages from the previous evaluation,
/// which the caller may persist and hand back through [`SignalEngine::with_previous`].
#[derive(Debug, Clone)]
pub struct SignalEngine {
    settings: MACrossoverSettings,
    previous: Option<AveragePair>,
}

impl SignalEngine {
    /// Creates a new engine, rejecting periods that cannot form a crossover.
    pub fn new(settings: MACrossoverSettings) -> Result<Self> {
        if settings.short_period == 0 || settings.short_period >= settings.long_period {
            return Err(Error::InvalidPeriods {
                short: settings.short_period,
                long: settings.long_period,
            });
        }
        Ok(Self {
            settings,
            previous: None,
        })
    }

    /// Seeds the engine with averages from an earlier run.
    pub fn with_previous(mut self, previous: Option<AveragePair>) -> Self {
        self.previous = previous;
        self
    }

    /// Replaces the remembered averages, e.g. with state loaded after a restart.
    pub fn restore(&mut self, previous: AveragePair) {
        self.previous = Some(previous);
    }

    pub fn settings(&self) -> &MACrossoverSettings {
        &self.settings
    }

    pub fn previous(&self) -> Option<AveragePair> {
        self.previous
    }

    /// Computes both averages without touching the engine state.
    pub fn averages(&self, window: &PriceWindow) -> Result<AveragePair> {
        let need = self.settings.long_period;
        let insufficient = || Error::InsufficientData {
            have: window.len(),
            need,
        };
        let short = sma(window, self.settings.short_period).ok_or_else(insufficient)?;
        let long = sma(window, self.settings.long_period).ok_or_else(insufficient)?;
        Ok(AveragePair { short, long })
    }

    /// Evaluates one window and remembers its averages for the next call.
    ///
    /// Fails with `InsufficientData` when the window is shorter than the long
    /// period; the remembered averages are left as they were in that case.
    pub fn compute_signal(&mut self, window: &PriceWindow) -> Result<Signal> {
        let current = self.averages(window)?;
        let signal = crossover(self.previous, current);

        tracing::debug!(
            short_sma = %current.short,
            long_sma = %current.long,
            ?signal,
            "Moving averages evaluated."
        );

        self.previous = Some(current);
        Ok(signal)
    }
}
