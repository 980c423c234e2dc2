// In crates/core-types/src/window.rs

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single price observation. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self { timestamp, price }
    }
}

/// An ordered run of price points, most recent last.
///
/// Construction enforces positive prices and strictly increasing timestamps,
/// and keeps at most `max_len` of the newest points.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceWindow {
    points: Vec<PricePoint>,
}

impl PriceWindow {
    pub fn new(mut points: Vec<PricePoint>, max_len: usize) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::EmptyWindow);
        }

        for point in &points {
            if point.price <= Decimal::ZERO {
                return Err(Error::NonPositivePrice {
                    price: point.price,
                    timestamp: point.timestamp,
                });
            }
        }

        for pair in points.windows(2) {
            if pair[0].timestamp >= pair[1].timestamp {
                return Err(Error::NonIncreasingTimestamps {
                    previous: pair[0].timestamp,
                    next: pair[1].timestamp,
                });
            }
        }

        if points.len() > max_len {
            points.drain(..points.len() - max_len);
        }

        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn newest(&self) -> &PricePoint {
        // A window is never empty after construction.
        &self.points[self.points.len() - 1]
    }

    pub fn latest_price(&self) -> Decimal {
        self.newest().price
    }

    /// Prices of the last `count` points, oldest first.
    pub fn tail_prices(&self, count: usize) -> impl Iterator<Item = Decimal> + '_ {
        let skip = self.points.len().saturating_sub(count);
        self.points[skip..].iter().map(|p| p.price)
    }

    /// A window is stale when its newest point is older than `threshold` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        now - self.newest().timestamp > threshold
    }

    /// Returns `Err(StaleWindow)` if the window must not feed a decision.
    pub fn ensure_fresh(&self, now: DateTime<Utc>, threshold: Duration) -> Result<()> {
        if self.is_stale(now, threshold) {
            return Err(Error::StaleWindow {
                newest: self.newest().timestamp,
                threshold_secs: threshold.num_seconds(),
            });
        }
        Ok(())
    }
}
