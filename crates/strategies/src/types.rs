// In crates/strategies/src/types.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct MACrossoverSettings {
    /// Number of most recent points in the fast average.
    pub short_period: usize,
    /// Number of most recent points in the slow average. Also the window length.
    pub long_period: usize,
}

impl MACrossoverSettings {
    /// How many points a window must hold for one evaluation.
    pub fn window_len(&self) -> usize {
        self.short_period.max(self.long_period)
    }
}
