//! Pause between fallback strategies.

use std::time::Duration;

use rand::Rng;

use crate::config::FallbackConfig;

/// Exponential backoff with jitter, applied before the 2nd, 3rd... strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms }
    }

    pub fn from_config(config: &FallbackConfig) -> Self {
        Self::new(config.backoff_base_ms, config.backoff_max_ms)
    }

    /// No pause at all.
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    /// Delay before the attempt at `index` (0-based). The first attempt and a
    /// zero base never wait.
    pub fn delay(&self, index: u32) -> Duration {
        if index == 0 || self.base_ms == 0 {
            return Duration::ZERO;
        }

        let factor = 2u64.saturating_pow(index - 1);
        let capped = self.base_ms.saturating_mul(factor).min(self.max_ms);

        // 0..10% jitter
        let jitter_range = capped / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }
}
