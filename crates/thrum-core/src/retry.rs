//! Backoff calculation shared by the projector's `SQLITE_BUSY` retry loop
//! and the sync engine's push-rejection retry loop.

use std::time::Duration;

use rand::Rng;

/// Linear backoff with jitter: `min(attempt * step, cap)  ±  jitter_frac`.
#[derive(Clone, Copy, Debug)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub step: Duration,
    pub cap: Duration,
    pub jitter_frac: f64,
}

impl RetryConfig {
    #[must_use]
    pub const fn new(max_attempts: u32, step: Duration, cap: Duration) -> Self {
        Self {
            max_attempts,
            step,
            cap,
            jitter_frac: 0.25,
        }
    }

    /// Delay to sleep before retry attempt `attempt` (1-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = u128::from(attempt) * self.step.as_millis();
        let capped_ms = base_ms.min(self.cap.as_millis());
        let capped_ms = u64::try_from(capped_ms).unwrap_or(u64::MAX);

        let mut rng = rand::rng();
        let jitter = rng.random_range(-self.jitter_frac..=self.jitter_frac);
        let jittered = (capped_ms as f64) * (1.0 + jitter);
        Duration::from_millis(jittered.max(0.0) as u64)
    }
}
