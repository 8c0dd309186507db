//! Jittered exponential backoff schedule.

use std::time::Duration;

use rand::Rng;

/// Endless sequence of retry delays: `base`, `2*base`, `4*base`, ... held
/// at `cap`, each stretched by up to a tenth for jitter.
///
/// The caller decides when to stop pulling.
#[derive(Debug, Clone)]
pub struct Backoff {
    step: Duration,
    cap: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { step: base, cap }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.step.min(self.cap);
        self.step = self.step.saturating_mul(2);
        Some(delay + jitter(delay))
    }
}

fn jitter(delay: Duration) -> Duration {
    let spread = delay / 10;
    if spread.is_zero() {
        return Duration::ZERO;
    }
    rand::thread_rng().gen_range(Duration::ZERO..spread)
}
