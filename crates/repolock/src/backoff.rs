//! Randomized, capped backoff between acquisition attempts.

use std::time::Duration;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

const INITIAL_DELAY: Duration = Duration::from_secs(2);
const MAX_DELAY: Duration = Duration::from_secs(10);

// Jitter amounts are tunable, not load-bearing. The max-delay jitter is
// drawn once per scheduler, the growth jitter fresh on every step.
const INITIAL_JITTER_MS: u64 = 1_000;
const MAX_DELAY_JITTER_MS: u64 = 1_000;
const GROWTH_JITTER_MS: u64 = 2_000;

/// Produces successive wait durations for one `acquire` call.
///
/// Starts near two seconds, grows by a random increment per step and
/// caps near ten seconds. Jitter keeps competitors that started at the
/// same instant from retrying in lockstep.
pub struct BackoffScheduler<R: Rng = SmallRng> {
    delay: Duration,
    max_delay: Duration,
    rng: R,
}

impl BackoffScheduler<SmallRng> {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_os_rng())
    }
}

impl Default for BackoffScheduler<SmallRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> BackoffScheduler<R> {
    /// Build a scheduler on a caller-supplied randomness source, so tests
    /// can seed it deterministically.
    pub fn with_rng(mut rng: R) -> Self {
        let delay = INITIAL_DELAY + Duration::from_millis(rng.random_range(0..INITIAL_JITTER_MS));
        let max_delay = MAX_DELAY + Duration::from_millis(rng.random_range(0..MAX_DELAY_JITTER_MS));
        Self {
            delay,
            max_delay,
            rng,
        }
    }

    /// Next wait duration, growing the one after it.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.delay;
        let grown = self.delay + Duration::from_millis(self.rng.random_range(0..GROWTH_JITTER_MS));
        self.delay = grown.min(self.max_delay);
        current
    }
}
