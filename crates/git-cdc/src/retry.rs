//! Exponential backoff retry policy for batch sink failures.

/// `{max_retries, initial_delay_ms, max_delay_ms, backoff_multiplier,
/// jitter?}`. Delay for attempt `n` is `min(initial * multiplier^n,
/// max_delay)`, optionally scaled by a uniform factor in `[0.5, 1.5]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (0-indexed), before jitter.
    fn base_delay_ms(&self, attempt: u32) -> u64 {
        let scaled = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        (scaled as u64).min(self.max_delay_ms)
    }

    /// Delay before attempt `attempt`, jittered by a uniform factor in
    /// `[0.5, 1.5]` derived from `jitter_seed` (e.g. the event id's hash)
    /// when `self.jitter` is set. Deterministic for a given seed so retry
    /// timing stays reproducible under test; production callers vary the
    /// seed per attempt (e.g. a counter or the batch id).
    pub fn delay_ms(&self, attempt: u32, jitter_seed: u64) -> u64 {
        let base = self.base_delay_ms(attempt);
        if !self.jitter {
            return base;
        }
        let factor = 0.5 + uniform_unit(jitter_seed.wrapping_add(attempt as u64));
        ((base as f64) * factor) as u64
    }
}

/// A fast, deterministic hash-based source of `[0, 1)` values. Not
/// cryptographic; exists only to vary jitter without pulling in an RNG
/// crate for what amounts to one multiply-and-scale per retry.
fn uniform_unit(seed: u64) -> f64 {
    let mut x = seed ^ 0x9E37_79B9_7F4A_7C15;
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^= x >> 31;
    (x >> 11) as f64 / (1u64 << 53) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(policy.delay_ms(0, 0), 100);
        assert_eq!(policy.delay_ms(1, 0), 200);
        assert_eq!(policy.delay_ms(2, 0), 400);
        assert_eq!(policy.delay_ms(10, 0), 1_000);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        };
        for seed in 0..50 {
            let delay = policy.delay_ms(1, seed);
            assert!(delay >= 1_000 && delay <= 3_000, "delay {delay} out of [0.5x,1.5x] range");
        }
    }

    #[test]
    fn jitter_disabled_is_deterministic() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_ms(0, 1), policy.delay_ms(0, 2));
    }
}
