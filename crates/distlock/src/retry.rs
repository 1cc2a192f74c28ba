//! Wait policies for contended lock acquisition

use std::time::Duration;

use rand::Rng;

/// Wait policy consulted by [`LockClient`](crate::LockClient) between
/// acquisition attempts.
///
/// `attempt` is the number of store attempts already made (so the first
/// call after a failed initial attempt passes `1`). Returns the interval to
/// wait before the next attempt, or `None` when the acquisition must give
/// up. Implementations take `&self` and derive everything from `attempt`,
/// so one strategy value can serve any number of concurrent acquisitions;
/// once `None` is returned for some attempt count it must also be returned
/// for every greater count.
pub trait RetryStrategy: Send + Sync {
    fn next(&self, attempt: u32) -> Option<Duration>;
}

/// Constant wait between attempts, up to `max_attempts` total store
/// attempts.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl FixedInterval {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

impl RetryStrategy for FixedInterval {
    fn next(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then_some(self.interval)
    }
}

/// Doubling wait starting at `initial`, capped at `max_interval`, up to
/// `max_attempts` total store attempts.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max_interval: Duration,
    pub max_attempts: u32,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max_interval: Duration, max_attempts: u32) -> Self {
        Self {
            initial,
            max_interval,
            max_attempts,
        }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        // First wait is `initial`, doubling per attempt. The shift saturates
        // well past any practical cap, so clamp the exponent.
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(30));
        Some(self.initial.saturating_mul(factor).min(self.max_interval))
    }
}

/// Uniform random wait in `[0, max_interval)`, up to `max_attempts` total
/// store attempts. Spreads out herds of contenders waking in lockstep.
#[derive(Debug, Clone)]
pub struct RandomizedInterval {
    pub max_interval: Duration,
    pub max_attempts: u32,
}

impl RandomizedInterval {
    pub fn new(max_interval: Duration, max_attempts: u32) -> Self {
        Self {
            max_interval,
            max_attempts,
        }
    }
}

impl RetryStrategy for RandomizedInterval {
    fn next(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let max_ms = self.max_interval.as_millis() as u64;
        if max_ms == 0 {
            return Some(Duration::ZERO);
        }
        let wait_ms = rand::rng().random_range(0..max_ms);
        Some(Duration::from_millis(wait_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_interval_sequence() {
        let strategy = FixedInterval::new(Duration::from_millis(100), 3);

        assert_eq!(strategy.next(1), Some(Duration::from_millis(100)));
        assert_eq!(strategy.next(2), Some(Duration::from_millis(100)));
        assert_eq!(strategy.next(3), None);
        assert_eq!(strategy.next(4), None);
    }

    #[test]
    fn test_exponential_backoff_doubles_and_caps() {
        let strategy = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(500),
            6,
        );

        assert_eq!(strategy.next(1), Some(Duration::from_millis(100)));
        assert_eq!(strategy.next(2), Some(Duration::from_millis(200)));
        assert_eq!(strategy.next(3), Some(Duration::from_millis(400)));
        // Capped at max_interval from here on
        assert_eq!(strategy.next(4), Some(Duration::from_millis(500)));
        assert_eq!(strategy.next(5), Some(Duration::from_millis(500)));
        assert_eq!(strategy.next(6), None);
    }

    #[test]
    fn test_exponential_backoff_large_attempt_does_not_overflow() {
        let strategy = ExponentialBackoff::new(
            Duration::from_secs(1),
            Duration::from_secs(30),
            u32::MAX,
        );
        assert_eq!(strategy.next(64), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_randomized_interval_bounds() {
        let strategy = RandomizedInterval::new(Duration::from_millis(50), 2);

        for _ in 0..100 {
            let wait = strategy.next(1).unwrap();
            assert!(wait < Duration::from_millis(50));
        }
        assert_eq!(strategy.next(2), None);
    }

    #[test]
    fn test_exhaustion_is_monotone() {
        let strategies: Vec<Box<dyn RetryStrategy>> = vec![
            Box::new(FixedInterval::new(Duration::from_millis(10), 4)),
            Box::new(ExponentialBackoff::new(
                Duration::from_millis(10),
                Duration::from_millis(80),
                4,
            )),
            Box::new(RandomizedInterval::new(Duration::from_millis(10), 4)),
        ];

        for strategy in &strategies {
            assert!(strategy.next(3).is_some());
            for attempt in 4..10 {
                assert!(strategy.next(attempt).is_none());
            }
        }
    }
}
