use anyhow::{Error, bail};
use rand::Rng;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    Constant,
    ExponentialWithJitter,
}

impl FromStr for BackoffStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "constant" | "fixed" => Ok(BackoffStrategy::Constant),
            "exponential" | "exponential_with_jitter" => Ok(BackoffStrategy::ExponentialWithJitter),
            other => bail!("Unknown reconnect strategy: {}", other),
        }
    }
}

/// Delay between reconnect attempts. Attempts are never capped.
#[derive(Debug, Clone)]
pub struct Backoff {
    strategy: BackoffStrategy,
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(strategy: BackoffStrategy, base: Duration, max: Duration) -> Self {
        Self {
            strategy,
            base,
            max: max.max(base),
            attempt: 0,
        }
    }

    pub fn constant(delay: Duration) -> Self {
        Self::new(BackoffStrategy::Constant, delay, delay)
    }

    pub fn strategy(&self) -> BackoffStrategy {
        self.strategy
    }

    /// Failed attempts since the last successful connection.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        match self.strategy {
            BackoffStrategy::Constant => self.base,
            BackoffStrategy::ExponentialWithJitter => {
                let factor = 2_u32.saturating_pow(self.attempt - 1);
                let delay = self.base.saturating_mul(factor).min(self.max);
                // Half of the delay is fixed, the other half is random.
                let half = delay / 2;
                let jitter_ms = rand::rng().random_range(0..=half.as_millis() as u64);
                half + Duration::from_millis(jitter_ms)
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::constant(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_never_grows() {
        let mut backoff = Backoff::default();
        for _ in 0..50 {
            assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        }
        assert_eq!(backoff.attempt(), 50);
    }

    #[test]
    fn test_exponential_is_bounded() {
        let mut backoff = Backoff::new(
            BackoffStrategy::ExponentialWithJitter,
            Duration::from_secs(1),
            Duration::from_secs(30),
        );
        let expected_caps = [1, 2, 4, 8, 16, 30, 30, 30];
        for cap in expected_caps {
            let cap = Duration::from_secs(cap);
            let delay = backoff.next_delay();
            assert!(delay >= cap / 2 && delay <= cap, "{:?} not within {:?}", delay, cap);
        }
    }

    #[test]
    fn test_reset() {
        let mut backoff = Backoff::new(
            BackoffStrategy::ExponentialWithJitter,
            Duration::from_secs(1),
            Duration::from_secs(30),
        );
        for _ in 0..10 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert!(backoff.next_delay() <= Duration::from_secs(1));
    }

    #[test]
    fn test_many_attempts_do_not_overflow() {
        let mut backoff = Backoff::new(
            BackoffStrategy::ExponentialWithJitter,
            Duration::from_secs(5),
            Duration::from_secs(300),
        );
        for _ in 0..200 {
            assert!(backoff.next_delay() <= Duration::from_secs(300));
        }
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!(
            "constant".parse::<BackoffStrategy>().unwrap(),
            BackoffStrategy::Constant
        );
        assert_eq!(
            "Exponential".parse::<BackoffStrategy>().unwrap(),
            BackoffStrategy::ExponentialWithJitter
        );
        assert!("linear".parse::<BackoffStrategy>().is_err());
    }
}
