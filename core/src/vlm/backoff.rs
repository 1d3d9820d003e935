//! Exponential backoff for VLM restart attempts after a crash (§4.2):
//! 1, 2, 4, 8, ... seconds, capped at 30 s.

use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    attempt: u32,
    base: Duration,
    cap: Duration,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            attempt: 0,
            base,
            cap,
        }
    }

    /// Default policy: 1s base, 30s cap (§4.2 CRASHED backoff).
    pub fn default_policy() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }

    /// Duration to wait before the next restart attempt; advances internal state.
    pub fn next_delay(&mut self) -> Duration {
        let multiplier = 1u64 << self.attempt.min(31);
        let delay = self.base.saturating_mul(multiplier as u32).min(self.cap);
        self.attempt += 1;
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_until_capped() {
        let mut b = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30));
        let delays: Vec<_> = (0..7).map(|_| b.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
                Duration::from_secs(30),
                Duration::from_secs(30),
            ]
        );
    }

    #[test]
    fn reset_restarts_from_base_delay() {
        let mut b = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30));
        b.next_delay();
        b.next_delay();
        b.reset();
        assert_eq!(b.next_delay(), Duration::from_secs(1));
    }
}
