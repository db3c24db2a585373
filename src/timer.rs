use std::ops::Mul;
use std::time::Duration;

use rand::Rng;

// In seconds.
const JITTER_RANGE: f32 = 0.5;

// RFC 6347 Section 4.2.4.1 suggests capping the retransmit timer at 60s.
const MAX_RTO: Duration = Duration::from_secs(60);

/// Per-flight retransmission backoff: a starting RTO doubled on each
/// attempt with a small jitter, capped, with a bounded retry budget.
pub struct ExponentialBackoff {
    start_rto: Duration,
    retries: usize,
    rto: Duration,
    jitter: f32,
    left: usize,
}

impl ExponentialBackoff {
    pub fn new(start_rto: Duration, retries: usize) -> Self {
        Self {
            start_rto,
            retries,
            rto: start_rto,
            jitter: Self::jitter(),
            left: retries,
        }
    }

    /// Rearm for a new flight.
    pub fn reset(&mut self) {
        self.rto = self.start_rto;
        self.jitter = Self::jitter();
        self.left = self.retries;
    }

    pub fn rto(&self) -> Duration {
        if self.jitter < 0.0 {
            let duration = Duration::from_secs_f32(self.jitter.abs());
            self.rto.saturating_sub(duration)
        } else {
            self.rto + Duration::from_secs_f32(self.jitter)
        }
        .max(Duration::from_millis(50))
    }

    // A value between -0.25s and 0.25s
    fn jitter() -> f32 {
        rand::thread_rng().gen::<f32>() * JITTER_RANGE - (JITTER_RANGE / 2.0)
    }

    pub fn attempt(&mut self) {
        let (n, overflow) = self.left.overflowing_sub(1);

        if overflow {
            return;
        }

        self.left = n;
        self.jitter = Self::jitter();
        self.rto = self.rto.mul(2).min(MAX_RTO);
    }

    pub fn can_retry(&self) -> bool {
        self.left > 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn attempts() {
        let mut exp = ExponentialBackoff::new(Duration::from_secs(1), 3);

        let n1 = exp.rto().as_millis();
        assert_eq!(exp.rto().as_millis(), n1);
        assert!(exp.can_retry());

        exp.attempt();
        let n2 = exp.rto().as_millis();
        assert!(n2 > n1);
        assert!(exp.can_retry());

        exp.attempt();
        let n3 = exp.rto().as_millis();
        assert!(n3 > n2);
        assert!(exp.can_retry());

        exp.attempt();
        assert!(!exp.can_retry());

        // Exhausted; further attempts are no-ops.
        let n4 = exp.rto().as_millis();
        exp.attempt();
        assert_eq!(exp.rto().as_millis(), n4);
    }

    #[test]
    fn rto_is_capped() {
        let mut exp = ExponentialBackoff::new(Duration::from_secs(50), 5);
        exp.attempt();
        assert!(exp.rto() <= MAX_RTO + Duration::from_secs(1));
    }

    #[test]
    fn reset_restores_budget() {
        let mut exp = ExponentialBackoff::new(Duration::from_secs(1), 1);
        exp.attempt();
        assert!(!exp.can_retry());
        exp.reset();
        assert!(exp.can_retry());
    }
}
