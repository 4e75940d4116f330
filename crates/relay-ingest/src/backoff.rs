use std::time::Duration;

use rand::Rng;

const BASE: Duration = Duration::from_secs(1);
const CAP: Duration = Duration::from_secs(30);
const JITTER_RATIO: f64 = 0.5;
const HEALTHY_RESET_THRESHOLD: Duration = Duration::from_secs(60);

/// Exponential backoff with jitter for the streaming ingester's reconnect
/// loop (§4.2): base 1s, cap 30s, jitter ratio 0.5, reset after the
/// connection has been healthy for 60s.
pub struct Backoff {
    attempt: u32,
}

impl Backoff {
    pub fn new() -> Self {
        Backoff { attempt: 0 }
    }

    /// Delay before the next reconnect attempt, advancing internal state.
    pub fn next_delay(&mut self) -> Duration {
        let exp = BASE.saturating_mul(1u32.checked_shl(self.attempt).unwrap_or(u32::MAX));
        let capped = exp.min(CAP);
        self.attempt = self.attempt.saturating_add(1);

        let jitter_span = capped.mul_f64(JITTER_RATIO);
        let jitter = rand::thread_rng().gen_range(0..=jitter_span.as_millis().max(1) as u64);
        capped - jitter_span + Duration::from_millis(jitter)
    }

    /// Reset the attempt counter once a connection has stayed healthy for
    /// at least [`HEALTHY_RESET_THRESHOLD`].
    pub fn note_connection_duration(&mut self, healthy_for: Duration) {
        if healthy_for >= HEALTHY_RESET_THRESHOLD {
            self.attempt = 0;
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_and_cap() {
        let mut b = Backoff::new();
        let mut last = Duration::ZERO;
        for _ in 0..10 {
            let d = b.next_delay();
            assert!(d <= CAP);
            last = d;
        }
        assert!(last <= CAP);
    }

    #[test]
    fn reset_after_healthy_restarts_from_base() {
        let mut b = Backoff::new();
        for _ in 0..5 {
            b.next_delay();
        }
        b.note_connection_duration(Duration::from_secs(61));
        assert_eq!(b.attempt, 0);
    }

    #[test]
    fn short_connection_does_not_reset() {
        let mut b = Backoff::new();
        b.next_delay();
        b.next_delay();
        b.note_connection_duration(Duration::from_secs(5));
        assert_eq!(b.attempt, 2);
    }
}
