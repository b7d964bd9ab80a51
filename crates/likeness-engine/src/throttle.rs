use std::time::{Duration, Instant};

/// Rate limit for embedding runs.
///
/// Face localisation runs on every frame; embedding only when at least
/// `min_interval` has passed since the last granted run.
#[derive(Debug, Clone)]
pub struct EmbedThrottle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl EmbedThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Grant a run at `now` if the interval has elapsed. Records the grant.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        let ready = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        };
        if ready {
            self.last = Some(now);
        }
        ready
    }

    /// Forget the last grant so the next call succeeds.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_always_granted() {
        let mut throttle = EmbedThrottle::new(Duration::from_secs(60));
        assert!(throttle.try_acquire(Instant::now()));
    }

    #[test]
    fn test_interval_enforced() {
        let mut throttle = EmbedThrottle::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(throttle.try_acquire(t0));
        assert!(!throttle.try_acquire(t0 + Duration::from_millis(499)));
        assert!(throttle.try_acquire(t0 + Duration::from_millis(500)));
        assert!(!throttle.try_acquire(t0 + Duration::from_millis(600)));
    }

    #[test]
    fn test_zero_interval_never_blocks() {
        let mut throttle = EmbedThrottle::new(Duration::ZERO);
        let t0 = Instant::now();
        assert!(throttle.try_acquire(t0));
        assert!(throttle.try_acquire(t0));
    }

    #[test]
    fn test_reset() {
        let mut throttle = EmbedThrottle::new(Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(throttle.try_acquire(t0));
        throttle.reset();
        assert!(throttle.try_acquire(t0));
    }
}
