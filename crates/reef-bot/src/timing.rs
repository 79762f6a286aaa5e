//! Update cycle pacing.

use std::time::Duration;

use rand::Rng;

/// Fixed tick plus a uniformly random delay in `[0, max_tick_delay]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTimeController {
    tick_interval: Duration,
    max_tick_delay: Duration,
}

impl IntervalTimeController {
    pub fn new(tick_interval: Duration, max_tick_delay: Duration) -> Self {
        Self {
            tick_interval,
            max_tick_delay,
        }
    }

    pub fn from_millis(tick_interval_ms: u64, max_tick_delay_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(tick_interval_ms),
            Duration::from_millis(max_tick_delay_ms),
        )
    }

    /// Every tick runs a cycle.
    pub fn should_update(&self) -> bool {
        true
    }

    /// How long to sleep before the next cycle.
    pub fn sleep_time(&self) -> Duration {
        let max_ms = self.max_tick_delay.as_millis() as u64;
        if max_ms == 0 {
            return self.tick_interval;
        }
        let jitter = rand::thread_rng().gen_range(0..=max_ms);
        self.tick_interval + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_jitter() {
        let c = IntervalTimeController::from_millis(1_000, 0);
        assert!(c.should_update());
        assert_eq!(c.sleep_time(), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let c = IntervalTimeController::from_millis(1_000, 50);
        for _ in 0..200 {
            let t = c.sleep_time();
            assert!(t >= Duration::from_millis(1_000));
            assert!(t <= Duration::from_millis(1_050));
        }
    }
}
