//! Delays between worker cycles.

use std::time::Duration;

/// How long the worker waits after each kind of cycle.
///
/// Geocoding back-off (short delay and quota cooldown) is decided by the
/// geocoder itself via `RetryDelays`; these are the remaining waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// After an empty poll, a skipped tile, or a queue/store read failure.
    pub idle: Duration,
    /// Target length of a cycle that called the geocoder successfully.
    /// Bounds the provider request rate.
    pub steady: Duration,
    /// After a failed write to the tile store.
    pub error_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(15),
            steady: Duration::from_secs(40),
            error_delay: Duration::from_secs(15),
        }
    }
}

impl Pacing {
    /// Remaining wait after a steady-state cycle that already took
    /// `elapsed`, i.e. `max(steady - elapsed, 0)`.
    #[must_use]
    pub const fn steady_after(&self, elapsed: Duration) -> Duration {
        self.steady.saturating_sub(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtracts_time_already_spent() {
        let pacing = Pacing::default();
        assert_eq!(
            pacing.steady_after(Duration::from_secs(15)),
            Duration::from_secs(25)
        );
        assert_eq!(
            pacing.steady_after(Duration::from_millis(39_500)),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn clamps_to_zero_for_slow_cycles() {
        let pacing = Pacing::default();
        assert_eq!(pacing.steady_after(Duration::from_secs(40)), Duration::ZERO);
        assert_eq!(pacing.steady_after(Duration::from_secs(95)), Duration::ZERO);
    }
}
