use std::time::{Duration, Instant};

use crate::shared::constants::{FPS_REFRESH, FPS_WINDOW};

/// Rolling frames-per-second estimate for the playback loop.
///
/// Iteration times accumulate until either the window fills or the
/// refresh interval passes, then the estimate becomes the inverse of the
/// mean iteration time and the window restarts. Before the first refresh
/// the estimate reads 0.
pub struct FpsCounter {
    samples: Vec<f64>,
    window: usize,
    refresh: Duration,
    last_refresh: Instant,
    value: f64,
}

impl FpsCounter {
    pub fn new(window: usize, refresh: Duration) -> Self {
        Self {
            samples: Vec::with_capacity(window),
            window: window.max(1),
            refresh,
            last_refresh: Instant::now(),
            value: 0.0,
        }
    }

    pub fn record(&mut self, iteration: Duration) {
        self.samples.push(iteration.as_secs_f64());

        let window_full = self.samples.len() >= self.window;
        let refresh_due = self.last_refresh.elapsed() >= self.refresh;
        if window_full || refresh_due {
            let mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
            self.value = if mean > 0.0 { 1.0 / mean } else { 0.0 };
            self.samples.clear();
            self.last_refresh = Instant::now();
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(FPS_WINDOW, FPS_REFRESH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// A refresh interval long enough that only the window triggers.
    const NEVER: Duration = Duration::from_secs(3600);

    #[test]
    fn test_initial_value_is_zero() {
        let counter = FpsCounter::new(10, NEVER);
        assert_relative_eq!(counter.value(), 0.0);
    }

    #[test]
    fn test_no_update_until_window_fills() {
        let mut counter = FpsCounter::new(5, NEVER);
        for _ in 0..4 {
            counter.record(Duration::from_millis(10));
        }
        assert_relative_eq!(counter.value(), 0.0);
    }

    #[test]
    fn test_window_full_computes_mean_rate() {
        let mut counter = FpsCounter::new(5, NEVER);
        for _ in 0..5 {
            counter.record(Duration::from_millis(20));
        }
        assert_relative_eq!(counter.value(), 50.0, epsilon = 0.5);
    }

    #[test]
    fn test_window_restarts_after_refresh() {
        let mut counter = FpsCounter::new(3, NEVER);
        for _ in 0..3 {
            counter.record(Duration::from_millis(10)); // 100 fps
        }
        assert_relative_eq!(counter.value(), 100.0, epsilon = 1.0);

        // A new, slower window replaces the estimate entirely
        for _ in 0..3 {
            counter.record(Duration::from_millis(40)); // 25 fps
        }
        assert_relative_eq!(counter.value(), 25.0, epsilon = 0.5);
    }

    #[test]
    fn test_mixed_iteration_times_average() {
        let mut counter = FpsCounter::new(2, NEVER);
        counter.record(Duration::from_millis(10));
        counter.record(Duration::from_millis(30));
        // mean 20ms → 50 fps
        assert_relative_eq!(counter.value(), 50.0, epsilon = 0.5);
    }

    #[test]
    fn test_refresh_interval_triggers_early() {
        let mut counter = FpsCounter::new(1000, Duration::from_millis(0));
        counter.record(Duration::from_millis(10));
        // Zero refresh interval: every record refreshes
        assert_relative_eq!(counter.value(), 100.0, epsilon = 1.0);
    }
}
