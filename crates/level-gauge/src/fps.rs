//! Sliding-window throughput counter.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Counts processing completions inside a trailing time window (one second
/// by default), so the reported rate is an actual throughput rather than an
/// inverse of the last frame's latency.
#[derive(Debug)]
pub struct FpsWindow {
    window: Duration,
    completions: VecDeque<Instant>,
}

impl Default for FpsWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsWindow {
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            completions: VecDeque::new(),
        }
    }

    /// Record one completed iteration at `now`.
    pub fn record(&mut self, now: Instant) {
        self.evict(now);
        self.completions.push_back(now);
    }

    /// Completions whose timestamps fall within the trailing window at
    /// `now`. With the default one-second window this is the FPS.
    pub fn rate(&mut self, now: Instant) -> f32 {
        self.evict(now);
        self.completions.len() as f32
    }

    pub fn clear(&mut self) {
        self.completions.clear();
    }

    fn evict(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };
        while self
            .completions
            .front()
            .is_some_and(|&t| t <= cutoff)
        {
            self.completions.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_the_trailing_window() {
        let base = Instant::now();
        let mut fps = FpsWindow::new();
        for i in 0..10 {
            fps.record(base + Duration::from_millis(i * 100));
        }
        // At t = 900ms all ten completions are within one second.
        assert_eq!(fps.rate(base + Duration::from_millis(900)), 10.0);
        // At t = 1350ms, completions at 0..=300ms have aged out.
        assert_eq!(fps.rate(base + Duration::from_millis(1350)), 6.0);
    }

    #[test]
    fn completions_exactly_one_window_old_are_evicted() {
        let base = Instant::now();
        let mut fps = FpsWindow::new();
        fps.record(base);
        assert_eq!(fps.rate(base + Duration::from_secs(1)), 0.0);
    }

    #[test]
    fn empty_window_reports_zero() {
        let mut fps = FpsWindow::new();
        assert_eq!(fps.rate(Instant::now()), 0.0);
    }

    #[test]
    fn clear_drops_history() {
        let base = Instant::now();
        let mut fps = FpsWindow::new();
        fps.record(base);
        fps.record(base + Duration::from_millis(10));
        fps.clear();
        assert_eq!(fps.rate(base + Duration::from_millis(20)), 0.0);
    }
}
