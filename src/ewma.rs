//! Exponentially weighted moving average (spec §4.3).
//!
//! Three instances back a [`crate::meter::MeterReporter`], one each for the
//! 1-, 5-, and 15-minute windows, all driven by the same 5-second tick
//! quantum.

/// A single exponentially weighted moving rate, cold until its first tick.
pub struct Ewma {
    interval_secs: f64,
    alpha: f64,
    uncounted: f64,
    /// Negative until the first `tick()`, per spec §4.3.
    rate: f64,
}

impl Ewma {
    /// Creates an EWMA with the given tick `interval` (seconds) and moving
    /// `window` (seconds), e.g. `(5.0, 60.0)` for the 1-minute rate.
    #[must_use]
    pub fn new(interval_secs: f64, window_secs: f64) -> Self {
        Self {
            interval_secs,
            alpha: 1.0 - (-interval_secs / window_secs).exp(),
            uncounted: 0.0,
            rate: -1.0,
        }
    }

    /// Adds `n` pending marks, folded in on the next `tick()`.
    pub fn update(&mut self, n: f64) {
        self.uncounted += n;
    }

    /// Advances the moving average by one tick interval.
    pub fn tick(&mut self) {
        let instant = self.uncounted / self.interval_secs;
        if self.rate < 0.0 {
            self.rate = instant;
        } else {
            self.rate += self.alpha * (instant - self.rate);
        }
        self.uncounted = 0.0;
    }

    /// The current per-second rate; reads as 0 before the first tick.
    #[must_use]
    pub fn rate(&self) -> f64 {
        if self.rate < 0.0 {
            0.0
        } else {
            self.rate
        }
    }
}
