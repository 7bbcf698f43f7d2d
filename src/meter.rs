//! Meter reporter (spec §4.4): mark count, mean rate, and three EWMA
//! windows, rendered as a fixed five-line Graphite block.

use crate::ewma::Ewma;

const TICK_INTERVAL_SECS: f64 = 5.0;
const ONE_MINUTE_SECS: f64 = 60.0;
const FIVE_MINUTES_SECS: f64 = 5.0 * 60.0;
const FIFTEEN_MINUTES_SECS: f64 = 15.0 * 60.0;

/// Tracks the rate of occurrence of an event for the lifetime of its key.
pub struct MeterReporter {
    count: f64,
    start_time: f64,
    rate_1m: Ewma,
    rate_5m: Ewma,
    rate_15m: Ewma,
}

impl MeterReporter {
    /// Creates a meter anchored at wall-clock time `now`.
    #[must_use]
    pub fn new(now: f64) -> Self {
        Self {
            count: 0.0,
            start_time: now,
            rate_1m: Ewma::new(TICK_INTERVAL_SECS, ONE_MINUTE_SECS),
            rate_5m: Ewma::new(TICK_INTERVAL_SECS, FIVE_MINUTES_SECS),
            rate_15m: Ewma::new(TICK_INTERVAL_SECS, FIFTEEN_MINUTES_SECS),
        }
    }

    /// Records `n` occurrences (an ingested meter message may carry a
    /// non-1 value).
    pub fn mark(&mut self, n: f64) {
        self.count += n;
        self.rate_1m.update(n);
        self.rate_5m.update(n);
        self.rate_15m.update(n);
    }

    /// Advances all three moving averages by one 5-second tick.
    pub fn tick(&mut self) {
        self.rate_1m.tick();
        self.rate_5m.tick();
        self.rate_15m.tick();
    }

    /// Total marks recorded.
    #[must_use]
    pub fn count(&self) -> f64 {
        self.count
    }

    /// The mean rate since construction, in events per second.
    #[must_use]
    pub fn mean_rate(&self, now: f64) -> f64 {
        let elapsed = now - self.start_time;
        if elapsed <= 0.0 {
            0.0
        } else {
            self.count / elapsed
        }
    }

    /// One-minute EWMA rate.
    #[must_use]
    pub fn one_minute_rate(&self) -> f64 {
        self.rate_1m.rate()
    }

    /// Five-minute EWMA rate.
    #[must_use]
    pub fn five_minute_rate(&self) -> f64 {
        self.rate_5m.rate()
    }

    /// Fifteen-minute EWMA rate.
    #[must_use]
    pub fn fifteen_minute_rate(&self) -> f64 {
        self.rate_15m.rate()
    }

    /// Renders the fixed 5-line Graphite block for this meter under `prefix`
    /// (spec §4.4/§4.6: `<prefix>.count`, `.mean_rate`, `.1minute_rate`,
    /// `.5minute_rate`, `.15minute_rate`), at wall-clock time `now`.
    pub fn render(&self, prefix: &str, now: f64, timestamp: i64, out: &mut Vec<(String, f64, i64)>) {
        out.push((format!("{prefix}.count"), self.count, timestamp));
        out.push((format!("{prefix}.mean_rate"), self.mean_rate(now), timestamp));
        out.push((
            format!("{prefix}.1minute_rate"),
            self.one_minute_rate(),
            timestamp,
        ));
        out.push((
            format!("{prefix}.5minute_rate"),
            self.five_minute_rate(),
            timestamp,
        ));
        out.push((
            format!("{prefix}.15minute_rate"),
            self.fifteen_minute_rate(),
            timestamp,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_no_rates_or_count() {
        let m = MeterReporter::new(0.0);
        assert_eq!(m.count(), 0.0);
        assert_eq!(m.one_minute_rate(), 0.0);
        assert_eq!(m.five_minute_rate(), 0.0);
        assert_eq!(m.fifteen_minute_rate(), 0.0);
        assert_eq!(m.mean_rate(0.0), 0.0);
    }

    #[test]
    fn mean_rate_tracks_elapsed_time() {
        let mut m = MeterReporter::new(0.0);
        m.mark(1.0);
        assert!((m.mean_rate(10.0) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn ticking_twelve_times_over_a_minute_converges_rates() {
        let mut m = MeterReporter::new(0.0);
        for _ in 0..12 {
            m.mark(5.0);
            m.tick();
        }
        // 5 marks per 5s = 1/s steady state
        assert!((m.one_minute_rate() - 1.0).abs() < 0.2);
        assert!(m.one_minute_rate() >= m.five_minute_rate());
        assert!(m.five_minute_rate() >= m.fifteen_minute_rate());
    }
}
