//! Timer reporter (spec §4.5): composes a histogram and a meter, and
//! renders the percentile block a timer flush emits.

use crate::histogram::HistogramReporter;
use crate::meter::MeterReporter;

/// Reservoir capacity shared by every timer's histogram (spec §3).
pub const RESERVOIR_CAPACITY: usize = 1028;
/// Reservoir decay constant shared by every timer's histogram (spec §3).
pub const RESERVOIR_ALPHA: f64 = 0.015;

/// Tracks the distribution and rate of durations reported against one key.
pub struct TimerReporter {
    histogram: HistogramReporter,
    meter: MeterReporter,
}

impl TimerReporter {
    /// Creates an empty timer anchored at wall-clock time `now`.
    #[must_use]
    pub fn new(now: f64) -> Self {
        Self {
            histogram: HistogramReporter::new(RESERVOIR_CAPACITY, RESERVOIR_ALPHA, now),
            meter: MeterReporter::new(now),
        }
    }

    /// Records a duration `d` observed at `now`. Negative durations are
    /// silently ignored (spec §4.5).
    pub fn update(&mut self, d: f64, now: f64) {
        if d < 0.0 {
            return;
        }
        self.histogram.update(d, now);
        self.meter.mark(1.0);
    }

    /// Advances the underlying meter's EWMA windows by one tick.
    pub fn tick(&mut self) {
        self.meter.tick();
    }

    /// Number of durations recorded since the last clear.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.histogram.count()
    }

    /// Clears the histogram's scalars and reservoir, leaving the meter
    /// (which never resets, per spec §3) untouched.
    pub fn clear(&mut self, now: f64) {
        self.histogram.clear(now);
    }

    /// Percentiles at the fixed set the timer block reports: median,
    /// 75/95/98/99/99.9.
    #[must_use]
    pub fn percentiles(&self) -> TimerPercentiles {
        let p = self
            .histogram
            .percentiles(&[0.5, 0.75, 0.95, 0.98, 0.99, 0.999]);
        TimerPercentiles {
            median: p[0],
            p75: p[1],
            p95: p[2],
            p98: p[3],
            p99: p[4],
            p999: p[5],
        }
    }

    #[must_use]
    pub fn min(&self) -> f64 {
        self.histogram.min()
    }

    #[must_use]
    pub fn max(&self) -> f64 {
        self.histogram.max()
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        self.histogram.mean()
    }

    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.histogram.std_dev()
    }

    pub fn meter(&self) -> &MeterReporter {
        &self.meter
    }

    /// The reservoir's retained sample, unsorted. Used for the trimmed-mean
    /// computation at flush time; within a single reservoir capacity (1028)
    /// of updates this is the full raw sample set.
    #[must_use]
    pub fn snapshot_values(&self) -> Vec<f64> {
        self.histogram.snapshot_values()
    }
}

/// The fixed percentile set a timer block reports (spec §4.5).
pub struct TimerPercentiles {
    pub median: f64,
    pub p75: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub p999: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_durations_are_ignored() {
        let mut t = TimerReporter::new(0.0);
        t.update(-5.0, 1.0);
        assert_eq!(t.count(), 0);
    }

    #[test]
    fn tracks_min_max_and_percentiles() {
        let mut t = TimerReporter::new(0.0);
        for v in 0..100 {
            t.update(v as f64, v as f64);
        }
        assert_eq!(t.min(), 0.0);
        assert_eq!(t.max(), 99.0);
        let p = t.percentiles();
        assert!(p.median >= 49.0 && p.median <= 50.0);
        assert!(p.p99 >= 98.0);
    }

    #[test]
    fn clear_resets_histogram_but_meter_persists() {
        let mut t = TimerReporter::new(0.0);
        t.update(10.0, 0.0);
        t.clear(1.0);
        assert_eq!(t.count(), 0);
        assert_eq!(t.meter().count(), 1.0);
    }
}
