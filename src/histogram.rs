//! Histogram reporter (spec §4.2): exact min/max/count/sum/stddev over a
//! decaying reservoir, with reservoir-backed percentile estimates.

use crate::reservoir::Reservoir;

/// Wraps a [`Reservoir`] with exact running scalars.
pub struct HistogramReporter {
    reservoir: Reservoir,
    reservoir_capacity: usize,
    reservoir_alpha: f64,
    min: f64,
    max: f64,
    count: u64,
    sum: f64,
    // Welford's running M2 for variance.
    mean_acc: f64,
    m2: f64,
}

impl HistogramReporter {
    /// Creates a new, empty histogram reporter with a reservoir of the
    /// given `capacity` and decay constant `alpha`, anchored at `now`.
    #[must_use]
    pub fn new(capacity: usize, alpha: f64, now: f64) -> Self {
        Self {
            reservoir: Reservoir::new(capacity, alpha, now),
            reservoir_capacity: capacity,
            reservoir_alpha: alpha,
            min: f64::MAX,
            max: f64::MIN,
            count: 0,
            sum: 0.0,
            mean_acc: 0.0,
            m2: 0.0,
        }
    }

    /// Records `value` observed at wall-clock time `now`.
    pub fn update(&mut self, value: f64, now: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean_acc;
        self.mean_acc += delta / self.count as f64;
        let delta2 = value - self.mean_acc;
        self.m2 += delta * delta2;

        self.reservoir.update(value, now);
    }

    /// Resets all scalars and the reservoir.
    pub fn clear(&mut self, now: f64) {
        self.min = f64::MAX;
        self.max = f64::MIN;
        self.count = 0;
        self.sum = 0.0;
        self.mean_acc = 0.0;
        self.m2 = 0.0;
        self.reservoir = Reservoir::new(self.reservoir_capacity, self.reservoir_alpha, now);
    }

    /// Total number of updates recorded since the last `clear`.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// The smallest recorded value, or 0 if empty.
    #[must_use]
    pub fn min(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.min
        }
    }

    /// The largest recorded value, or 0 if empty.
    #[must_use]
    pub fn max(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.max
        }
    }

    /// The arithmetic mean of all recorded values, or 0 if empty.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// The sample standard deviation, or 0 if fewer than 2 values recorded.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        if self.count > 1 {
            (self.m2 / (self.count - 1) as f64).sqrt()
        } else {
            0.0
        }
    }

    /// The reservoir's currently retained sample, unsorted.
    #[must_use]
    pub fn snapshot_values(&self) -> Vec<f64> {
        self.reservoir.values()
    }

    /// Estimated values at each of `percentiles` (each in `[0, 1]`), using
    /// the reservoir's retained sample (spec §4.2).
    #[must_use]
    pub fn percentiles(&self, percentiles: &[f64]) -> Vec<f64> {
        let mut values = self.reservoir.values();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = values.len();

        percentiles
            .iter()
            .map(|p| {
                if n == 0 {
                    0.0
                } else {
                    let idx = (p * n as f64).round() as i64;
                    if idx >= 1 {
                        values[(idx as usize - 1).min(n - 1)]
                    } else {
                        0.0
                    }
                }
            })
            .collect()
    }
}
