//! Exponentially decaying reservoir (spec §4.1).
//!
//! A weighted reservoir sampler biased toward recent observations: each
//! update draws a priority that decays with age, and once the reservoir is
//! full, new samples evict the lowest-priority (oldest, roughly) entry
//! rather than the value currently considered least representative.

use rand::{Rng, RngCore};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

const RESCALE_INTERVAL_SECS: f64 = 60.0 * 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    priority: f64,
    value: f64,
    // tie-breaker so two equal-priority entries still compare consistently
    seq: u64,
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .partial_cmp(&other.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(self.seq.cmp(&other.seq))
    }
}

/// A bounded-size, exponentially-weighted sample of real values.
///
/// Not `Send`/`Sync` by design: the engine that owns a reservoir is a
/// single-writer actor (spec §5), so no internal synchronization is
/// needed.
pub struct Reservoir {
    capacity: usize,
    alpha: f64,
    start_time: f64,
    next_scale_time: f64,
    count: u64,
    entries: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
    rng: Box<dyn RngCore>,
}

impl Reservoir {
    /// Creates a reservoir of the given `capacity` and decay constant
    /// `alpha`, anchored at wall-clock time `now` (seconds).
    #[must_use]
    pub fn new(capacity: usize, alpha: f64, now: f64) -> Self {
        Self::new_with_rng(capacity, alpha, now, Box::new(rand::thread_rng()))
    }

    /// As [`Reservoir::new`], but with an injectable RNG source for
    /// deterministic tests.
    #[must_use]
    pub fn new_with_rng(capacity: usize, alpha: f64, now: f64, rng: Box<dyn RngCore>) -> Self {
        Self {
            capacity,
            alpha,
            start_time: now,
            next_scale_time: now + RESCALE_INTERVAL_SECS,
            count: 0,
            entries: BinaryHeap::with_capacity(capacity),
            next_seq: 0,
            rng,
        }
    }

    /// Total number of updates ever seen (may exceed `size()`).
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Number of entries currently retained.
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    fn uniform_zero_exclusive_one_inclusive(&mut self) -> f64 {
        // gen::<f64>() samples [0, 1); flip to (0, 1] so priorities never divide by zero.
        1.0 - self.rng.gen::<f64>()
    }

    /// Records `value` observed at wall-clock time `now` (spec §4.1 Update).
    pub fn update(&mut self, value: f64, now: f64) {
        let u = self.uniform_zero_exclusive_one_inclusive();
        let priority = (self.alpha * (now - self.start_time)).exp() / u;

        self.count += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        let entry = Entry {
            priority,
            value,
            seq,
        };

        if self.entries.len() < self.capacity {
            self.entries.push(Reverse(entry));
        } else if let Some(Reverse(min_entry)) = self.entries.peek() {
            if priority > min_entry.priority {
                self.entries.pop();
                self.entries.push(Reverse(entry));
            }
            // else: discard, the new sample loses to the reservoir's floor
        }

        if now >= self.next_scale_time {
            self.rescale(now);
        }
    }

    /// Rescales stored priorities to prevent unbounded growth as wall time
    /// advances (spec §4.1 Rescale), run automatically by `update` once per
    /// hour of wall time.
    pub fn rescale(&mut self, now: f64) {
        let old_start = self.start_time;
        self.start_time = now;
        self.next_scale_time = now + RESCALE_INTERVAL_SECS;

        let factor = (-self.alpha * (now - old_start)).exp();
        let rescaled: BinaryHeap<Reverse<Entry>> = self
            .entries
            .drain()
            .map(|Reverse(mut e)| {
                e.priority *= factor;
                Reverse(e)
            })
            .collect();
        self.entries = rescaled;
    }

    /// A snapshot of the values currently retained; order is unspecified.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|Reverse(e)| e.value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn seeded(capacity: usize, alpha: f64, now: f64) -> Reservoir {
        Reservoir::new_with_rng(
            capacity,
            alpha,
            now,
            Box::new(rand::rngs::StdRng::seed_from_u64(42)),
        )
    }

    #[test]
    fn bounded_by_capacity_and_count() {
        let mut r = seeded(1028, 0.015, 0.0);
        for i in 0..2000 {
            r.update(f64::from(i), f64::from(i) * 0.01);
        }
        assert!(r.size() <= 1028);
        assert!(r.size() as u64 <= r.count());
        assert_eq!(r.count(), 2000);
    }

    #[test]
    fn small_streams_keep_everything() {
        let mut r = seeded(1028, 0.015, 0.0);
        for i in 0..50 {
            r.update(f64::from(i), f64::from(i));
        }
        assert_eq!(r.size(), 50);
    }

    #[test]
    fn rescale_keeps_priorities_finite() {
        let mut r = seeded(1028, 0.015, 0.0);
        // simulate a 2-hour window of updates
        for i in 0..2000 {
            let now = f64::from(i) * (7200.0 / 2000.0);
            r.update(f64::from(i % 100), now);
        }
        for Reverse(e) in &r.entries {
            assert!(e.priority.is_finite());
            assert!(e.priority > 0.0);
        }
    }

    #[test]
    fn quantiles_remain_monotonic_after_rescale() {
        let mut r = seeded(1028, 0.015, 0.0);
        for i in 0..2000 {
            let now = f64::from(i) * (7200.0 / 2000.0);
            r.update(f64::from(i % 100), now);
        }
        let mut values = r.values();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let n = values.len();
        let at = |p: f64| {
            let idx = (p * n as f64).round() as usize;
            if idx >= 1 {
                values[idx - 1]
            } else {
                0.0
            }
        };
        let p50 = at(0.5);
        let p75 = at(0.75);
        let p95 = at(0.95);
        let p99 = at(0.99);
        assert!(p50 <= p75);
        assert!(p75 <= p95);
        assert!(p95 <= p99);
    }
}
