//! Message processor (spec §4.6): parses ingest datagrams, routes them to
//! per-key accumulators, and renders flush output.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::key::normalize_key;
use crate::meter::MeterReporter;
use crate::plugin::{ClockFn, PluginRegistry, Sample};
use crate::timer::TimerReporter;

/// Namespace layout selected by configuration (spec §4.6 "Namespaces").
pub struct Namespace {
    pub stats_prefix: String,
    pub count_prefix: String,
    pub timer_prefix: String,
    pub gauge_prefix: String,
    pub internal_prefix: String,
}

impl Namespace {
    /// The historical `stats.`/`stats_counts.`/`stats.timers.`/
    /// `stats.gauge.` layout with a `statsd.` internal prefix.
    #[must_use]
    pub fn legacy() -> Self {
        Self {
            stats_prefix: "stats.".to_string(),
            count_prefix: "stats_counts.".to_string(),
            timer_prefix: "stats.timers.".to_string(),
            gauge_prefix: "stats.gauge.".to_string(),
            internal_prefix: "statsd.".to_string(),
        }
    }

    /// The configurable `<prefix>.` layout.
    #[must_use]
    pub fn configurable(message_prefix: &str, internal_metrics_prefix: &str) -> Self {
        let stats_prefix = format!("{message_prefix}.");
        Self {
            count_prefix: format!("{stats_prefix}counters."),
            timer_prefix: format!("{stats_prefix}timers."),
            gauge_prefix: format!("{stats_prefix}gauges."),
            stats_prefix,
            internal_prefix: internal_metrics_prefix.to_string(),
        }
    }
}

/// Options controlling parsing, routing, and flush rendering.
pub struct ProcessorOptions {
    pub legacy_namespace: bool,
    pub message_prefix: String,
    pub internal_metrics_prefix: String,
    pub delete_idle_counters: bool,
    pub lightweight_mode: bool,
    pub percent_threshold: f64,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            legacy_namespace: true,
            message_prefix: "stats".to_string(),
            internal_metrics_prefix: "statsd.".to_string(),
            delete_idle_counters: false,
            lightweight_mode: false,
            percent_threshold: 90.0,
        }
    }
}

/// Per-category flush bookkeeping used for the self-observation summary.
#[derive(Default, Clone, Copy)]
struct FlushStats {
    events: u64,
    duration_secs: f64,
}

/// The single-writer engine: owns every accumulator map and renders flush
/// output. Not `Sync` — intended for exclusive use on one logical thread
/// (spec §5).
pub struct MessageProcessor {
    clock: ClockFn,
    namespace: Namespace,
    options: ProcessorOptions,

    counter_metrics: HashMap<String, f64>,
    timer_metrics: HashMap<String, TimerReporter>,
    gauge_metrics: HashMap<String, f64>,
    meter_metrics: HashMap<String, MeterReporter>,
    plugins: PluginRegistry,

    by_type: HashMap<String, u64>,
    process_timings: HashMap<String, f64>,
}

impl MessageProcessor {
    /// Creates a processor with the given `clock` (spec §9: clock
    /// injection) and options.
    #[must_use]
    pub fn new(clock: ClockFn, options: ProcessorOptions) -> Self {
        let namespace = if options.legacy_namespace {
            Namespace::legacy()
        } else {
            Namespace::configurable(&options.message_prefix, &options.internal_metrics_prefix)
        };

        Self {
            clock,
            namespace,
            options,
            counter_metrics: HashMap::new(),
            timer_metrics: HashMap::new(),
            gauge_metrics: HashMap::new(),
            meter_metrics: HashMap::new(),
            plugins: PluginRegistry::new(),
            by_type: HashMap::new(),
            process_timings: HashMap::new(),
        }
    }

    /// Registers a plugin factory, resolved once (spec §9).
    pub fn register_plugin(&mut self, factory: Box<dyn crate::plugin::PluginFactory>) {
        self.plugins.register(factory);
    }

    fn now(&self) -> f64 {
        (self.clock)()
    }

    /// Parses and routes one ingest datagram's text. Malformed messages
    /// are logged at debug and dropped (spec §4.6, §7).
    pub fn process(&mut self, message: &str) {
        let start = self.now();

        let Some((raw_key, data)) = message.split_once(':') else {
            debug!(%message, "bad line: missing ':'");
            return;
        };
        if !data.contains('|') {
            debug!(%message, "bad line: missing '|'");
            return;
        }

        let fields: Vec<&str> = data.split('|').collect();
        if fields.len() < 2 || fields.len() > 3 {
            debug!(%message, "bad line: wrong field count");
            return;
        }

        let key = normalize_key(raw_key);
        let metric_type = fields[1];

        let routed = match metric_type {
            "c" => self.process_counter(&key, &fields, message),
            "ms" => self.process_timer(&key, fields[0], message),
            "g" => self.process_gauge(&key, fields[0], message),
            "m" => self.process_meter(&key, fields[0], message),
            other if self.plugins.handles(other) => {
                self.process_plugin(other, &key, &fields);
                true
            }
            _ => {
                debug!(%message, %metric_type, "unknown metric type");
                false
            }
        };

        if !routed {
            return;
        }

        let elapsed = self.now() - start;
        *self.process_timings.entry(metric_type.to_string()).or_insert(0.0) += elapsed;
        *self.by_type.entry(metric_type.to_string()).or_insert(0) += 1;
    }

    fn process_counter(&mut self, key: &str, fields: &[&str], message: &str) -> bool {
        let Ok(value) = fields[0].parse::<f64>() else {
            debug!(%message, "bad counter value");
            return false;
        };
        let rate = if fields.len() == 3 {
            let Some(rate_str) = fields[2].strip_prefix('@') else {
                debug!(%message, "bad counter rate");
                return false;
            };
            let Ok(rate) = rate_str.parse::<f64>() else {
                debug!(%message, "bad counter rate");
                return false;
            };
            rate
        } else {
            1.0
        };

        *self.counter_metrics.entry(key.to_string()).or_insert(0.0) += value * (1.0 / rate);
        true
    }

    fn process_timer(&mut self, key: &str, raw_value: &str, message: &str) -> bool {
        let Ok(value) = raw_value.parse::<f64>() else {
            debug!(%message, "bad timer value");
            return false;
        };
        let now = self.now();
        self.timer_metrics
            .entry(key.to_string())
            .or_insert_with(|| TimerReporter::new(now))
            .update(value, now);
        true
    }

    fn process_gauge(&mut self, key: &str, raw_value: &str, message: &str) -> bool {
        if raw_value.contains(':') {
            debug!(%message, "gauge value split on ':' is not a single field");
            return false;
        }
        let Ok(value) = raw_value.parse::<f64>() else {
            debug!(%message, "bad gauge value");
            return false;
        };
        self.gauge_metrics.insert(key.to_string(), value);
        true
    }

    fn process_meter(&mut self, key: &str, raw_value: &str, message: &str) -> bool {
        if raw_value.contains(':') {
            debug!(%message, "bad meter value");
            return false;
        }
        let Ok(value) = raw_value.parse::<f64>() else {
            debug!(%message, "bad meter value");
            return false;
        };
        let now = self.now();
        self.meter_metrics
            .entry(key.to_string())
            .or_insert_with(|| MeterReporter::new(now))
            .mark(value);
        true
    }

    fn process_plugin(&mut self, metric_type: &str, key: &str, fields: &[&str]) {
        let Some(factory_name) = self.plugins.factory_name(metric_type) else {
            return;
        };
        let prefix = format!("stats.{factory_name}");
        self.plugins
            .process(metric_type, key, fields, &prefix, Arc::clone(&self.clock));
    }

    /// Advances every meter's and timer's EWMA windows by one tick (spec
    /// §4.7: every 5 seconds).
    pub fn tick(&mut self) {
        for meter in self.meter_metrics.values_mut() {
            meter.tick();
        }
        for timer in self.timer_metrics.values_mut() {
            timer.tick();
        }
    }

    /// Runs a full flush: converts every accumulator into Graphite samples
    /// in the fixed order counters → timers → gauges → meters → plugins →
    /// summary, and resets per-flush state (spec §4.6, §5).
    pub fn flush(&mut self, interval_ms: u64) -> Vec<Sample> {
        let interval_secs = interval_ms as f64 / 1000.0;
        let timestamp = self.now().floor() as i64;
        let mut out = Vec::new();
        let mut per_category: HashMap<&'static str, FlushStats> = HashMap::new();

        let start = self.now();
        let counters = self.flush_counters(interval_secs, timestamp, &mut out);
        per_category.insert(
            "counter",
            FlushStats {
                events: counters,
                duration_secs: self.now() - start,
            },
        );

        let start = self.now();
        let timers = self.flush_timers(timestamp, &mut out);
        per_category.insert(
            "timer",
            FlushStats {
                events: timers,
                duration_secs: self.now() - start,
            },
        );

        let start = self.now();
        let gauges = self.flush_gauges(timestamp, &mut out);
        per_category.insert(
            "gauge",
            FlushStats {
                events: gauges,
                duration_secs: self.now() - start,
            },
        );

        let start = self.now();
        let meters = self.flush_meters(timestamp, &mut out);
        per_category.insert(
            "meter",
            FlushStats {
                events: meters,
                duration_secs: self.now() - start,
            },
        );

        let start = self.now();
        let plugin_samples = self.plugins.flush_all(interval_secs, timestamp);
        let plugin_keys = self.plugins.key_count() as u64;
        out.extend(plugin_samples);
        per_category.insert(
            "plugin",
            FlushStats {
                events: plugin_keys,
                duration_secs: self.now() - start,
            },
        );

        let num_stats: u64 = per_category.values().map(|s| s.events).sum();
        self.flush_summary(num_stats, &per_category, timestamp, &mut out);

        out
    }

    fn flush_counters(&mut self, interval_secs: f64, timestamp: i64, out: &mut Vec<Sample>) -> u64 {
        let mut events = 0;
        let ns = &self.namespace;
        for (key, count) in self.counter_metrics.iter_mut() {
            let count_value = *count;
            *count = 0.0;
            let rate = count_value / interval_secs;

            if self.options.legacy_namespace {
                if !self.options.lightweight_mode {
                    out.push((format!("{}{key}", ns.stats_prefix), rate, timestamp));
                }
                out.push((format!("{}{key}", ns.count_prefix), count_value, timestamp));
            } else {
                if !self.options.lightweight_mode {
                    out.push((format!("{}{key}.rate", ns.count_prefix), rate, timestamp));
                }
                out.push((format!("{}{key}.count", ns.count_prefix), count_value, timestamp));
            }
            events += 1;
        }

        if self.options.delete_idle_counters {
            self.counter_metrics.clear();
        }
        events
    }

    fn flush_timers(&mut self, timestamp: i64, out: &mut Vec<Sample>) -> u64 {
        let percent = self.options.percent_threshold;
        let mut events = 0;
        let now = self.now();

        for (key, timer) in self.timer_metrics.iter_mut() {
            let count = timer.count();
            if count == 0 {
                continue;
            }

            let lower = timer.min();
            let upper = timer.max();
            let trimmed = trimmed_mean(timer, percent);

            let mut block = vec![
                (format!("{}{key}.mean", self.namespace.timer_prefix), trimmed.mean),
                (format!("{}{key}.upper", self.namespace.timer_prefix), upper),
                (
                    format!("{}{key}.upper_{}", self.namespace.timer_prefix, percent as i64),
                    trimmed.threshold_upper,
                ),
                (format!("{}{key}.lower", self.namespace.timer_prefix), lower),
            ];
            if !self.options.lightweight_mode {
                block.push((format!("{}{key}.count", self.namespace.timer_prefix), count as f64));
            }

            block.sort_by(|a, b| a.0.cmp(&b.0));
            out.extend(block.into_iter().map(|(path, value)| (path, value, timestamp)));

            timer.clear(now);
            events += 1;
        }

        events
    }

    fn flush_gauges(&mut self, timestamp: i64, out: &mut Vec<Sample>) -> u64 {
        let mut events = 0;
        for (key, value) in &self.gauge_metrics {
            out.push((format!("{}{key}.value", self.namespace.gauge_prefix), *value, timestamp));
            events += 1;
        }
        events
    }

    fn flush_meters(&mut self, timestamp: i64, out: &mut Vec<Sample>) -> u64 {
        let mut events = 0;
        let now = self.now();
        for (key, meter) in &self.meter_metrics {
            let prefix = format!("stats.meter.{key}");
            let mut block = Vec::with_capacity(5);
            meter.render(&prefix, now, timestamp, &mut block);
            out.extend(block);
            events += 1;
        }
        events
    }

    fn flush_summary(
        &mut self,
        num_stats: u64,
        per_category: &HashMap<&'static str, FlushStats>,
        timestamp: i64,
        out: &mut Vec<Sample>,
    ) {
        out.push((format!("{}numStats", self.namespace.internal_prefix), num_stats as f64, timestamp));

        for (name, stats) in per_category {
            out.push((
                format!("{}flush.{name}.count", self.namespace.internal_prefix),
                stats.events as f64,
                timestamp,
            ));
            out.push((
                format!("{}flush.{name}.duration", self.namespace.internal_prefix),
                stats.duration_secs * 1000.0,
                timestamp,
            ));
        }

        for (metric_type, duration) in &self.process_timings {
            let received = self.by_type.get(metric_type).copied().unwrap_or(0);
            out.push((
                format!("{}receive.{metric_type}.count", self.namespace.internal_prefix),
                received as f64,
                timestamp,
            ));
            out.push((
                format!("{}receive.{metric_type}.duration", self.namespace.internal_prefix),
                duration * 1000.0,
                timestamp,
            ));
        }

        self.process_timings.clear();
        self.by_type.clear();
    }

    /// Names of every metric with live accumulator state, across all
    /// categories.
    #[must_use]
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: std::collections::HashSet<String> = std::collections::HashSet::new();
        names.extend(self.timer_metrics.keys().cloned());
        names.extend(self.counter_metrics.keys().cloned());
        names.extend(self.gauge_metrics.keys().cloned());
        names.extend(self.meter_metrics.keys().cloned());
        names.into_iter().collect()
    }
}

struct Trimmed {
    mean: f64,
    threshold_upper: f64,
}

/// Trimmed mean at `percent` over a timer's reservoir snapshot (spec §4.6,
/// §8: "keeps the lowest `idx` samples").
fn trimmed_mean(timer: &TimerReporter, percent: f64) -> Trimmed {
    let mut values = timer.snapshot_values();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let count = values.len();
    if count == 0 {
        return Trimmed {
            mean: 0.0,
            threshold_upper: 0.0,
        };
    }
    if count == 1 {
        return Trimmed {
            mean: values[0],
            threshold_upper: values[0],
        };
    }

    let threshold_value = (100.0 - percent) / 100.0;
    let idx = count - (threshold_value * count as f64).round() as usize;
    let idx = idx.max(1).min(count);
    let kept = &values[..idx];
    let sum: f64 = kept.iter().sum();

    Trimmed {
        mean: sum / idx as f64,
        threshold_upper: kept[idx - 1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock_at(t: std::cell::Cell<f64>) -> ClockFn {
        Arc::new(move || t.get())
    }

    fn fixed_clock(t: f64) -> ClockFn {
        Arc::new(move || t)
    }

    #[test]
    fn rejects_malformed_messages() {
        let mut p = MessageProcessor::new(fixed_clock(0.0), ProcessorOptions::default());
        p.process("foo1|c");
        p.process("foo:|c");
        p.process("foo:1");
        p.process("foo:1|c|extra|more");
        assert!(p.metric_names().is_empty());
    }

    #[test]
    fn counter_accumulates_with_rate() {
        let mut p = MessageProcessor::new(fixed_clock(0.0), ProcessorOptions::default());
        p.process("k:3|c|@0.5");
        assert_eq!(p.counter_metrics.get("k"), Some(&6.0));
    }

    #[test]
    fn counter_flush_emits_legacy_lines_and_resets() {
        let mut p = MessageProcessor::new(fixed_clock(1000.0), ProcessorOptions::default());
        for _ in 0..10 {
            p.process("a:10|c");
        }
        let samples = p.flush(10_000);
        assert!(samples.iter().any(|(path, v, _)| path == "stats.a" && (*v - 10.0).abs() < 1e-9));
        assert!(samples
            .iter()
            .any(|(path, v, _)| path == "stats_counts.a" && (*v - 100.0).abs() < 1e-9));
        assert_eq!(p.counter_metrics.get("a"), Some(&0.0));
    }

    #[test]
    fn lightweight_mode_suppresses_rate_line() {
        let mut opts = ProcessorOptions::default();
        opts.lightweight_mode = true;
        let mut p = MessageProcessor::new(fixed_clock(1000.0), opts);
        p.process("a:10|c");
        let samples = p.flush(10_000);
        assert!(!samples.iter().any(|(path, _, _)| path == "stats.a"));
        assert!(samples.iter().any(|(path, _, _)| path == "stats_counts.a"));
    }

    #[test]
    fn gauge_persists_across_flushes() {
        let mut p = MessageProcessor::new(fixed_clock(0.0), ProcessorOptions::default());
        p.process("g:5|g");
        let first = p.flush(10_000);
        let second = p.flush(10_000);
        assert!(first.iter().any(|(path, v, _)| path == "stats.gauge.g.value" && *v == 5.0));
        assert!(second.iter().any(|(path, v, _)| path == "stats.gauge.g.value" && *v == 5.0));
    }

    #[test]
    fn gauge_rejects_delta_syntax() {
        let mut p = MessageProcessor::new(fixed_clock(0.0), ProcessorOptions::default());
        p.process("g:+5|g");
        assert_eq!(p.gauge_metrics.get("g"), Some(&5.0));
    }

    #[test]
    fn timer_trimmed_mean_matches_worked_example() {
        let time = std::cell::Cell::new(0.0);
        let mut p = MessageProcessor::new(clock_at(time.clone()), ProcessorOptions::default());
        for _ in 0..4 {
            p.process("orders:250|ms");
        }
        for _ in 0..4 {
            p.process("orders:750|ms");
        }
        time.set(1000.0);
        let samples = p.flush(10_000);

        let get = |suffix: &str| -> f64 {
            samples
                .iter()
                .find(|(path, _, _)| path == &format!("stats.timers.orders.{suffix}"))
                .unwrap()
                .1
        };
        assert_eq!(get("lower"), 250.0);
        assert_eq!(get("upper"), 750.0);
        // idx = 8 - round(0.10 * 8) = 7; mean over the lowest 7 samples.
        assert_eq!(get("upper_90"), 750.0);
        assert!((get("mean") - (250.0 * 4.0 + 750.0 * 3.0) / 7.0).abs() < 1e-9);
        assert_eq!(get("count"), 8.0);
    }

    #[test]
    fn delete_idle_counters_removes_empty_entries() {
        let mut opts = ProcessorOptions::default();
        opts.delete_idle_counters = true;
        let mut p = MessageProcessor::new(fixed_clock(0.0), opts);
        let first_flush = p.flush(10_000);
        assert!(first_flush.iter().all(|(path, _, _)| !path.starts_with("stats_counts.")));

        p.process("a:1|c");
        let second_flush = p.flush(10_000);
        let counter_lines: Vec<_> = second_flush
            .iter()
            .filter(|(path, _, _)| path == "stats.a" || path == "stats_counts.a")
            .collect();
        assert_eq!(counter_lines.len(), 2);
    }
}
