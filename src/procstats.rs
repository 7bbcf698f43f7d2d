//! Host/process stat collection (SPEC_FULL.md §C), grounded in
//! `original_source/txstatsd/process.py`'s `parse_meminfo`/`parse_loadavg`/
//! `report_self_stat`. Runs on its own timer and submits every value
//! through the ordinary gauge ingest path, per spec §4.7 and §9 ("stat
//! sources as ingest").

use std::collections::HashMap;
use std::time::Duration;

use crossbeam::channel::{tick, Receiver};
use crossbeam::select;
use tracing::warn;

const MEMINFO_KEYS: &[&str] = &[
    "MemTotal",
    "MemFree",
    "Buffers",
    "Cached",
    "SwapCached",
    "SwapTotal",
    "SwapFree",
];

fn multiplier(unit: &str) -> Option<u64> {
    match unit {
        "kB" => Some(1024),
        "mB" => Some(1024 * 1024),
        _ => None,
    }
}

/// Parses `/proc/meminfo` text into `meminfo.<Key> -> bytes` pairs.
#[must_use]
pub fn parse_meminfo(data: &str) -> HashMap<String, f64> {
    let mut result = HashMap::new();
    for line in data.lines() {
        let parts: Vec<&str> = line.split(' ').filter(|s| !s.is_empty()).collect();
        if parts.is_empty() {
            continue;
        }
        let Some(label) = parts[0].strip_suffix(':') else {
            continue;
        };
        if !MEMINFO_KEYS.contains(&label) {
            continue;
        }
        let Some(raw) = parts.get(1).and_then(|s| s.parse::<f64>().ok()) else {
            continue;
        };
        let mult = if parts.len() == 3 {
            match parts.get(2).and_then(|u| multiplier(u)) {
                Some(m) => m as f64,
                None => continue,
            }
        } else {
            1.0
        };
        result.insert(format!("meminfo.{label}"), raw * mult);
    }
    result
}

/// Parses `/proc/loadavg` text into the three load-average fields.
#[must_use]
pub fn parse_loadavg(data: &str) -> HashMap<String, f64> {
    let mut result = HashMap::new();
    let mut fields = data.split_whitespace();
    if let Some(one) = fields.next().and_then(|s| s.parse::<f64>().ok()) {
        result.insert("loadavg.oneminute".to_string(), one);
    }
    if let Some(five) = fields.next().and_then(|s| s.parse::<f64>().ok()) {
        result.insert("loadavg.fiveminutes".to_string(), five);
    }
    if let Some(fifteen) = fields.next().and_then(|s| s.parse::<f64>().ok()) {
        result.insert("loadavg.fifthteenminutes".to_string(), fifteen);
    }
    result
}

/// Parses `/proc/self/stat` into `self.stat.cpu.user`/`.system`/
/// `.memory.rss` (clock ticks and pages, left unconverted — a downstream
/// consumer that cares about seconds/bytes knows the host's
/// `sysconf(_SC_CLK_TCK)`/page size).
#[must_use]
pub fn parse_self_stat(data: &str) -> HashMap<String, f64> {
    let mut result = HashMap::new();
    // Field 2 (comm) may contain spaces and is parenthesized; skip past it.
    let Some(after_comm) = data.rsplit_once(')') else {
        return result;
    };
    let fields: Vec<&str> = after_comm.1.split_whitespace().collect();
    // Fields are 1-indexed in `man proc`; field 3 is state, the first here.
    // utime is field 14, stime field 15, rss field 24 — offsets below are
    // relative to `fields[0]` == field 3.
    let utime = fields.get(14 - 3).and_then(|s| s.parse::<f64>().ok());
    let stime = fields.get(15 - 3).and_then(|s| s.parse::<f64>().ok());
    let rss = fields.get(24 - 3).and_then(|s| s.parse::<f64>().ok());

    if let Some(v) = utime {
        result.insert("self.stat.cpu.user".to_string(), v);
    }
    if let Some(v) = stime {
        result.insert("self.stat.cpu.system".to_string(), v);
    }
    if let Some(v) = rss {
        result.insert("self.stat.memory.rss".to_string(), v);
    }
    result
}

/// Periodically reads `/proc/meminfo`, `/proc/loadavg`, and `/proc/self/stat`
/// and submits each value as a gauge ingest message.
pub struct StatCollector;

impl StatCollector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Reads every source once, logging and skipping any that fail (spec
    /// §7: "stat-collection failure ... log the per-source failure,
    /// continue with remaining sources").
    fn collect_once(&self) -> HashMap<String, f64> {
        let mut metrics = HashMap::new();

        match std::fs::read_to_string("/proc/meminfo") {
            Ok(data) => metrics.extend(parse_meminfo(&data)),
            Err(err) => warn!(%err, "failed to read /proc/meminfo"),
        }
        match std::fs::read_to_string("/proc/loadavg") {
            Ok(data) => metrics.extend(parse_loadavg(&data)),
            Err(err) => warn!(%err, "failed to read /proc/loadavg"),
        }
        match std::fs::read_to_string("/proc/self/stat") {
            Ok(data) => metrics.extend(parse_self_stat(&data)),
            Err(err) => warn!(%err, "failed to read /proc/self/stat"),
        }

        metrics
    }

    /// Runs forever at `interval`, calling `ingest` with one gauge message
    /// per collected value, until `shutdown` fires.
    pub fn run(&self, interval: Duration, mut ingest: impl FnMut(&str), shutdown: &Receiver<()>) {
        let collector_tick = tick(interval);
        loop {
            select! {
                recv(collector_tick) -> _ => {
                    for (name, value) in self.collect_once() {
                        ingest(&format!("{name}:{value}|g"));
                    }
                }
                recv(shutdown) -> _ => return,
            }
        }
    }
}

impl Default for StatCollector {
    fn default() -> Self {
        Self::new()
    }
}
