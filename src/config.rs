//! Configuration (SPEC_FULL.md §A): a flat struct covering every option in
//! spec.md §6, mirroring the teacher's `MetricCollectorOptions` shape. No
//! INI/CLI file parsing is implemented (out of scope, spec.md §1); `main.rs`
//! overrides a handful of fields from environment variables.

use std::time::Duration;

/// Runtime configuration for the aggregator and its external interfaces.
pub struct Config {
    /// UDP port the ingest listener binds to.
    pub listen_port: u16,
    /// Flush cadence.
    pub flush_interval: Duration,
    /// Timer trimmed-mean percentile (e.g. `90.0`).
    pub percent_threshold: f64,
    /// Downstream Graphite/carbon host.
    pub carbon_host: String,
    /// Downstream Graphite/carbon TCP port.
    pub carbon_port: u16,
    /// Namespace root used when `legacy_namespace` is false.
    pub message_prefix: String,
    /// Self-metric namespace root.
    pub internal_metrics_prefix: String,
    /// Selects the legacy (`stats.`) vs. configurable namespace regime.
    pub legacy_namespace: bool,
    /// Whether idle counters are removed (rather than zeroed) at flush.
    pub delete_idle_counters: bool,
    /// Suppresses rate/mean_rate lines where the spec allows.
    pub lightweight_mode: bool,
    /// Exact bytes of the monitor ping datagram.
    pub monitor_message: String,
    /// Exact bytes of the monitor ping reply.
    pub monitor_response: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: 8125,
            flush_interval: Duration::from_millis(10_000),
            percent_threshold: 90.0,
            carbon_host: "127.0.0.1".to_string(),
            carbon_port: 2003,
            message_prefix: "stats".to_string(),
            internal_metrics_prefix: "statsd.".to_string(),
            legacy_namespace: true,
            delete_idle_counters: false,
            lightweight_mode: false,
            monitor_message: "statsd_monitor".to_string(),
            monitor_response: "statsd_ok".to_string(),
        }
    }
}

impl Config {
    /// Applies a handful of environment variable overrides, the same
    /// unceremonious way the teacher's `main.rs` hardcodes its bind address
    /// rather than building an argument-parsing layer for out-of-scope
    /// surface.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(port) = std::env::var("STATSD_LISTEN_PORT") {
            if let Ok(parsed) = port.parse() {
                config.listen_port = parsed;
            }
        }
        if let Ok(host) = std::env::var("STATSD_CARBON_HOST") {
            config.carbon_host = host;
        }
        if let Ok(port) = std::env::var("STATSD_CARBON_PORT") {
            if let Ok(parsed) = port.parse() {
                config.carbon_port = parsed;
            }
        }
        if let Ok(flag) = std::env::var("STATSD_DELETE_IDLE_COUNTERS") {
            config.delete_idle_counters = flag == "1";
        }
        if let Ok(flag) = std::env::var("STATSD_LIGHTWEIGHT") {
            config.lightweight_mode = flag == "1";
        }
        config
    }
}
