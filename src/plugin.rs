//! Pluggable metric extension surface (spec §4.6, §9).
//!
//! A plugin is resolved once per process for a wire-type token (e.g. `"h"`
//! for a custom histogram variant); the resulting factory builds one
//! [`PluginMetric`] per distinct key, lazily, on first ingest.

/// A single sample emitted by a flush: path, value, unix-second timestamp.
pub type Sample = (String, f64, i64);

/// A clock function injected into plugin metrics so they never read wall
/// time directly (spec §9, "clock injection").
pub type ClockFn = std::sync::Arc<dyn Fn() -> f64 + Send + Sync>;

/// Per-key accumulator state owned by a plugin.
pub trait PluginMetric: Send {
    /// Folds one ingest message's fields (everything after `key:`, split
    /// on `|`) into this metric's state.
    fn process(&mut self, fields: &[&str]);

    /// Renders this metric's contribution to a flush.
    fn flush(&mut self, interval_secs: f64, timestamp: i64) -> Vec<Sample>;
}

/// Builds [`PluginMetric`] instances for one wire-type token.
pub trait PluginFactory: Send + Sync {
    /// The wire-type token this factory answers to (spec §4.6 routing:
    /// anything not `c`/`ms`/`g`/`m` is looked up here).
    fn metric_type(&self) -> &str;

    /// A short name folded into the metric's namespace prefix.
    fn name(&self) -> &str;

    /// Builds a new metric instance for `name`, under `prefix`, driven by
    /// `clock`.
    fn build_metric(&self, prefix: &str, name: &str, clock: ClockFn) -> Box<dyn PluginMetric>;
}

/// Holds the process-lifetime set of plugin factories and the per-key
/// metrics they have lazily instantiated.
#[derive(Default)]
pub struct PluginRegistry {
    factories: std::collections::HashMap<String, Box<dyn PluginFactory>>,
    metrics: std::collections::HashMap<String, Box<dyn PluginMetric>>,
}

impl PluginRegistry {
    /// An empty registry with no factories.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: std::collections::HashMap::new(),
            metrics: std::collections::HashMap::new(),
        }
    }

    /// Registers a factory, resolved once at process start (spec §9:
    /// "resolve at process start, not per-message").
    pub fn register(&mut self, factory: Box<dyn PluginFactory>) {
        self.factories
            .insert(factory.metric_type().to_string(), factory);
    }

    /// True if `metric_type` is a known plugin token.
    #[must_use]
    pub fn handles(&self, metric_type: &str) -> bool {
        self.factories.contains_key(metric_type)
    }

    /// The declared name of the factory registered for `metric_type`, used
    /// to build the plugin's namespace prefix (`"stats." + factory.name`,
    /// not the wire-type token itself).
    #[must_use]
    pub fn factory_name(&self, metric_type: &str) -> Option<&str> {
        self.factories.get(metric_type).map(|f| f.name())
    }

    /// Routes an ingest message to the plugin metric for `key`, building
    /// it lazily from the `metric_type`'s factory on first use.
    pub fn process(
        &mut self,
        metric_type: &str,
        key: &str,
        fields: &[&str],
        prefix: &str,
        clock: ClockFn,
    ) {
        let Some(factory) = self.factories.get(metric_type) else {
            return;
        };
        let metric = self
            .metrics
            .entry(key.to_string())
            .or_insert_with(|| factory.build_metric(prefix, key, clock));
        metric.process(fields);
    }

    /// Flushes every instantiated plugin metric, in arbitrary key order
    /// (spec §4.6 flush step 5).
    pub fn flush_all(&mut self, interval_secs: f64, timestamp: i64) -> Vec<Sample> {
        self.metrics
            .values_mut()
            .flat_map(|metric| metric.flush(interval_secs, timestamp))
            .collect()
    }

    /// Number of distinct keys with instantiated plugin state.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.metrics.len()
    }
}
