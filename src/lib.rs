//! A StatsD-compatible metrics aggregator: parses counter/timer/gauge/meter
//! (and pluggable) ingest messages, folds them into per-key accumulator
//! state on a single logical writer, and renders periodic flushes as
//! Graphite line-protocol text.

pub mod config;
pub mod driver;
pub mod error;
pub mod ewma;
pub mod histogram;
pub mod key;
pub mod meter;
pub mod net;
pub mod plugin;
pub mod procstats;
pub mod processor;
pub mod reservoir;
pub mod timer;
pub mod writer;

pub use error::{StatsdError, StatsdResult};
pub use processor::{MessageProcessor, ProcessorOptions};
