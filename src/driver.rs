//! Periodic driver (spec §4.7): races a 5-second tick cadence and an
//! `I`-millisecond flush cadence against a shutdown signal.
//!
//! Grounded on the teacher's `job.rs::initialize_job` scheduler shape
//! (`crossbeam::select!` between `tick(..)` and a shutdown receiver); the
//! `ArcSwap` aggregator handoff dance is dropped (SPEC_FULL.md §B) since
//! the engine here has a single writer and needs no cross-thread swap.

use std::time::Duration;

use crossbeam::channel::{tick, Receiver};
use crossbeam::select;
use tracing::info;

use crate::processor::MessageProcessor;
use crate::writer::GraphiteWriter;

const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Drives a [`MessageProcessor`] on its own thread — the system's single
/// writer (spec §5). Serializes three event sources: ingest messages
/// arriving on `ingest`, a 5-second tick, and an `I`-millisecond flush tick;
/// flushed samples go to `writer`. Exits cleanly (draining any in-flight
/// flush) when `shutdown` fires (spec §5: "no partial flush is emitted").
pub fn run(
    processor: &mut MessageProcessor,
    writer: &mut dyn GraphiteWriter,
    flush_interval: Duration,
    ingest: &Receiver<String>,
    shutdown: &Receiver<()>,
) {
    let flush_ms = flush_interval.as_millis() as u64;
    let flush_tick = tick(flush_interval);
    let meter_tick = tick(TICK_INTERVAL);

    loop {
        select! {
            recv(ingest) -> message => {
                if let Ok(message) = message {
                    processor.process(&message);
                }
            }
            recv(meter_tick) -> _ => {
                processor.tick();
            }
            recv(flush_tick) -> _ => {
                let batch = processor.flush(flush_ms);
                writer.send(&batch);
            }
            recv(shutdown) -> _ => {
                info!("shutdown signal received, draining final flush");
                let batch = processor.flush(flush_ms);
                writer.send(&batch);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{ClockFn, Sample};
    use crate::processor::ProcessorOptions;
    use std::sync::{Arc, Mutex};

    struct RecordingWriter {
        batches: Arc<Mutex<Vec<Vec<Sample>>>>,
    }

    impl GraphiteWriter for RecordingWriter {
        fn send(&mut self, batch: &[Sample]) {
            self.batches.lock().unwrap().push(batch.to_vec());
        }
    }

    #[test]
    fn shutdown_drains_a_final_flush() {
        let clock: ClockFn = Arc::new(|| 1000.0);
        let mut processor = MessageProcessor::new(clock, ProcessorOptions::default());
        processor.process("a:1|c");

        let batches = Arc::new(Mutex::new(Vec::new()));
        let mut writer = RecordingWriter {
            batches: batches.clone(),
        };

        let (_ingest_tx, ingest_rx) = crossbeam::channel::bounded(1);
        let (shutdown_tx, shutdown_rx) = crossbeam::channel::bounded(1);
        shutdown_tx.send(()).unwrap();

        run(
            &mut processor,
            &mut writer,
            Duration::from_secs(3600),
            &ingest_rx,
            &shutdown_rx,
        );

        let recorded = batches.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0]
            .iter()
            .any(|(path, _, _)| path == "stats_counts.a"));
    }
}
