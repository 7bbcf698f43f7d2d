use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use crossbeam::channel::bounded;
use tracing_subscriber::{fmt, EnvFilter};

use graphite_statsd::config::Config;
use graphite_statsd::driver;
use graphite_statsd::net::UdpIngestListener;
use graphite_statsd::plugin::ClockFn;
use graphite_statsd::procstats::StatCollector;
use graphite_statsd::processor::{MessageProcessor, ProcessorOptions};
use graphite_statsd::writer::TcpGraphiteWriter;

/// StatsD-compatible metrics aggregator emitting Graphite line protocol.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// UDP port for ingest.
    #[arg(long)]
    listen_port: Option<u16>,
    /// Downstream carbon host.
    #[arg(long)]
    carbon_host: Option<String>,
    /// Downstream carbon TCP port.
    #[arg(long)]
    carbon_port: Option<u16>,
    /// Flush cadence in milliseconds.
    #[arg(long)]
    flush_interval_ms: Option<u64>,
    /// Timer trimmed-mean percentile.
    #[arg(long)]
    percent_threshold: Option<f64>,
    /// Remove idle counters at flush instead of zeroing them.
    #[arg(long)]
    delete_idle_counters: bool,
    /// Suppress rate/count lines the spec allows to be dropped.
    #[arg(long)]
    lightweight_mode: bool,
    /// Use the configurable namespace regime instead of legacy.
    #[arg(long)]
    no_legacy_namespace: bool,
}

fn wall_clock() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs_f64()
}

fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(port) = cli.listen_port {
        config.listen_port = port;
    }
    if let Some(host) = cli.carbon_host {
        config.carbon_host = host;
    }
    if let Some(port) = cli.carbon_port {
        config.carbon_port = port;
    }
    if let Some(ms) = cli.flush_interval_ms {
        config.flush_interval = Duration::from_millis(ms);
    }
    if let Some(threshold) = cli.percent_threshold {
        config.percent_threshold = threshold;
    }
    if cli.delete_idle_counters {
        config.delete_idle_counters = true;
    }
    if cli.lightweight_mode {
        config.lightweight_mode = true;
    }
    if cli.no_legacy_namespace {
        config.legacy_namespace = false;
    }

    let clock: ClockFn = Arc::new(wall_clock);

    let options = ProcessorOptions {
        legacy_namespace: config.legacy_namespace,
        message_prefix: config.message_prefix.clone(),
        internal_metrics_prefix: config.internal_metrics_prefix.clone(),
        delete_idle_counters: config.delete_idle_counters,
        lightweight_mode: config.lightweight_mode,
        percent_threshold: config.percent_threshold,
    };
    let mut processor = MessageProcessor::new(clock, options);

    let listener = match UdpIngestListener::bind(
        ("0.0.0.0", config.listen_port),
        config.monitor_message.clone(),
        config.monitor_response.clone(),
    ) {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%err, "failed to bind ingest listener");
            std::process::exit(1);
        }
    };

    let (ingest_tx, ingest_rx) = bounded::<String>(8192);

    thread::spawn({
        let ingest_tx = ingest_tx.clone();
        move || {
            let _ = listener.run(|message| {
                let _ = ingest_tx.send(message.to_string());
            });
        }
    });

    thread::spawn({
        let ingest_tx = ingest_tx.clone();
        let (_stat_shutdown_tx, stat_shutdown_rx) = bounded::<()>(1);
        move || {
            StatCollector::new().run(
                Duration::from_secs(60),
                |message| {
                    let _ = ingest_tx.send(message.to_string());
                },
                &stat_shutdown_rx,
            );
        }
    });

    // Graceful shutdown (spec §5) is exercised via `driver::run`'s
    // `shutdown` parameter by embedders and tests; the binary itself runs
    // until the process is terminated, same as the teacher's `main.rs`
    // which never calls `MetricCollector::shutdown()`.
    let shutdown_rx = crossbeam::channel::never::<()>();

    let mut writer = TcpGraphiteWriter::new(config.carbon_host.clone(), config.carbon_port);
    tracing::info!(
        listen_port = config.listen_port,
        carbon_host = %config.carbon_host,
        carbon_port = config.carbon_port,
        "graphite-statsd starting"
    );

    driver::run(
        &mut processor,
        &mut writer,
        config.flush_interval,
        &ingest_rx,
        &shutdown_rx,
    );
}
