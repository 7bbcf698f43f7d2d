//! End-to-end ingest → flush scenarios (spec §8).

use std::net::UdpSocket;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use graphite_statsd::net::UdpIngestListener;
use graphite_statsd::plugin::ClockFn;
use graphite_statsd::processor::{MessageProcessor, ProcessorOptions};

fn fixed_clock(t: f64) -> ClockFn {
    Arc::new(move || t)
}

/// Spawns the ingest listener on a random port, forwarding each datagram to
/// `handle` on a background thread. Returns the bound address.
fn spawn_listener(handle: impl Fn(&str) + Send + 'static) -> std::net::SocketAddr {
    let listener = UdpIngestListener::bind("127.0.0.1:0", "statsd_monitor", "statsd_ok").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let _ = listener.run(handle);
    });
    addr
}

#[test]
fn scenario_counter_over_udp_ingest() {
    let (tx, rx) = std::sync::mpsc::channel();
    let addr = spawn_listener(move |message| {
        tx.send(message.to_string()).ok();
    });

    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    client.send_to(b"a:10|c", addr).unwrap();

    let received = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(received, "a:10|c");

    let mut processor = MessageProcessor::new(fixed_clock(1000.0), ProcessorOptions::default());
    processor.process(&received);
    let samples = processor.flush(10_000);

    assert!(samples
        .iter()
        .any(|(path, v, ts)| path == "stats.a" && (*v - 1.0).abs() < 1e-9 && *ts == 1000));
    assert!(samples
        .iter()
        .any(|(path, v, ts)| path == "stats_counts.a" && *v == 10.0 && *ts == 1000));
}

#[test]
fn scenario_lightweight_mode_suppresses_rate_line() {
    let mut options = ProcessorOptions::default();
    options.lightweight_mode = true;
    let mut processor = MessageProcessor::new(fixed_clock(1000.0), options);
    processor.process("a:10|c");
    let samples = processor.flush(10_000);

    assert!(!samples.iter().any(|(path, _, _)| path == "stats.a"));
    assert!(samples.iter().any(|(path, v, _)| path == "stats_counts.a" && *v == 10.0));
}

#[test]
fn scenario_monitor_ping_round_trip() {
    let addr = spawn_listener(|_message| {});

    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    client.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
    client.send_to(b"statsd_monitor", addr).unwrap();

    let mut buf = [0_u8; 32];
    let (len, _) = client.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..len], b"statsd_ok");
}

#[test]
fn scenario_delete_idle_counters_policy() {
    let mut options = ProcessorOptions::default();
    options.delete_idle_counters = true;
    let mut processor = MessageProcessor::new(fixed_clock(0.0), options);

    let empty_flush = processor.flush(10_000);
    assert!(empty_flush
        .iter()
        .all(|(path, _, _)| !path.starts_with("stats_counts.")));

    processor.process("a:1|c");
    let flush_with_traffic = processor.flush(10_000);
    let counter_lines: Vec<_> = flush_with_traffic
        .iter()
        .filter(|(path, _, _)| path == "stats.a" || path == "stats_counts.a")
        .collect();
    assert_eq!(counter_lines.len(), 2);

    let next_flush = processor.flush(10_000);
    assert!(next_flush
        .iter()
        .all(|(path, _, _)| !path.starts_with("stats_counts.")));
}

#[test]
fn scenario_meter_window_rates_after_steady_stream() {
    let mut processor = MessageProcessor::new(fixed_clock(0.0), ProcessorOptions::default());
    for _ in 0..12 {
        processor.process("svc:1|m");
        processor.tick();
    }
    let samples = processor.flush(10_000);

    let get = |suffix: &str| -> f64 {
        samples
            .iter()
            .find(|(path, _, _)| path == &format!("stats.meter.svc.{suffix}"))
            .unwrap()
            .1
    };
    assert_eq!(get("count"), 12.0);
    assert!(get("1minute_rate") >= get("5minute_rate"));
    assert!(get("5minute_rate") >= get("15minute_rate"));
}
