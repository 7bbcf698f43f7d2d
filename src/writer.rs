//! Graphite egress (spec §6, §5): rendering flushed samples as line-oriented
//! text and shipping them over a TCP connection that reconnects lazily.

use std::io::Write;
use std::net::TcpStream;

use itoa::Buffer as IntBuffer;
use ryu::Buffer as FloatBuffer;
use tracing::warn;

use crate::plugin::Sample;

/// Anything that can accept a batch of rendered samples. Implemented by
/// [`TcpGraphiteWriter`]; tests use an in-memory stand-in.
pub trait GraphiteWriter {
    /// Sends every sample in `batch`. Implementations log and drop the
    /// batch on transient failure rather than propagating an error that
    /// would stall ingest (spec §5).
    fn send(&mut self, batch: &[Sample]);
}

/// Renders one sample as a Graphite line: `<path> <value> <unix-seconds>\n`.
/// Values that are integral print without a decimal point.
#[must_use]
pub fn render_line(path: &str, value: f64, timestamp: i64) -> String {
    let mut out = String::with_capacity(path.len() + 24);
    out.push_str(path);
    out.push(' ');
    if value.fract() == 0.0 && value.is_finite() && value.abs() < 1e15 {
        let mut buf = IntBuffer::new();
        out.push_str(buf.format(value as i64));
    } else {
        let mut buf = FloatBuffer::new();
        out.push_str(buf.format(value));
    }
    out.push(' ');
    let mut buf = IntBuffer::new();
    out.push_str(buf.format(timestamp));
    out.push('\n');
    out
}

/// A `GraphiteWriter` that holds a TCP connection to the carbon endpoint,
/// reconnecting on the next send after a failure rather than failing the
/// caller (spec §5, §7: transient egress failure is logged, not fatal).
pub struct TcpGraphiteWriter {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
}

impl TcpGraphiteWriter {
    /// Creates a writer targeting `host:port`. The connection is opened
    /// lazily on the first `send`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            stream: None,
        }
    }

    fn ensure_connected(&mut self) -> std::io::Result<&mut TcpStream> {
        if self.stream.is_none() {
            let stream = TcpStream::connect((self.host.as_str(), self.port))?;
            self.stream = Some(stream);
        }
        Ok(self.stream.as_mut().expect("just connected"))
    }
}

impl GraphiteWriter for TcpGraphiteWriter {
    fn send(&mut self, batch: &[Sample]) {
        if batch.is_empty() {
            return;
        }

        let mut payload = String::new();
        for (path, value, timestamp) in batch {
            payload.push_str(&render_line(path, *value, *timestamp));
        }

        let result = self
            .ensure_connected()
            .and_then(|stream| stream.write_all(payload.as_bytes()));

        if let Err(err) = result {
            warn!(host = %self.host, port = self.port, %err, "graphite write failed, dropping batch");
            self.stream = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_integral_values_without_decimal() {
        assert_eq!(render_line("stats.a", 10.0, 1000), "stats.a 10 1000\n");
    }

    #[test]
    fn renders_fractional_values() {
        let line = render_line("stats.timers.orders.mean", 437.5, 1000);
        assert_eq!(line, "stats.timers.orders.mean 437.5 1000\n");
    }

    #[test]
    fn new_writer_has_no_connection_until_first_send() {
        let writer = TcpGraphiteWriter::new("127.0.0.1", 2003);
        assert!(writer.stream.is_none());
    }
}
