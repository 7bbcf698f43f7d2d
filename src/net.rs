//! UDP ingest listener and monitor-ping responder (spec §6).
//!
//! Thin by design (spec.md's "out of scope (... interfaces only)" for
//! this surface): one datagram is one message, no multi-message framing.

use std::net::UdpSocket;

use crate::error::StatsdResult;

/// Binds a UDP socket and forwards each datagram, decoded as a single
/// ingest message, to a handler — except datagrams equal to the monitor
/// ping, which are answered directly without reaching the handler.
pub struct UdpIngestListener {
    socket: UdpSocket,
    monitor_message: Vec<u8>,
    monitor_response: Vec<u8>,
}

impl UdpIngestListener {
    /// Binds to `addr`. `monitor_message`/`monitor_response` are the exact
    /// byte sequences the ping protocol uses (spec §6).
    pub fn bind(
        addr: impl std::net::ToSocketAddrs,
        monitor_message: impl Into<Vec<u8>>,
        monitor_response: impl Into<Vec<u8>>,
    ) -> StatsdResult<Self> {
        let socket = UdpSocket::bind(addr)?;
        Ok(Self {
            socket,
            monitor_message: monitor_message.into(),
            monitor_response: monitor_response.into(),
        })
    }

    /// Runs forever, calling `handle(message)` for every non-ping
    /// datagram. Malformed UTF-8 datagrams are dropped (the wire format is
    /// text).
    pub fn run(&self, mut handle: impl FnMut(&str)) -> StatsdResult<()> {
        let mut buf = [0_u8; 65_535];
        loop {
            let (len, src) = self.socket.recv_from(&mut buf)?;
            let datagram = &buf[..len];

            if datagram == self.monitor_message.as_slice() {
                if let Err(err) = self.socket.send_to(&self.monitor_response, src) {
                    tracing::warn!(%err, "failed to answer monitor ping");
                }
                continue;
            }

            match std::str::from_utf8(datagram) {
                Ok(text) => handle(text),
                Err(_) => tracing::debug!("dropped non-UTF-8 datagram"),
            }
        }
    }

    /// The bound local address, useful for tests that bind to port 0.
    pub fn local_addr(&self) -> StatsdResult<std::net::SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}
