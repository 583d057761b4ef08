//! Outbound delivery of agent events.
//!
//! [`EventSink`] is the seam between the router's outbound drain and the
//! outside world.  [`TcpEventSink`] opens one short-lived connection per
//! envelope, writes it in a single call and closes.  Delivery is
//! at-most-once: the router logs a failed delivery and moves on.

use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use navlink_types::{Envelope, NavError};
use tracing::debug;

use crate::codec;

/// Destination for envelopes drained from the outbound queue.
pub trait EventSink: Send {
    /// Deliver one envelope.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Transport`] when the peer cannot be reached or
    /// the write fails, [`NavError::Codec`] if the envelope cannot be
    /// encoded.
    fn deliver(&mut self, envelope: &Envelope) -> Result<(), NavError>;
}

/// Sends each envelope over its own TCP connection.
pub struct TcpEventSink {
    addr: SocketAddr,
    timeout: Duration,
}

impl TcpEventSink {
    /// `timeout` bounds both the connect and the write so that an
    /// unreachable receiver cannot stall the simulation tick indefinitely.
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl EventSink for TcpEventSink {
    fn deliver(&mut self, envelope: &Envelope) -> Result<(), NavError> {
        let bytes = codec::encode(envelope)?;
        let mut stream = TcpStream::connect_timeout(&self.addr, self.timeout)
            .map_err(|e| NavError::Transport(format!("connect to {}: {e}", self.addr)))?;
        stream
            .set_write_timeout(Some(self.timeout))
            .map_err(|e| NavError::Transport(e.to_string()))?;
        stream
            .write_all(&bytes)
            .map_err(|e| NavError::Transport(format!("send to {}: {e}", self.addr)))?;
        // The peer may already have closed its side; nothing left to do.
        let _ = stream.shutdown(Shutdown::Both);
        debug!(addr = %self.addr, agent = %envelope.agent_name, "event delivered");
        Ok(())
    }
}
