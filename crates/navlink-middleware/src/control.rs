//! The external side of the protocol.
//!
//! [`ControlClient`] plays the controlling process: it sends MOVE and STOP
//! commands to the router's inbound endpoint, one connection per command.
//! [`EventCollector`] binds the outbound endpoint and yields the events the
//! router forwards.  The CLI's `send` and `listen` modes and the end-to-end
//! tests are built on these two types.

use std::net::SocketAddr;
use std::time::Duration;

use navlink_types::{Command, Envelope, NavError, Vec3};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use crate::codec;
use crate::outbound::{EventSink, TcpEventSink};

/// Default connect/write timeout for [`ControlClient`].
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Sends commands to a router's inbound endpoint.
pub struct ControlClient {
    sink: TcpEventSink,
}

impl ControlClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            sink: TcpEventSink::new(addr, DEFAULT_TIMEOUT),
        }
    }

    /// Override the connect/write timeout (builder-style).
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            sink: TcpEventSink::new(self.sink.addr(), timeout),
        }
    }

    /// Send one raw envelope.
    pub fn send(&mut self, envelope: &Envelope) -> Result<(), NavError> {
        self.sink.deliver(envelope)
    }

    /// Command `agent_name` to navigate to `target`.
    pub fn send_move(&mut self, agent_name: &str, target: Vec3) -> Result<(), NavError> {
        self.send(&Envelope::new(agent_name, Command::Move(target).to_string()))
    }

    /// Command `agent_name` to stop.
    pub fn send_stop(&mut self, agent_name: &str) -> Result<(), NavError> {
        self.send(&Envelope::new(agent_name, Command::Stop.to_string()))
    }
}

/// Receives events forwarded by a router's outbound sender.
pub struct EventCollector {
    listener: TcpListener,
    max_bytes: u64,
}

impl EventCollector {
    /// Bind the outbound endpoint.
    pub async fn bind(addr: SocketAddr) -> Result<Self, NavError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| NavError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            listener,
            max_bytes: 64 * 1024,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NavError> {
        self.listener
            .local_addr()
            .map_err(|e| NavError::Transport(e.to_string()))
    }

    /// Accept the next connection and decode the envelope it carries.
    pub async fn next_event(&self) -> Result<Envelope, NavError> {
        let (stream, _) = self
            .listener
            .accept()
            .await
            .map_err(|e| NavError::Transport(e.to_string()))?;
        let mut buf = Vec::new();
        stream
            .take(self.max_bytes)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| NavError::Transport(e.to_string()))?;
        codec::decode(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn client_commands_arrive_at_collector() -> Result<(), Box<dyn std::error::Error>> {
        // A collector doubles as a stand-in inbound endpoint here.
        let collector = EventCollector::bind("127.0.0.1:0".parse()?).await?;
        let addr = collector.local_addr()?;

        tokio::task::spawn_blocking(move || -> Result<(), NavError> {
            let mut client = ControlClient::new(addr);
            client.send_move("A", Vec3::new(1.0, 2.0, 3.0))?;
            client.send_stop("A")
        })
        .await??;

        assert_eq!(collector.next_event().await?, Envelope::new("A", "1,2,3"));
        assert_eq!(collector.next_event().await?, Envelope::new("A", "STOP"));
        Ok(())
    }

    #[test]
    fn client_to_closed_port_fails() -> Result<(), Box<dyn std::error::Error>> {
        let addr = std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?;
        let mut client = ControlClient::new(addr).with_timeout(Duration::from_millis(200));
        assert!(matches!(client.send_stop("A"), Err(NavError::Transport(_))));
        Ok(())
    }
}
