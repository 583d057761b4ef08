//! [`Router`] – single point of contact between agents and the external
//! control process.
//!
//! The router owns:
//!
//! * the registry mapping agent names to agents (the router is the agents'
//!   only owner, so a deregistered agent can never be dispatched to),
//! * the inbound queue, fed by the background [`Listener`],
//! * the outbound queue, fed by every agent through an [`Outbox`],
//! * the [`EventSink`] that forwards outbound envelopes.
//!
//! Both queues are unbounded FIFO channels.  They are drained only from the
//! simulation thread, once per tick, via [`Router::drain_inbound`] and
//! [`Router::drain_outbound`].  Draining never waits for more traffic.
//!
//! # Example
//!
//! ```rust
//! use navlink_middleware::{MessageTarget, Router, RouterConfig};
//! use navlink_types::Envelope;
//!
//! #[derive(Default)]
//! struct Echo(Vec<String>);
//!
//! impl MessageTarget for Echo {
//!     fn receive_message(&mut self, message: &str) {
//!         self.0.push(message.to_string());
//!     }
//! }
//!
//! let mut router = Router::new(&RouterConfig::default());
//! router.register("A", Echo::default());
//!
//! router.inbound().send(Envelope::new("A", "STOP")).unwrap();
//! router.inbound().send(Envelope::new("ghost", "STOP")).unwrap();
//!
//! assert_eq!(router.drain_inbound(), 1);
//! assert_eq!(router.agent("A").unwrap().0, vec!["STOP".to_string()]);
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use navlink_types::Envelope;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::listener::Listener;
use crate::outbound::{EventSink, TcpEventSink};

/// Network and queue settings for a [`Router`].
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Endpoint the listener binds for inbound commands.
    pub inbound_addr: SocketAddr,
    /// Endpoint every outbound event is sent to.
    pub outbound_addr: SocketAddr,
    /// Upper bound on one accept wait; also bounds shutdown latency.
    pub poll_timeout: Duration,
    /// Size of the single receive buffer per inbound connection.
    pub recv_buffer_bytes: usize,
    /// Connect/write timeout for outbound deliveries.
    pub send_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            inbound_addr: SocketAddr::from(([127, 0, 0, 1], 8003)),
            outbound_addr: SocketAddr::from(([127, 0, 0, 1], 8004)),
            poll_timeout: Duration::from_secs(1),
            recv_buffer_bytes: 1024,
            send_timeout: Duration::from_millis(500),
        }
    }
}

/// Anything the router can deliver a command string to.
pub trait MessageTarget {
    /// Handle one inbound `message`.  Must not block.
    fn receive_message(&mut self, message: &str);
}

/// Cloneable handle onto the router's outbound queue.
///
/// Agents receive one at construction time; this is their only link to the
/// router.
#[derive(Clone, Debug)]
pub struct Outbox {
    tx: UnboundedSender<Envelope>,
}

impl Outbox {
    pub fn new(tx: UnboundedSender<Envelope>) -> Self {
        Self { tx }
    }

    /// Wrap `(agent_name, message)` in an envelope and append it to the
    /// outbound queue.  Never blocks.  Returns `false` if the router is gone.
    pub fn send_from_agent(&self, agent_name: &str, message: impl Into<String>) -> bool {
        let envelope = Envelope::new(agent_name, message);
        info!(agent = %envelope.agent_name, payload = %envelope.message, "sending message from agent");
        if self.tx.send(envelope).is_err() {
            warn!(agent = %agent_name, "outbound queue closed; event dropped");
            return false;
        }
        true
    }
}

/// Registry, queues, and network endpoints for one simulation.
pub struct Router<A> {
    agents: BTreeMap<String, A>,
    inbound_tx: UnboundedSender<Envelope>,
    inbound_rx: UnboundedReceiver<Envelope>,
    outbound_tx: UnboundedSender<Envelope>,
    outbound_rx: UnboundedReceiver<Envelope>,
    sink: Box<dyn EventSink>,
    listener: Option<Listener>,
}

impl<A: MessageTarget> Router<A> {
    /// Build a router with empty queues and a [`TcpEventSink`] pointed at
    /// `config.outbound_addr`.  No listener is started; use
    /// [`Router::start`] for that.
    pub fn new(config: &RouterConfig) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Self {
            agents: BTreeMap::new(),
            inbound_tx,
            inbound_rx,
            outbound_tx,
            outbound_rx,
            sink: Box::new(TcpEventSink::new(config.outbound_addr, config.send_timeout)),
            listener: None,
        }
    }

    /// Build a router and start the inbound listener.
    ///
    /// A bind failure is fatal to the listener only: it is logged and the
    /// router keeps working without inbound traffic.
    pub fn start(config: &RouterConfig) -> Self {
        let mut router = Self::new(config);
        match Listener::spawn(
            config.inbound_addr,
            config.poll_timeout,
            config.recv_buffer_bytes,
            router.inbound_tx.clone(),
        ) {
            Ok(listener) => router.listener = Some(listener),
            Err(e) => error!(error = %e, "inbound listener failed to start"),
        }
        router
    }

    /// Replace the outbound sink (builder-style).
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Address the inbound listener is bound to, if it is running.
    pub fn listener_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(Listener::local_addr)
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Register `agent` under `name`.  A previous registration under the
    /// same name is replaced and returned.
    pub fn register(&mut self, name: impl Into<String>, agent: A) -> Option<A> {
        let name = name.into();
        let previous = self.agents.insert(name.clone(), agent);
        if previous.is_some() {
            debug!(agent = %name, "registration replaced");
        }
        previous
    }

    /// Remove and return the agent registered under `name`.
    pub fn deregister(&mut self, name: &str) -> Option<A> {
        self.agents.remove(name)
    }

    pub fn agent(&self, name: &str) -> Option<&A> {
        self.agents.get(name)
    }

    /// Every registered agent, in name order.
    pub fn agents_mut(&mut self) -> impl Iterator<Item = &mut A> {
        self.agents.values_mut()
    }

    pub fn agent_names(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    // -----------------------------------------------------------------------
    // Queues
    // -----------------------------------------------------------------------

    /// Producer handle for the inbound queue.  The listener holds one; tests
    /// and in-process controllers may hold others.
    pub fn inbound(&self) -> UnboundedSender<Envelope> {
        self.inbound_tx.clone()
    }

    /// A new handle onto the outbound queue for an agent.
    pub fn outbox(&self) -> Outbox {
        Outbox::new(self.outbound_tx.clone())
    }

    /// Enqueue an event on behalf of `agent_name`.
    pub fn send_from_agent(&self, agent_name: &str, message: impl Into<String>) {
        Outbox::new(self.outbound_tx.clone()).send_from_agent(agent_name, message);
    }

    /// Deliver every envelope currently in the inbound queue to its agent.
    ///
    /// Envelopes for unknown names are dropped.  Returns the number of
    /// envelopes that reached an agent.
    pub fn drain_inbound(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(envelope) = self.inbound_rx.try_recv() {
            match self.agents.get_mut(&envelope.agent_name) {
                Some(agent) => {
                    agent.receive_message(&envelope.message);
                    delivered += 1;
                }
                None => debug!(agent = %envelope.agent_name, "no such agent; envelope dropped"),
            }
        }
        delivered
    }

    /// Send every envelope currently in the outbound queue through the sink.
    ///
    /// Failed deliveries are logged and dropped, never retried.  Returns the
    /// number of envelopes delivered.
    pub fn drain_outbound(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(envelope) = self.outbound_rx.try_recv() {
            match self.sink.deliver(&envelope) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    agent = %envelope.agent_name,
                    error = %e,
                    "unable to deliver event; dropped"
                ),
            }
        }
        delivered
    }

    /// Stop the inbound listener and wait for its thread to exit.  Safe to
    /// call more than once.
    pub fn shutdown(&mut self) {
        if let Some(mut listener) = self.listener.take() {
            listener.shutdown();
        }
    }
}
