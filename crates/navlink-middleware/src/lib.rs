//! `navlink-middleware` – The Message Router
//!
//! Moves envelopes between the external control process and the agents
//! without caring what the commands mean.
//!
//! # Modules
//!
//! - [`codec`] – JSON encoding of the two-field [`Envelope`][navlink_types::Envelope].
//! - [`router`] – [`Router`]: name → agent dispatch table plus the inbound
//!   and outbound queues, drained once per simulation tick.
//! - [`listener`] – [`Listener`]: background thread accepting one envelope
//!   per TCP connection and feeding the inbound queue.
//! - [`outbound`] – [`EventSink`] and the short-lived-connection
//!   [`TcpEventSink`] that forwards agent events.
//! - [`control`] – [`ControlClient`] and [`EventCollector`], the external
//!   side of the protocol.

pub mod codec;
pub mod control;
pub mod listener;
pub mod outbound;
pub mod router;

pub use control::{ControlClient, EventCollector};
pub use listener::Listener;
pub use outbound::{EventSink, TcpEventSink};
pub use router::{MessageTarget, Outbox, Router, RouterConfig};
