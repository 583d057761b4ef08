//! `navlink-runtime` – agents and the simulation loop.
//!
//! # Modules
//!
//! - [`agent`] – [`AgentController`][agent::AgentController]: the per-agent
//!   state machine.  Latches MOVE/STOP commands, drives a
//!   [`Navigator`][navlink_hal::Navigator], reports `ARRIVED` and
//!   `NEW_AGENT` events through its [`Outbox`][navlink_middleware::Outbox].
//! - [`scheduler`] – [`Scheduler`][scheduler::Scheduler]: runs the router
//!   and every agent in a fixed tick order at a fixed rate.
//! - [`timer`] – [`IntervalTimer`][timer::IntervalTimer]: periodic trigger on
//!   the simulation clock, used for peer detection.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with optional OTLP export.

pub mod agent;
pub mod scheduler;
pub mod telemetry;
pub mod timer;

pub use agent::{AgentConfig, AgentController};
pub use scheduler::Scheduler;
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
pub use timer::IntervalTimer;
