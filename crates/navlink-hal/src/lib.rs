//! `navlink-hal` – Engine capability layer.
//!
//! The agents never talk to a physics or pathfinding engine directly.  They
//! drive the narrow traits defined here, so a headless simulation and a real
//! engine binding are interchangeable.
//!
//! # Modules
//!
//! - [`navigator`] – [`Navigator`][navigator::Navigator]: compute and follow
//!   a path to a point, report progress.
//! - [`proximity`] – [`ProximitySensor`][proximity::ProximitySensor]: find
//!   bodies within a radius and test line-of-sight between two points.
//! - [`display`] – [`StatusDisplay`][display::StatusDisplay]: show a short
//!   status line for a fixed duration, plus the clock-driven
//!   [`TransientDisplay`][display::TransientDisplay].
//! - [`step`] – [`SimulationStep`][step::SimulationStep]: advance the engine
//!   by one fixed time step.
//! - [`sim`] – [`SimWorld`][sim::SimWorld]: in-process world with
//!   straight-line motion and box obstacles for tests and headless runs.

pub mod display;
pub mod navigator;
pub mod proximity;
pub mod sim;
pub mod step;

pub use display::{StatusDisplay, TransientDisplay};
pub use navigator::Navigator;
pub use proximity::{BodyRef, ProximitySensor};
pub use sim::{Aabb, SimNavigator, SimWorld};
pub use step::SimulationStep;
