//! Engine time-stepping hook.

use std::time::Duration;

/// Advances an engine by one fixed time step.  Called once per tick by the
/// scheduler after all agent updates for that tick have run.
pub trait SimulationStep {
    fn step(&mut self, dt: Duration);
}
