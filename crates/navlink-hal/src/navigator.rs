//! Generic `Navigator` trait for anything that can walk a body to a point.
//!
//! Implementations own the path computation.  The agent state machine only
//! asks for a path, polls whether it is still being computed, and reads the
//! live position back.

use navlink_types::Vec3;

/// Path-following capability for a single body.
pub trait Navigator: Send {
    /// Start computing and following a path toward `target`.  Replaces any
    /// path already in progress.
    fn begin_path(&mut self, target: Vec3);

    /// Drop the active path.  The body stays where it is.
    fn cancel_path(&mut self);

    /// `true` while the engine is still computing the path requested by the
    /// last [`begin_path`][Self::begin_path] call.
    fn is_path_pending(&self) -> bool;

    /// Current position of the body.
    fn current_position(&self) -> Vec3;
}
