//! Proximity queries against the engine's physics scene.

use navlink_types::Vec3;

/// A body returned by a proximity query.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyRef {
    /// Name of the agent controlling this body, or `None` for scenery.
    pub agent_name: Option<String>,
    pub position: Vec3,
}

/// Spatial query capability shared by every agent.
pub trait ProximitySensor: Send + Sync {
    /// Every body whose position lies within `radius` of `center`, the
    /// querying body included.
    fn query_nearby(&self, center: Vec3, radius: f32) -> Vec<BodyRef>;

    /// `true` when nothing in the scene blocks the straight segment from
    /// `from` to `to`.
    fn has_line_of_sight(&self, from: Vec3, to: Vec3) -> bool;
}
