//! [`SimWorld`] – headless in-process world for tests and local runs.
//!
//! Stands in for a physics/pathfinding engine so the full routing stack can
//! run without one.
//!
//! # Behaviour
//!
//! | Capability | Simulated behaviour |
//! |---|---|
//! | Pathfinding | A requested path stays *pending* until the next [`step`][SimulationStep::step]; afterwards the body moves in a straight line at the world speed and stops on the target. |
//! | Proximity | Every agent body and prop within the radius is returned. |
//! | Line-of-sight | Blocked when the segment crosses any [`Aabb`] obstacle. |
//! | Lifetime | A body is despawned when the [`SimNavigator`] that owns it is dropped. |
//!
//! Paths ignore obstacles; only visibility is affected by them.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use navlink_hal::{Navigator, SimulationStep, SimWorld};
//! use navlink_types::Vec3;
//!
//! let mut world = SimWorld::new(1.0);
//! let mut nav = world.spawn_agent("scout", Vec3::zero());
//!
//! nav.begin_path(Vec3::new(2.0, 0.0, 0.0));
//! assert!(nav.is_path_pending());
//!
//! world.step(Duration::from_secs(1)); // path computed
//! world.step(Duration::from_secs(1)); // moved 1 unit
//! assert_eq!(nav.current_position(), Vec3::new(1.0, 0.0, 0.0));
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use navlink_types::Vec3;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::navigator::Navigator;
use crate::proximity::{BodyRef, ProximitySensor};
use crate::step::SimulationStep;

// ────────────────────────────────────────────────────────────────────────────
// Obstacles
// ────────────────────────────────────────────────────────────────────────────

/// Axis-aligned box that blocks line-of-sight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create a box from two opposite corners in any order.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Slab test: does the segment `from → to` touch this box?
    pub fn intersects_segment(&self, from: Vec3, to: Vec3) -> bool {
        let dir = to.sub(from);
        let mut t_enter = 0.0f32;
        let mut t_exit = 1.0f32;

        let axes = [
            (from.x, dir.x, self.min.x, self.max.x),
            (from.y, dir.y, self.min.y, self.max.y),
            (from.z, dir.z, self.min.z, self.max.z),
        ];
        for (origin, d, lo, hi) in axes {
            if d.abs() < f32::EPSILON {
                // Parallel to this slab: must already be inside it.
                if origin < lo || origin > hi {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (lo - origin) * inv;
            let mut t1 = (hi - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_enter = t_enter.max(t0);
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return false;
            }
        }
        true
    }
}

// ────────────────────────────────────────────────────────────────────────────
// World state
// ────────────────────────────────────────────────────────────────────────────

struct Body {
    generation: u64,
    position: Vec3,
    target: Option<Vec3>,
    pending: bool,
}

struct WorldState {
    speed: f32,
    next_generation: u64,
    agents: HashMap<String, Body>,
    props: Vec<Vec3>,
    obstacles: Vec<Aabb>,
}

/// Shared handle to a simulated world.  Clone it cheaply – all clones see
/// the same bodies.
#[derive(Clone)]
pub struct SimWorld {
    state: Arc<Mutex<WorldState>>,
}

impl SimWorld {
    /// Create an empty world in which every body moves at `speed` units per
    /// second.
    pub fn new(speed: f32) -> Self {
        Self {
            state: Arc::new(Mutex::new(WorldState {
                speed,
                next_generation: 0,
                agents: HashMap::new(),
                props: Vec::new(),
                obstacles: Vec::new(),
            })),
        }
    }

    /// Place an agent body at `position` and return its navigator.  An
    /// existing body with the same name is replaced.
    ///
    /// The body lives as long as the returned navigator: dropping the
    /// navigator removes it from the world, unless the name has since been
    /// respawned.
    pub fn spawn_agent(&self, name: impl Into<String>, position: Vec3) -> SimNavigator {
        let name = name.into();
        let mut state = self.state.lock();
        let generation = state.next_generation;
        state.next_generation += 1;
        state.agents.insert(
            name.clone(),
            Body {
                generation,
                position,
                target: None,
                pending: false,
            },
        );
        drop(state);
        SimNavigator {
            name,
            generation,
            world: self.clone(),
        }
    }

    /// Remove an agent body.  Returns `false` if no such body existed.
    pub fn remove_agent(&self, name: &str) -> bool {
        self.state.lock().agents.remove(name).is_some()
    }

    /// Add a body that is not controlled by any agent.
    pub fn add_prop(&self, position: Vec3) {
        self.state.lock().props.push(position);
    }

    /// Add a line-of-sight blocker.
    pub fn add_obstacle(&self, obstacle: Aabb) {
        self.state.lock().obstacles.push(obstacle);
    }

    /// Current position of the named agent body.
    pub fn position_of(&self, name: &str) -> Option<Vec3> {
        self.state.lock().agents.get(name).map(|b| b.position)
    }

    /// Move an agent body instantly.  Any active path is kept.
    pub fn teleport(&self, name: &str, position: Vec3) -> bool {
        match self.state.lock().agents.get_mut(name) {
            Some(body) => {
                body.position = position;
                true
            }
            None => false,
        }
    }

    /// Advance every body by `dt`.
    pub fn advance(&self, dt: Duration) {
        let mut state = self.state.lock();
        let travel = state.speed * dt.as_secs_f32();
        for body in state.agents.values_mut() {
            if body.pending {
                body.pending = false;
                continue;
            }
            let Some(target) = body.target else { continue };
            let delta = target.sub(body.position);
            let remaining = delta.length();
            if remaining <= travel {
                body.position = target;
                body.target = None;
            } else {
                body.position = body.position.add(delta.scale(travel / remaining));
            }
        }
    }

    fn with_body<R>(&self, name: &str, f: impl FnOnce(&mut Body) -> R) -> Option<R> {
        self.state.lock().agents.get_mut(name).map(f)
    }
}

impl SimulationStep for SimWorld {
    fn step(&mut self, dt: Duration) {
        self.advance(dt);
    }
}

impl ProximitySensor for SimWorld {
    fn query_nearby(&self, center: Vec3, radius: f32) -> Vec<BodyRef> {
        let state = self.state.lock();
        let agents = state
            .agents
            .iter()
            .filter(|(_, body)| body.position.distance(center) <= radius)
            .map(|(name, body)| BodyRef {
                agent_name: Some(name.clone()),
                position: body.position,
            });
        let props = state
            .props
            .iter()
            .filter(|p| p.distance(center) <= radius)
            .map(|&position| BodyRef {
                agent_name: None,
                position,
            });
        agents.chain(props).collect()
    }

    fn has_line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
        !self
            .state
            .lock()
            .obstacles
            .iter()
            .any(|o| o.intersects_segment(from, to))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimNavigator
// ────────────────────────────────────────────────────────────────────────────

/// [`Navigator`] bound to one agent body in a [`SimWorld`].
pub struct SimNavigator {
    name: String,
    generation: u64,
    world: SimWorld,
}

impl Drop for SimNavigator {
    fn drop(&mut self) {
        let mut state = self.world.state.lock();
        if state
            .agents
            .get(&self.name)
            .is_some_and(|body| body.generation == self.generation)
        {
            state.agents.remove(&self.name);
            debug!(body = %self.name, "body despawned");
        }
    }
}

impl Navigator for SimNavigator {
    fn begin_path(&mut self, target: Vec3) {
        let found = self.world.with_body(&self.name, |body| {
            body.target = Some(target);
            body.pending = true;
        });
        if found.is_none() {
            warn!(body = %self.name, "begin_path on a body that is not in the world");
        }
    }

    fn cancel_path(&mut self) {
        self.world.with_body(&self.name, |body| {
            body.target = None;
            body.pending = false;
        });
    }

    fn is_path_pending(&self) -> bool {
        self.world
            .with_body(&self.name, |body| body.pending)
            .unwrap_or(false)
    }

    fn current_position(&self) -> Vec3 {
        self.world.position_of(&self.name).unwrap_or_default()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
