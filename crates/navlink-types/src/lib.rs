//! `navlink-types` – data shared by every navlink crate: geometry, the wire
//! envelope, the command and event grammars, and the error type.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A point or displacement in the simulated 3-D world.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The origin.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    /// Euclidean length.
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Straight-line distance between two points.
    pub fn distance(self, other: Self) -> f32 {
        self.sub(other).length()
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

/// The two-field unit exchanged with the external control process in both
/// directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub agent_name: String,
    pub message: String,
}

impl Envelope {
    pub fn new(agent_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            message: message.into(),
        }
    }
}

/// A navigation command decoded from the `message` field of an inbound
/// envelope.
///
/// Grammar:
///
/// | Text | Command |
/// |---|---|
/// | `"<x>,<y>,<z>"` | [`Command::Move`] |
/// | `"STOP"` (surrounding whitespace ignored) | [`Command::Stop`] |
///
/// Anything else decodes to `None` and is dropped by the receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Move(Vec3),
    Stop,
}

impl Command {
    /// Decode a command string. Returns `None` for malformed or unknown
    /// input; callers treat that as noise.
    pub fn parse(message: &str) -> Option<Self> {
        let fields: Vec<&str> = message.split(',').collect();
        if fields.len() == 3 {
            let x = parse_coordinate(fields[0])?;
            let y = parse_coordinate(fields[1])?;
            let z = parse_coordinate(fields[2])?;
            return Some(Self::Move(Vec3::new(x, y, z)));
        }
        if message.trim() == "STOP" {
            return Some(Self::Stop);
        }
        None
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move(p) => write!(f, "{},{},{}", p.x, p.y, p.z),
            Self::Stop => write!(f, "STOP"),
        }
    }
}

// Non-finite values parse as f32 but can never be reached, so they are
// rejected along with everything else that is not a number.
fn parse_coordinate(field: &str) -> Option<f32> {
    field.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}

/// Events an agent reports back to the external control process.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// The agent came within the arrival threshold of its commanded target.
    /// Carries the commanded point, not the live position.
    Arrived(Vec3),
    /// A peer became visible that was not visible at the previous poll.
    NewAgent(String),
}

impl AgentEvent {
    const ARRIVED_PREFIX: &'static str = "ARRIVED ";
    const NEW_AGENT_PREFIX: &'static str = "NEW_AGENT:";

    /// Decode an event string produced by [`fmt::Display`].
    pub fn parse(message: &str) -> Option<Self> {
        if let Some(rest) = message.strip_prefix(Self::ARRIVED_PREFIX) {
            return match Command::parse(rest)? {
                Command::Move(point) => Some(Self::Arrived(point)),
                Command::Stop => None,
            };
        }
        message
            .strip_prefix(Self::NEW_AGENT_PREFIX)
            .filter(|name| !name.is_empty())
            .map(|name| Self::NewAgent(name.to_string()))
    }
}

impl fmt::Display for AgentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arrived(p) => write!(f, "{}{},{},{}", Self::ARRIVED_PREFIX, p.x, p.y, p.z),
            Self::NewAgent(name) => write!(f, "{}{name}", Self::NEW_AGENT_PREFIX),
        }
    }
}

/// Navigation state of a single agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavStatus {
    /// No active command.
    #[default]
    Idle,
    /// A MOVE has been latched and will be applied on the next tick.
    PendingCommand,
    /// A path toward the commanded target is in progress.
    Navigating,
    /// A STOP has been latched; the path is cancelled on the next tick.
    Stopping,
}

/// Error type shared by every navlink crate.
#[derive(Error, Debug)]
pub enum NavError {
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Codec Error: {0}")]
    Codec(String),

    #[error("Config Error: {0}")]
    Config(String),

    #[error("Runtime Error: {0}")]
    Runtime(String),
}
