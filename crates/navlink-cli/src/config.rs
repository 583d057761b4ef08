//! Persistent settings in `~/.navlink/config.toml`.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use navlink_hal::Aabb;
use navlink_middleware::RouterConfig;
use navlink_runtime::AgentConfig;
use navlink_types::{NavError, Vec3};
use serde::{Deserialize, Serialize};

/// An agent created at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpawn {
    pub name: String,
    #[serde(default)]
    pub spawn: [f32; 3],
}

/// A line-of-sight blocker, given by two opposite corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleSpec {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl ObstacleSpec {
    pub fn to_aabb(&self) -> Aabb {
        Aabb::new(Vec3::from(self.min), Vec3::from(self.max))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where inbound commands are accepted.
    #[serde(default = "default_inbound_addr")]
    pub inbound_addr: SocketAddr,

    /// Where agent events are sent.
    #[serde(default = "default_outbound_addr")]
    pub outbound_addr: SocketAddr,

    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: f64,

    /// Upper bound on one accept wait in the listener.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    #[serde(default = "default_recv_buffer_bytes")]
    pub recv_buffer_bytes: usize,

    /// Connect/write timeout for each outbound event.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_arrival_threshold")]
    pub arrival_threshold: f32,

    #[serde(default = "default_detection_radius")]
    pub detection_radius: f32,

    #[serde(default = "default_proximity_interval_secs")]
    pub proximity_interval_secs: f64,

    #[serde(default = "default_status_display_secs")]
    pub status_display_secs: f64,

    /// Movement speed of simulated bodies, in units per second.
    #[serde(default = "default_agent_speed")]
    pub agent_speed: f32,

    #[serde(default = "default_agents")]
    pub agents: Vec<AgentSpawn>,

    #[serde(default)]
    pub obstacles: Vec<ObstacleSpec>,
}

fn default_inbound_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8003))
}
fn default_outbound_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8004))
}
fn default_tick_rate_hz() -> f64 {
    60.0
}
fn default_poll_timeout_ms() -> u64 {
    1000
}
fn default_recv_buffer_bytes() -> usize {
    1024
}
fn default_connect_timeout_ms() -> u64 {
    500
}
fn default_arrival_threshold() -> f32 {
    2.0
}
fn default_detection_radius() -> f32 {
    5.0
}
fn default_proximity_interval_secs() -> f64 {
    0.5
}
fn default_status_display_secs() -> f64 {
    2.0
}
fn default_agent_speed() -> f32 {
    3.5
}
fn default_agents() -> Vec<AgentSpawn> {
    [("Agent1", [0.0, 0.0, 0.0]), ("Agent2", [10.0, 0.0, 0.0]), ("Agent3", [0.0, 0.0, 10.0])]
        .into_iter()
        .map(|(name, spawn)| AgentSpawn {
            name: name.to_string(),
            spawn,
        })
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inbound_addr: default_inbound_addr(),
            outbound_addr: default_outbound_addr(),
            tick_rate_hz: default_tick_rate_hz(),
            poll_timeout_ms: default_poll_timeout_ms(),
            recv_buffer_bytes: default_recv_buffer_bytes(),
            connect_timeout_ms: default_connect_timeout_ms(),
            arrival_threshold: default_arrival_threshold(),
            detection_radius: default_detection_radius(),
            proximity_interval_secs: default_proximity_interval_secs(),
            status_display_secs: default_status_display_secs(),
            agent_speed: default_agent_speed(),
            agents: default_agents(),
            obstacles: Vec::new(),
        }
    }
}

impl Config {
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            inbound_addr: self.inbound_addr,
            outbound_addr: self.outbound_addr,
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
            recv_buffer_bytes: self.recv_buffer_bytes,
            send_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }

    /// Negative or non-finite durations fall back to the defaults.
    pub fn agent_config(&self) -> AgentConfig {
        let defaults = AgentConfig::default();
        AgentConfig {
            arrival_threshold: self.arrival_threshold,
            detection_radius: self.detection_radius,
            proximity_interval: Duration::try_from_secs_f64(self.proximity_interval_secs)
                .unwrap_or(defaults.proximity_interval),
            status_display: Duration::try_from_secs_f64(self.status_display_secs)
                .unwrap_or(defaults.status_display),
        }
    }
}

/// `~/.navlink/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".navlink").join("config.toml")
}

/// Load from `path`, or the default location.  `Ok(None)` when the file
/// does not exist.  Environment overrides are applied to a loaded file.
pub fn load(path: Option<&Path>) -> Result<Option<Config>, NavError> {
    let loaded = match path {
        Some(p) => load_from(p)?,
        None => load_from(&config_path())?,
    };
    Ok(loaded.map(|mut cfg| {
        apply_env_overrides(&mut cfg);
        cfg
    }))
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, NavError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| NavError::Config(format!("read {}: {e}", path.display())))?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| NavError::Config(format!("parse {}: {e}", path.display())))
}

/// Apply `NAVLINK_*` overrides.  Unparseable values are ignored.
///
/// | Variable | Field |
/// |---|---|
/// | `NAVLINK_INBOUND_ADDR` | `inbound_addr` |
/// | `NAVLINK_OUTBOUND_ADDR` | `outbound_addr` |
/// | `NAVLINK_TICK_RATE_HZ` | `tick_rate_hz` |
/// | `NAVLINK_ARRIVAL_THRESHOLD` | `arrival_threshold` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Some(addr) = env_parse("NAVLINK_INBOUND_ADDR") {
        cfg.inbound_addr = addr;
    }
    if let Some(addr) = env_parse("NAVLINK_OUTBOUND_ADDR") {
        cfg.outbound_addr = addr;
    }
    if let Some(rate) = env_parse::<f64>("NAVLINK_TICK_RATE_HZ").filter(|r| *r > 0.0) {
        cfg.tick_rate_hz = rate;
    }
    if let Some(threshold) = env_parse::<f32>("NAVLINK_ARRIVAL_THRESHOLD").filter(|t| *t >= 0.0) {
        cfg.arrival_threshold = threshold;
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

/// Write `cfg` to `path`, creating the parent directory.  On Unix the
/// directory is `0o700` and the file `0o600`.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), NavError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| NavError::Config(format!("create {}: {e}", parent.display())))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| NavError::Config(format!("chmod {}: {e}", parent.display())))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| NavError::Config(e.to_string()))?;
    let write_err = |e: std::io::Error| NavError::Config(format!("write {}: {e}", path.display()));

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(write_err)?;
        file.write_all(raw.as_bytes()).map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}
