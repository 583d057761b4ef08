//! [`AgentController`] – per-agent navigation and peer-detection state
//! machine.
//!
//! # Navigation
//!
//! Commands are latched on receipt and applied at the start of the next
//! [`update_navigation`][AgentController::update_navigation] call, never
//! mid-tick:
//!
//! | Received | Immediately | Next tick |
//! |---|---|---|
//! | `x,y,z` | target recorded, status `PendingCommand` | path started, status `Navigating` |
//! | `STOP` | status `Stopping`, any latched MOVE discarded | path cancelled, status `Idle`, "stopping" shown |
//! | anything else | nothing | nothing |
//!
//! While `Navigating`, once the navigator reports no pending path and the
//! live position is within the arrival threshold of the target, the agent
//! returns to `Idle` and emits `ARRIVED x,y,z` with the *commanded* target.
//!
//! # Peer detection
//!
//! On its own [`IntervalTimer`], independent of the navigation state, the
//! agent queries the [`ProximitySensor`] for bodies within the detection
//! radius.  Bodies controlled by another agent with a clear line of sight
//! form the current peer set; every peer absent from the previous set is
//! reported once as `NEW_AGENT:<name>`.  Peers that drop out of the set are
//! forgotten silently, so a peer that leaves and returns is reported again.

use std::collections::BTreeSet;
use std::time::Duration;

use navlink_hal::{Navigator, ProximitySensor, StatusDisplay};
use navlink_middleware::{MessageTarget, Outbox};
use navlink_types::{AgentEvent, Command, NavStatus, Vec3};
use tracing::debug;

use crate::timer::IntervalTimer;

const STOPPING_TEXT: &str = "I am stopping";
const ARRIVED_TEXT: &str = "I have arrived near the destination";

/// Tunables for a single agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Distance from the commanded target that counts as arrival.
    pub arrival_threshold: f32,
    /// Radius of the proximity query used for peer detection.
    pub detection_radius: f32,
    /// Period of the peer-detection poll.
    pub proximity_interval: Duration,
    /// How long STOP/ARRIVED status text stays visible.
    pub status_display: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            arrival_threshold: 2.0,
            detection_radius: 5.0,
            proximity_interval: Duration::from_millis(500),
            status_display: Duration::from_secs(2),
        }
    }
}

/// One navigating agent.
pub struct AgentController {
    name: String,
    config: AgentConfig,
    navigator: Box<dyn Navigator>,
    display: Box<dyn StatusDisplay>,
    outbox: Outbox,
    target: Vec3,
    status: NavStatus,
    latched_move: Option<Vec3>,
    latched_stop: bool,
    nearby_peers: BTreeSet<String>,
    proximity_timer: IntervalTimer,
}

impl AgentController {
    /// Create an idle agent.  `outbox` is the agent's handle onto the
    /// router's outbound queue.
    pub fn new(
        name: impl Into<String>,
        config: AgentConfig,
        navigator: Box<dyn Navigator>,
        display: Box<dyn StatusDisplay>,
        outbox: Outbox,
    ) -> Self {
        let proximity_timer = IntervalTimer::new(config.proximity_interval);
        Self {
            name: name.into(),
            config,
            navigator,
            display,
            outbox,
            target: Vec3::zero(),
            status: NavStatus::Idle,
            latched_move: None,
            latched_stop: false,
            nearby_peers: BTreeSet::new(),
            proximity_timer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> NavStatus {
        self.status
    }

    /// The last commanded destination.
    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Peers visible at the most recent detection poll.
    pub fn nearby_peers(&self) -> &BTreeSet<String> {
        &self.nearby_peers
    }

    pub fn position(&self) -> Vec3 {
        self.navigator.current_position()
    }

    /// Latch a decoded command for the next tick.
    pub fn apply_command(&mut self, command: Command) {
        match command {
            Command::Move(target) => {
                self.target = target;
                self.latched_move = Some(target);
                if !self.latched_stop {
                    self.status = NavStatus::PendingCommand;
                }
            }
            Command::Stop => {
                self.latched_stop = true;
                self.latched_move = None;
                self.status = NavStatus::Stopping;
            }
        }
    }

    /// Navigation step, run once per tick.
    pub fn update_navigation(&mut self) {
        if self.latched_stop {
            self.latched_stop = false;
            self.navigator.cancel_path();
            self.status = NavStatus::Idle;
            self.display
                .show_transient(STOPPING_TEXT, self.config.status_display);
        }

        if let Some(target) = self.latched_move.take() {
            self.navigator.begin_path(target);
            self.status = NavStatus::Navigating;
        }

        if self.status == NavStatus::Navigating
            && !self.navigator.is_path_pending()
            && self.navigator.current_position().distance(self.target)
                <= self.config.arrival_threshold
        {
            self.status = NavStatus::Idle;
            self.emit(AgentEvent::Arrived(self.target));
            self.display
                .show_transient(ARRIVED_TEXT, self.config.status_display);
        }
    }

    /// Run peer detection if the proximity timer is due at `now`.
    pub fn poll_proximity(&mut self, now: Duration, sensor: &dyn ProximitySensor) {
        if self.proximity_timer.poll(now) {
            self.detect_peers(sensor);
        }
    }

    /// Query the sensor, emit `NEW_AGENT` for newly visible peers and
    /// replace the peer set.
    pub fn detect_peers(&mut self, sensor: &dyn ProximitySensor) {
        let here = self.navigator.current_position();
        let mut current = BTreeSet::new();

        for body in sensor.query_nearby(here, self.config.detection_radius) {
            let Some(peer) = body.agent_name else { continue };
            if peer == self.name || !sensor.has_line_of_sight(here, body.position) {
                continue;
            }
            if !self.nearby_peers.contains(&peer) && !current.contains(&peer) {
                debug!(agent = %self.name, peer = %peer, "new nearby agent detected");
                self.emit(AgentEvent::NewAgent(peer.clone()));
            }
            current.insert(peer);
        }

        self.nearby_peers = current;
    }

    /// Move the status display clock forward.
    pub fn advance_display(&mut self, now: Duration) {
        self.display.advance(now);
    }

    fn emit(&self, event: AgentEvent) {
        self.outbox.send_from_agent(&self.name, event.to_string());
    }
}

impl MessageTarget for AgentController {
    fn receive_message(&mut self, message: &str) {
        match Command::parse(message) {
            Some(command) => self.apply_command(command),
            None => debug!(agent = %self.name, payload = message, "unrecognised command ignored"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navlink_hal::BodyRef;
    use navlink_types::Envelope;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    // ── Mocks ───────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct NavLog {
        position: Vec3,
        pending: bool,
        begun: Vec<Vec3>,
        cancels: usize,
    }

    #[derive(Clone, Default)]
    struct MockNavigator(Arc<Mutex<NavLog>>);

    impl Navigator for MockNavigator {
        fn begin_path(&mut self, target: Vec3) {
            self.0.lock().unwrap().begun.push(target);
        }

        fn cancel_path(&mut self) {
            self.0.lock().unwrap().cancels += 1;
        }

        fn is_path_pending(&self) -> bool {
            self.0.lock().unwrap().pending
        }

        fn current_position(&self) -> Vec3 {
            self.0.lock().unwrap().position
        }
    }

    #[derive(Clone, Default)]
    struct MockDisplay(Arc<Mutex<Vec<String>>>);

    impl StatusDisplay for MockDisplay {
        fn show_transient(&mut self, text: &str, _duration: Duration) {
            self.0.lock().unwrap().push(text.to_string());
        }
    }

    #[derive(Default)]
    struct MockSensor {
        bodies: Vec<BodyRef>,
        blocked: Vec<String>,
    }

    impl MockSensor {
        fn with_agents(names: &[&str]) -> Self {
            Self {
                bodies: names
                    .iter()
                    .map(|n| BodyRef {
                        agent_name: Some(n.to_string()),
                        position: Vec3::new(1.0, 0.0, 0.0),
                    })
                    .collect(),
                blocked: Vec::new(),
            }
        }
    }

    impl ProximitySensor for MockSensor {
        fn query_nearby(&self, _center: Vec3, _radius: f32) -> Vec<BodyRef> {
            self.bodies.clone()
        }

        fn has_line_of_sight(&self, _from: Vec3, to: Vec3) -> bool {
            !self.bodies.iter().any(|b| {
                b.position == to
                    && b
                        .agent_name
                        .as_ref()
                        .is_some_and(|n| self.blocked.contains(n))
            })
        }
    }

    struct Harness {
        agent: AgentController,
        nav: MockNavigator,
        display: MockDisplay,
        events: UnboundedReceiver<Envelope>,
    }

    impl Harness {
        fn new(name: &str) -> Self {
            let nav = MockNavigator::default();
            let display = MockDisplay::default();
            let (tx, events) = mpsc::unbounded_channel();
            let agent = AgentController::new(
                name,
                AgentConfig::default(),
                Box::new(nav.clone()),
                Box::new(display.clone()),
                Outbox::new(tx),
            );
            Self {
                agent,
                nav,
                display,
                events,
            }
        }

        fn drain_events(&mut self) -> Vec<String> {
            let mut out = Vec::new();
            while let Ok(env) = self.events.try_recv() {
                assert_eq!(env.agent_name, self.agent.name());
                out.push(env.message);
            }
            out
        }

        fn set_position(&self, p: Vec3) {
            self.nav.0.lock().unwrap().position = p;
        }

        fn set_pending(&self, pending: bool) {
            self.nav.0.lock().unwrap().pending = pending;
        }

        fn shown(&self) -> Vec<String> {
            self.display.0.lock().unwrap().clone()
        }
    }

    // ── Navigation ──────────────────────────────────────────────────────────

    #[test]
    fn move_is_latched_until_next_tick() {
        let mut h = Harness::new("A");
        h.set_position(Vec3::new(50.0, 0.0, 0.0));
        h.agent.receive_message("1,2,3");

        assert_eq!(h.agent.target(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(h.agent.status(), NavStatus::PendingCommand);
        assert!(h.nav.0.lock().unwrap().begun.is_empty());

        h.agent.update_navigation();
        assert_eq!(h.agent.status(), NavStatus::Navigating);
        assert_eq!(h.nav.0.lock().unwrap().begun, vec![Vec3::new(1.0, 2.0, 3.0)]);
    }

    #[test]
    fn malformed_commands_leave_state_unchanged() {
        let mut h = Harness::new("A");
        h.set_position(Vec3::new(50.0, 0.0, 0.0));
        h.agent.receive_message("4,5,6");
        h.agent.update_navigation();

        for garbage in ["1,2", "1,x,3", "1,2,3,4", "", "stop", "MOVE 1,2,3", "NaN,1,2"] {
            h.agent.receive_message(garbage);
            assert_eq!(h.agent.status(), NavStatus::Navigating, "input {garbage:?}");
            assert_eq!(h.agent.target(), Vec3::new(4.0, 5.0, 6.0), "input {garbage:?}");
        }
        h.agent.update_navigation();
        assert_eq!(h.nav.0.lock().unwrap().begun.len(), 1);
        assert!(h.drain_events().is_empty());
    }

    #[test]
    fn stop_returns_to_idle_within_one_tick() {
        for prior in ["idle", "pending", "navigating"] {
            let mut h = Harness::new("A");
            h.set_position(Vec3::new(50.0, 0.0, 0.0));
            match prior {
                "pending" => h.agent.receive_message("1,1,1"),
                "navigating" => {
                    h.agent.receive_message("1,1,1");
                    h.agent.update_navigation();
                }
                _ => {}
            }

            h.agent.receive_message("  STOP ");
            assert_eq!(h.agent.status(), NavStatus::Stopping);
            h.agent.update_navigation();

            assert_eq!(h.agent.status(), NavStatus::Idle, "prior state {prior}");
            assert_eq!(h.shown(), vec![STOPPING_TEXT.to_string()], "prior state {prior}");
            assert_eq!(h.nav.0.lock().unwrap().cancels, 1);
            assert!(h.drain_events().is_empty());
        }
    }

    #[test]
    fn stop_after_move_in_same_tick_wins() {
        let mut h = Harness::new("A");
        h.agent.receive_message("1,2,3");
        h.agent.receive_message("STOP");
        h.agent.update_navigation();
        assert_eq!(h.agent.status(), NavStatus::Idle);
        assert!(h.nav.0.lock().unwrap().begun.is_empty());
    }

    #[test]
    fn move_after_stop_in_same_tick_navigates() {
        let mut h = Harness::new("A");
        h.set_position(Vec3::new(50.0, 0.0, 0.0));
        h.agent.receive_message("STOP");
        h.agent.receive_message("1,2,3");
        assert_eq!(h.agent.status(), NavStatus::Stopping);

        h.agent.update_navigation();
        assert_eq!(h.agent.status(), NavStatus::Navigating);
        assert_eq!(h.shown(), vec![STOPPING_TEXT.to_string()]);
    }

    #[test]
    fn arrival_fires_exactly_once_with_commanded_target() {
        let mut h = Harness::new("A");
        h.set_position(Vec3::new(10.0, 0.0, 0.0));
        h.agent.receive_message("1,2,3");
        h.agent.update_navigation();
        h.agent.update_navigation();
        assert!(h.drain_events().is_empty());

        // Within threshold but not exactly on the target.
        h.set_position(Vec3::new(1.5, 2.0, 3.5));
        h.agent.update_navigation();
        assert_eq!(h.agent.status(), NavStatus::Idle);
        assert_eq!(h.drain_events(), vec!["ARRIVED 1,2,3".to_string()]);
        assert_eq!(h.shown(), vec![ARRIVED_TEXT.to_string()]);

        // Lingering within the threshold does not re-fire.
        for _ in 0..5 {
            h.agent.update_navigation();
        }
        assert!(h.drain_events().is_empty());
    }

    #[test]
    fn no_arrival_while_path_pending() {
        let mut h = Harness::new("A");
        h.set_pending(true);
        h.agent.receive_message("0,0,0");
        h.agent.update_navigation();
        assert_eq!(h.agent.status(), NavStatus::Navigating);
        assert!(h.drain_events().is_empty());

        h.set_pending(false);
        h.agent.update_navigation();
        assert_eq!(h.drain_events(), vec!["ARRIVED 0,0,0".to_string()]);
    }

    #[test]
    fn stop_interrupts_arrival() {
        let mut h = Harness::new("A");
        h.set_position(Vec3::new(10.0, 0.0, 0.0));
        h.agent.receive_message("1,2,3");
        h.agent.update_navigation();

        h.agent.receive_message("STOP");
        h.set_position(Vec3::new(1.0, 2.0, 3.0));
        h.agent.update_navigation();
        h.agent.update_navigation();

        assert_eq!(h.agent.status(), NavStatus::Idle);
        assert!(h.drain_events().is_empty());
    }

    #[test]
    fn each_move_arrives_once() {
        let mut h = Harness::new("A");
        h.agent.receive_message("0,0,0");
        h.agent.update_navigation();
        h.agent.receive_message("1,0,0");
        h.agent.update_navigation();
        assert_eq!(
            h.drain_events(),
            vec!["ARRIVED 0,0,0".to_string(), "ARRIVED 1,0,0".to_string()]
        );
    }

    // ── Peer detection ──────────────────────────────────────────────────────

    #[test]
    fn new_peer_reported_once_while_visible() {
        let mut h = Harness::new("A");
        let sensor = MockSensor::with_agents(&["A", "B"]);

        h.agent.detect_peers(&sensor);
        h.agent.detect_peers(&sensor);
        h.agent.detect_peers(&sensor);

        assert_eq!(h.drain_events(), vec!["NEW_AGENT:B".to_string()]);
        assert!(h.agent.nearby_peers().contains("B"));
        assert!(!h.agent.nearby_peers().contains("A"));
    }

    #[test]
    fn peer_reentering_is_reported_again() {
        let mut h = Harness::new("A");
        let visible = MockSensor::with_agents(&["B"]);
        let empty = MockSensor::default();

        h.agent.detect_peers(&visible);
        h.agent.detect_peers(&empty);
        assert!(h.agent.nearby_peers().is_empty());
        h.agent.detect_peers(&visible);

        assert_eq!(
            h.drain_events(),
            vec!["NEW_AGENT:B".to_string(), "NEW_AGENT:B".to_string()]
        );
    }

    #[test]
    fn peer_loss_is_silent() {
        let mut h = Harness::new("A");
        h.agent.detect_peers(&MockSensor::with_agents(&["B", "C"]));
        h.drain_events();

        h.agent.detect_peers(&MockSensor::with_agents(&["C"]));
        assert!(h.drain_events().is_empty());
        assert_eq!(h.agent.nearby_peers().len(), 1);
    }

    #[test]
    fn scenery_and_blocked_peers_are_ignored() {
        let mut h = Harness::new("A");
        let mut sensor = MockSensor::with_agents(&["B"]);
        sensor.blocked.push("B".to_string());
        sensor.bodies.push(BodyRef {
            agent_name: None,
            position: Vec3::new(0.5, 0.0, 0.0),
        });

        h.agent.detect_peers(&sensor);
        assert!(h.drain_events().is_empty());
        assert!(h.agent.nearby_peers().is_empty());
    }

    #[test]
    fn duplicate_bodies_for_one_peer_report_once() {
        let mut h = Harness::new("A");
        h.agent.detect_peers(&MockSensor::with_agents(&["B", "B"]));
        assert_eq!(h.drain_events(), vec!["NEW_AGENT:B".to_string()]);
    }

    #[test]
    fn proximity_poll_follows_its_own_interval() {
        let mut h = Harness::new("A");
        let sensor = MockSensor::with_agents(&["B"]);
        let empty = MockSensor::default();

        // Fires at t=0.
        h.agent.poll_proximity(Duration::ZERO, &sensor);
        assert_eq!(h.drain_events().len(), 1);

        // B disappears, but the timer is not due before 500 ms.
        h.agent.poll_proximity(Duration::from_millis(200), &empty);
        assert!(h.agent.nearby_peers().contains("B"));

        h.agent.poll_proximity(Duration::from_millis(500), &empty);
        assert!(h.agent.nearby_peers().is_empty());
    }
}
