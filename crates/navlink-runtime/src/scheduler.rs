//! [`Scheduler`] – the fixed-rate simulation loop.
//!
//! One [`tick`][Scheduler::tick] runs these phases, in order, on the calling
//! thread:
//!
//! 1. drain the inbound queue into the agents,
//! 2. advance every status display to the tick's time,
//! 3. navigation update for every agent,
//! 4. proximity poll for every agent whose detection timer is due,
//! 5. drain the outbound queue to the event sink,
//! 6. step the simulation engine (if one is attached) and advance the clock.
//!
//! Commands received during a tick are therefore applied on the next
//! navigation update, and events raised during a tick leave the process at
//! the end of that same tick.  Displays are advanced before navigation so
//! that text shown during a tick is timed from that tick's clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use navlink_hal::{Navigator, ProximitySensor, SimulationStep, StatusDisplay};
use navlink_middleware::Router;
use tracing::{debug, info, warn};

use crate::agent::{AgentConfig, AgentController};

pub struct Scheduler {
    router: Router<AgentController>,
    sensor: Arc<dyn ProximitySensor>,
    engine: Option<Box<dyn SimulationStep>>,
    clock: Duration,
    ticks: u64,
}

impl Scheduler {
    pub fn new(router: Router<AgentController>, sensor: Arc<dyn ProximitySensor>) -> Self {
        Self {
            router,
            sensor,
            engine: None,
            clock: Duration::ZERO,
            ticks: 0,
        }
    }

    /// Attach the engine stepped at the end of each tick (builder-style).
    pub fn with_engine(mut self, engine: impl SimulationStep + 'static) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    /// Build an [`AgentController`] wired to this scheduler's router and
    /// register it under `name`.  Replaces any agent already registered
    /// under that name.
    pub fn add_agent(
        &mut self,
        name: &str,
        config: AgentConfig,
        navigator: Box<dyn Navigator>,
        display: Box<dyn StatusDisplay>,
    ) {
        let agent = AgentController::new(name, config, navigator, display, self.router.outbox());
        if self.router.register(name, agent).is_some() {
            warn!(agent = name, "agent re-registered; previous instance dropped");
        }
    }

    /// Remove an agent.  Its navigator and display are dropped with it, so a
    /// simulated body leaves the world, and later commands addressed to it
    /// are dropped.
    pub fn remove_agent(&mut self, name: &str) -> Option<AgentController> {
        self.router.deregister(name)
    }

    pub fn router(&self) -> &Router<AgentController> {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router<AgentController> {
        &mut self.router
    }

    /// Simulation time elapsed so far.
    pub fn clock(&self) -> Duration {
        self.clock
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one tick of length `dt`.
    pub fn tick(&mut self, dt: Duration) {
        let now = self.clock;

        self.router.drain_inbound();

        for agent in self.router.agents_mut() {
            agent.advance_display(now);
        }

        for agent in self.router.agents_mut() {
            agent.update_navigation();
        }

        let sensor = Arc::clone(&self.sensor);
        for agent in self.router.agents_mut() {
            agent.poll_proximity(now, sensor.as_ref());
        }

        self.router.drain_outbound();

        if let Some(engine) = self.engine.as_mut() {
            engine.step(dt);
        }
        self.clock += dt;
        self.ticks += 1;
    }

    /// Tick at `tick_rate_hz` until `shutdown` is set, then stop the router.
    ///
    /// Each tick advances the simulation clock by exactly one period; a tick
    /// that overruns its period is followed immediately by the next one.
    pub fn run(&mut self, tick_rate_hz: f64, shutdown: Arc<AtomicBool>) {
        let period = Duration::from_secs_f64(1.0 / tick_rate_hz.max(1.0));
        info!(agents = self.router.len(), rate_hz = tick_rate_hz, "simulation started");

        let mut next = Instant::now();
        while !shutdown.load(Ordering::Acquire) {
            self.tick(period);
            next += period;
            match next.checked_duration_since(Instant::now()) {
                Some(wait) => std::thread::sleep(wait),
                None => {
                    debug!(tick = self.ticks, "tick overran its period");
                    next = Instant::now();
                }
            }
        }

        self.router.shutdown();
        info!(ticks = self.ticks, "simulation stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navlink_hal::{SimWorld, TransientDisplay};
    use navlink_middleware::{EventSink, RouterConfig};
    use navlink_types::{Envelope, NavError, NavStatus, Vec3};
    use std::sync::Mutex;

    const DT: Duration = Duration::from_millis(100);

    #[derive(Clone, Default)]
    struct MemorySink(Arc<Mutex<Vec<Envelope>>>);

    impl EventSink for MemorySink {
        fn deliver(&mut self, envelope: &Envelope) -> Result<(), NavError> {
            self.0.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }

    fn sim(agents: &[(&str, Vec3)]) -> (Scheduler, SimWorld, MemorySink) {
        let world = SimWorld::new(10.0);
        let sink = MemorySink::default();
        let router = Router::new(&RouterConfig::default()).with_sink(sink.clone());
        let mut scheduler =
            Scheduler::new(router, Arc::new(world.clone())).with_engine(world.clone());
        for &(name, spawn) in agents {
            scheduler.add_agent(
                name,
                AgentConfig::default(),
                Box::new(world.spawn_agent(name, spawn)),
                Box::new(TransientDisplay::new(name)),
            );
        }
        (scheduler, world, sink)
    }

    fn send(scheduler: &Scheduler, agent: &str, message: &str) {
        scheduler
            .router()
            .inbound()
            .send(Envelope::new(agent, message))
            .unwrap();
    }

    #[test]
    fn tick_advances_clock_and_count() {
        let (mut scheduler, _, _) = sim(&[]);
        scheduler.tick(DT);
        scheduler.tick(DT);
        assert_eq!(scheduler.clock(), Duration::from_millis(200));
        assert_eq!(scheduler.ticks(), 2);
    }

    #[test]
    fn command_applies_on_the_tick_that_drains_it() {
        let (mut scheduler, _, _) = sim(&[("A", Vec3::new(30.0, 0.0, 0.0))]);
        send(&scheduler, "A", "0,0,0");
        scheduler.tick(DT);
        let agent = scheduler.router().agent("A").unwrap();
        assert_eq!(agent.status(), NavStatus::Navigating);
    }

    #[test]
    fn move_ends_in_single_arrival() {
        let (mut scheduler, world, sink) = sim(&[("A", Vec3::new(10.0, 0.0, 0.0))]);
        send(&scheduler, "A", "1,2,3");
        for _ in 0..40 {
            scheduler.tick(DT);
        }
        assert!(world.position_of("A").unwrap().distance(Vec3::new(1.0, 2.0, 3.0)) <= 2.0);
        let events = sink.0.lock().unwrap();
        assert_eq!(*events, vec![Envelope::new("A", "ARRIVED 1,2,3")]);
    }

    #[test]
    fn agents_meeting_report_each_other_once() {
        let (mut scheduler, _, sink) =
            sim(&[("A", Vec3::zero()), ("B", Vec3::new(3.0, 0.0, 0.0))]);
        for _ in 0..20 {
            scheduler.tick(DT);
        }
        let events = sink.0.lock().unwrap();
        assert_eq!(
            *events,
            vec![Envelope::new("A", "NEW_AGENT:B"), Envelope::new("B", "NEW_AGENT:A")]
        );
    }

    #[test]
    fn removed_agent_leaves_the_world() {
        let (mut scheduler, world, sink) =
            sim(&[("A", Vec3::zero()), ("B", Vec3::new(20.0, 0.0, 0.0))]);
        scheduler.tick(DT);
        assert!(scheduler.remove_agent("B").is_some());

        assert_eq!(world.position_of("B"), None);
        assert!(!world.teleport("B", Vec3::new(1.0, 0.0, 0.0)));
        send(&scheduler, "B", "0,0,0");
        for _ in 0..10 {
            scheduler.tick(DT);
        }

        let visible = world.query_nearby(Vec3::zero(), 50.0);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].agent_name.as_deref(), Some("A"));
        assert!(sink.0.lock().unwrap().is_empty());
        assert!(scheduler.router().agent("A").unwrap().nearby_peers().is_empty());
    }

    #[test]
    fn reregistering_a_name_keeps_the_new_body() {
        let (mut scheduler, world, _) = sim(&[("A", Vec3::zero())]);
        scheduler.add_agent(
            "A",
            AgentConfig::default(),
            Box::new(world.spawn_agent("A", Vec3::new(4.0, 0.0, 0.0))),
            Box::new(TransientDisplay::new("A")),
        );
        assert_eq!(world.position_of("A"), Some(Vec3::new(4.0, 0.0, 0.0)));
    }

    #[derive(Clone)]
    struct SharedDisplay(Arc<Mutex<TransientDisplay>>);

    impl SharedDisplay {
        fn text(&self) -> Option<String> {
            self.0.lock().unwrap().visible_text().map(str::to_string)
        }
    }

    impl StatusDisplay for SharedDisplay {
        fn show_transient(&mut self, text: &str, duration: Duration) {
            self.0.lock().unwrap().show_transient(text, duration);
        }

        fn advance(&mut self, now: Duration) {
            self.0.lock().unwrap().advance(now);
        }
    }

    #[test]
    fn status_text_is_visible_for_its_full_duration() {
        let half = Duration::from_millis(500);
        let (mut scheduler, world, _) = sim(&[]);
        let display = SharedDisplay(Arc::new(Mutex::new(TransientDisplay::new("A"))));
        scheduler.add_agent(
            "A",
            AgentConfig::default(),
            Box::new(world.spawn_agent("A", Vec3::zero())),
            Box::new(display.clone()),
        );

        // t = 0.0 .. 1.5
        for _ in 0..4 {
            scheduler.tick(half);
        }
        send(&scheduler, "A", "STOP");

        // Shown at t = 2.0, hidden at t = 4.0.
        scheduler.tick(half);
        for _ in 0..4 {
            assert_eq!(display.text().as_deref(), Some("I am stopping"));
            scheduler.tick(half);
        }
        assert_eq!(display.text(), None);
    }

    #[test]
    fn run_returns_once_shutdown_is_set() {
        let (mut scheduler, _, _) = sim(&[]);
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            flag.store(true, Ordering::Release);
        });
        scheduler.run(100.0, shutdown);
        stopper.join().unwrap();
        assert!(scheduler.ticks() > 0);
    }
}
