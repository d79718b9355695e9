//! Fleet supervision.
//!
//! The `Supervisor` launches a formation, relays instance output to the
//! console, classifies every exit, schedules respawns through its
//! [`RespawnPolicy`] and broadcasts signals to the live fleet. All of its
//! state is owned by a single event loop; spawned tasks only send [`Event`]s.
//!
//! Each instance key cycles `Running -> Exited -> WaitingRespawn -> Running`
//! until the policy gives up on it or the supervisor shuts down.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::allocator;
use crate::console::Console;
use crate::environment::EnvSnapshot;
use crate::error::FleetError;
use crate::events::Event;
use crate::exit::{ExitOutcome, Severity};
use crate::formation::Formation;
use crate::policy::RespawnPolicy;
use crate::process::{InstanceKey, LiveHandle, ProcessSpec, PORT_VAR, WORKER_NAME_VAR};
use crate::procfile::Procfile;
use crate::registry::Registry;
use crate::runner::Spawner;
use crate::shell::Shell;
use crate::signal::{OsSignals, Signal, SignalSink};

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(5000);

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy)]
pub struct SupervisorSettings {
    pub policy: RespawnPolicy,
    /// Grace period between the shutdown signal and SIGKILL.
    pub shutdown_timeout: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            policy: RespawnPolicy::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Why [`Supervisor::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Shutdown was requested and every instance has exited.
    Stopped,
    /// No instance is left to supervise.
    Exhausted,
}

/// One supervised instance key and the spec every incarnation reuses.
struct Unit {
    spec: ProcessSpec,
    incarnation: u64,
    /// Consecutive respawns since the last clean exit.
    attempts: u32,
}

impl Unit {
    /// Counts one more respawn; a clean exit starts a new streak.
    fn record_exit(&mut self, clean: bool) -> u32 {
        if clean {
            self.attempts = 0;
        }
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }
}

#[derive(Debug, Clone, Copy)]
struct ShutdownState {
    deadline: Instant,
    escalated: bool,
}

enum Step {
    Event(Event),
    Escalate,
}

pub struct Supervisor<C: Console> {
    console: C,
    spawner: Spawner,
    signals: Box<dyn SignalSink>,
    snapshot: EnvSnapshot,
    settings: SupervisorSettings,
    registry: Registry,
    units: HashMap<InstanceKey, Unit>,
    event_tx: mpsc::Sender<Event>,
    event_rx: mpsc::Receiver<Event>,
    shutdown: Option<ShutdownState>,
}

impl<C: Console> Supervisor<C> {
    /// Creates a supervisor that spawns through the platform shell and signals real processes.
    pub fn new(console: C, snapshot: EnvSnapshot, settings: SupervisorSettings) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let shell = Shell::detect(&snapshot);
        Self {
            console,
            spawner: Spawner::new(shell, event_tx.clone()),
            signals: Box::new(OsSignals),
            snapshot,
            settings,
            registry: Registry::new(),
            units: HashMap::new(),
            event_tx,
            event_rx,
            shutdown: None,
        }
    }

    pub fn with_shell(mut self, shell: Shell) -> Self {
        self.spawner = Spawner::new(shell, self.event_tx.clone());
        self
    }

    pub fn with_signal_sink(mut self, sink: Box<dyn SignalSink>) -> Self {
        self.signals = sink;
        self
    }

    /// Sender for feeding external events (such as [`Event::Shutdown`]) into the loop.
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.event_tx.clone()
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn spec(&self, key: &InstanceKey) -> Option<&ProcessSpec> {
        self.units.get(key).map(|unit| &unit.spec)
    }

    /// Number of spawn attempts made for `key` so far.
    pub fn incarnation(&self, key: &InstanceKey) -> Option<u64> {
        self.units.get(key).map(|unit| unit.incarnation)
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Launches `formation` against the declared process types.
    ///
    /// A privileged `base_port` aborts before anything is spawned. Formation
    /// entries without a declaration are warned about and skipped, but still
    /// consume a type index. Returns the number of instances started.
    pub fn launch(
        &mut self,
        declared: &Procfile,
        formation: &Formation,
        overrides: &HashMap<String, String>,
        base_port: u16,
    ) -> Result<usize, FleetError> {
        if let Err(err) = allocator::validate_base_port(base_port) {
            self.console.fatal(&err.to_string());
            return Err(err);
        }

        let mut started = 0;
        for (type_index, requirement) in formation.iter().enumerate() {
            let Some(command) = declared.command(&requirement.name) else {
                let err = FleetError::UnknownProcessType {
                    name: requirement.name.clone(),
                };
                self.console.warn(&err.to_string());
                continue;
            };
            for instance_index in 0..requirement.count {
                let key = InstanceKey::new(&requirement.name, instance_index + 1);
                if self.units.contains_key(&key) {
                    self.console
                        .warn(&format!("instance {} is already running; skipping", key));
                    continue;
                }
                let assignment = allocator::assign(type_index, instance_index, base_port);
                if !assignment.port_in_range() {
                    let err = FleetError::PortOutOfRange {
                        key: key.to_string(),
                        port: assignment.port,
                    };
                    self.console.warn(&err.to_string());
                }
                let mut env = self.snapshot.merged(overrides);
                env.insert(PORT_VAR.to_string(), assignment.port.to_string());
                if !overrides.contains_key(WORKER_NAME_VAR) {
                    env.insert(WORKER_NAME_VAR.to_string(), key.to_string());
                }
                let spec = ProcessSpec {
                    command: command.to_string(),
                    env,
                    color: Some(assignment.color),
                };
                self.units.insert(
                    key.clone(),
                    Unit {
                        spec,
                        incarnation: 0,
                        attempts: 0,
                    },
                );
                self.spawn_incarnation(&key);
                started += 1;
            }
        }
        info!(instances = started, base_port, "fleet launched");
        Ok(started)
    }

    /// Sends the named signal to every instance live right now.
    ///
    /// Returns how many instances it reached. Instances spawned later are unaffected.
    pub fn killall(&mut self, signal_name: &str) -> Result<usize, FleetError> {
        let signal = Signal::parse(signal_name)?;
        Ok(self.broadcast(signal))
    }

    fn broadcast(&mut self, signal: Signal) -> usize {
        let deliveries = self.registry.broadcast(signal, self.signals.as_ref());
        for delivery in &deliveries {
            if let Some(unit) = self.units.get(&delivery.key) {
                self.console.info(
                    &delivery.key,
                    &unit.spec,
                    &format!("received exit signal: {}", signal),
                );
            }
            if let Err(err) = &delivery.result {
                warn!(key = %delivery.key, pid = delivery.handle.pid, %signal, error = %err, "signal delivery failed");
            }
        }
        deliveries.len()
    }

    /// Drives the event loop until shutdown completes or nothing is left to supervise.
    pub async fn run(&mut self) -> RunOutcome {
        loop {
            if let Some(outcome) = self.finished() {
                return outcome;
            }
            self.step().await;
        }
    }

    /// Waits for and applies one event (or the shutdown escalation deadline).
    pub async fn step(&mut self) {
        let deadline = self
            .shutdown
            .filter(|state| !state.escalated)
            .map(|state| state.deadline);
        let step = tokio::select! {
            event = self.event_rx.recv() => match event {
                Some(event) => Step::Event(event),
                None => return,
            },
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => Step::Escalate,
        };
        match step {
            Step::Event(event) => self.handle_event(event),
            Step::Escalate => self.escalate(),
        }
    }

    fn finished(&self) -> Option<RunOutcome> {
        if self.shutdown.is_some() {
            return self.registry.is_empty().then_some(RunOutcome::Stopped);
        }
        self.units.is_empty().then_some(RunOutcome::Exhausted)
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::InstanceOutput {
                key,
                incarnation,
                stream,
                chunk,
            } => {
                trace!(%key, incarnation, ?stream, bytes = chunk.len(), "instance output");
                if let Some(unit) = self.units.get(&key) {
                    self.console.log(&key, &unit.spec, &chunk);
                }
            }
            Event::InstanceExited {
                key,
                incarnation,
                pid,
                outcome,
            } => {
                self.registry.unregister(&key, incarnation);
                if !self.is_current(&key, incarnation) {
                    debug!(%key, incarnation, "ignoring exit of superseded incarnation");
                    return;
                }
                self.handle_termination(&key, outcome, Some(pid));
            }
            Event::InstanceLost {
                key,
                incarnation,
                error,
            } => {
                self.registry.unregister(&key, incarnation);
                if !self.is_current(&key, incarnation) {
                    return;
                }
                let outcome = ExitOutcome::SpawnFailed {
                    error: format!("lost track of process: {}", error),
                };
                self.handle_termination(&key, outcome, None);
            }
            Event::Respawn { key } => {
                if self.shutdown.is_some() {
                    debug!(%key, "respawn skipped during shutdown");
                    return;
                }
                self.spawn_incarnation(&key);
            }
            Event::Shutdown { signal } => self.begin_shutdown(signal),
        }
    }

    fn is_current(&self, key: &InstanceKey, incarnation: u64) -> bool {
        self.units
            .get(key)
            .map(|unit| unit.incarnation == incarnation)
            .unwrap_or(false)
    }

    fn spawn_incarnation(&mut self, key: &InstanceKey) {
        let Some(unit) = self.units.get_mut(key) else {
            return;
        };
        unit.incarnation += 1;
        let incarnation = unit.incarnation;
        match self.spawner.spawn(key, incarnation, &unit.spec) {
            Ok(pid) => {
                let port = unit.spec.port().unwrap_or("-").to_string();
                self.registry
                    .register(key.clone(), LiveHandle { pid, incarnation });
                self.console.info(
                    key,
                    &unit.spec,
                    &format!("started with pid {} (port {})", pid, port),
                );
            }
            Err(err) => {
                let outcome = ExitOutcome::SpawnFailed {
                    error: format!("{:#}", err),
                };
                self.handle_termination(key, outcome, None);
            }
        }
    }

    fn handle_termination(&mut self, key: &InstanceKey, outcome: ExitOutcome, pid: Option<u32>) {
        let Some(unit) = self.units.get_mut(key) else {
            return;
        };
        let message = outcome.describe(pid);
        match outcome.severity() {
            Severity::Info => self.console.info(key, &unit.spec, &message),
            Severity::Error => self.console.error(key, &unit.spec, &message),
        }
        if self.shutdown.is_some() {
            return;
        }

        let attempts = unit.record_exit(outcome.is_clean());
        match self.settings.policy.next_delay(attempts) {
            Some(delay) => {
                self.console.info(
                    key,
                    &unit.spec,
                    &format!("waiting to respawn ({} ms)", delay.as_millis()),
                );
                self.schedule_respawn(key.clone(), delay);
            }
            None => {
                self.console.error(
                    key,
                    &unit.spec,
                    &format!("giving up after {} consecutive respawns", attempts - 1),
                );
                self.units.remove(key);
            }
        }
    }

    // No cancellation path: a stale timer is dropped by the Respawn handler.
    fn schedule_respawn(&self, key: InstanceKey, delay: Duration) {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Event::Respawn { key }).await;
        });
    }

    fn begin_shutdown(&mut self, signal: Signal) {
        if self.shutdown.is_some() {
            self.escalate();
            return;
        }
        info!(%signal, live = self.registry.len(), "shutting down fleet");
        self.shutdown = Some(ShutdownState {
            deadline: Instant::now() + self.settings.shutdown_timeout,
            escalated: false,
        });
        self.broadcast(signal);
    }

    fn escalate(&mut self) {
        let Some(state) = self.shutdown.as_mut() else {
            return;
        };
        if state.escalated {
            return;
        }
        state.escalated = true;
        if !self.registry.is_empty() {
            warn!(live = self.registry.len(), "instances still running; sending SIGKILL");
            self.broadcast(Signal::Kill);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::future::Future;

    use super::*;
    use crate::console::testing::RecordingConsole;
    use crate::registry::testing::RecordingSink;

    fn supervisor(policy: RespawnPolicy) -> Supervisor<RecordingConsole> {
        Supervisor::new(
            RecordingConsole::default(),
            EnvSnapshot::capture(),
            SupervisorSettings {
                policy,
                shutdown_timeout: Duration::from_secs(2),
            },
        )
        .with_shell(Shell::posix())
    }

    fn key(name: &str, n: usize) -> InstanceKey {
        InstanceKey::new(name, n)
    }

    /// Steps the loop until `done` holds, failing after five seconds.
    async fn step_until<F>(sup: &mut Supervisor<RecordingConsole>, done: F)
    where
        F: Fn(&Supervisor<RecordingConsole>) -> bool,
    {
        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            while !done(sup) {
                sup.step().await;
            }
        })
        .await;
        assert!(waited.is_ok(), "condition not reached in time");
    }

    async fn within<T>(future: impl Future<Output = T>) -> T {
        tokio::time::timeout(Duration::from_secs(5), future)
            .await
            .expect("timed out")
    }

    #[tokio::test]
    async fn assigns_ports_by_type_and_instance() {
        let mut sup = supervisor(RespawnPolicy::default())
            .with_signal_sink(Box::new(RecordingSink::default()));
        let procfile = Procfile::from_entries([("web", "sleep 30"), ("api", "sleep 30")]);
        let formation = Formation::parse(&["web=2,api=1"]).unwrap();

        let started = sup
            .launch(&procfile, &formation, &HashMap::new(), 5000)
            .unwrap();
        assert_eq!(started, 3);

        let port = |sup: &Supervisor<RecordingConsole>, k: InstanceKey| {
            sup.spec(&k).and_then(|s| s.port()).map(str::to_string)
        };
        assert_eq!(port(&sup, key("web", 1)).as_deref(), Some("5000"));
        assert_eq!(port(&sup, key("web", 2)).as_deref(), Some("5001"));
        assert_eq!(port(&sup, key("api", 1)).as_deref(), Some("5100"));

        let web2 = sup.spec(&key("web", 2)).unwrap();
        assert_eq!(web2.env[WORKER_NAME_VAR], "web.2");
        assert_eq!(sup.registry().len(), 3);
    }

    #[tokio::test]
    async fn worker_name_override_is_respected() {
        let mut sup = supervisor(RespawnPolicy::default());
        let procfile = Procfile::from_entries([("web", "sleep 30")]);
        let overrides = HashMap::from([(WORKER_NAME_VAR.to_string(), "custom".to_string())]);
        sup.launch(&procfile, &Formation::parse(&["web=2"]).unwrap(), &overrides, 6000)
            .unwrap();
        assert_eq!(sup.spec(&key("web", 1)).unwrap().env[WORKER_NAME_VAR], "custom");
        assert_eq!(sup.spec(&key("web", 2)).unwrap().env[WORKER_NAME_VAR], "custom");
        sup.killall("SIGKILL").unwrap();
    }

    #[tokio::test]
    async fn privileged_base_port_spawns_nothing() {
        let mut sup = supervisor(RespawnPolicy::default());
        let procfile = Procfile::from_entries([("web", "sleep 30")]);
        let err = sup
            .launch(&procfile, &Formation::parse(&["web=2"]).unwrap(), &HashMap::new(), 80)
            .unwrap_err();
        assert_eq!(err, FleetError::PrivilegedPort { port: 80 });
        assert_eq!(sup.unit_count(), 0);
        assert!(sup.registry().is_empty());
        assert_eq!(sup.console().fatals(), 1);
    }

    #[tokio::test]
    async fn undeclared_type_is_skipped_but_consumes_type_index() {
        let mut sup = supervisor(RespawnPolicy::default());
        let procfile = Procfile::from_entries([("web", "sleep 30")]);
        let formation = Formation::parse(&["worker=2,web=1"]).unwrap();
        let started = sup
            .launch(&procfile, &formation, &HashMap::new(), 5000)
            .unwrap();
        assert_eq!(started, 1);
        assert_eq!(sup.console().warnings(), 1);
        assert!(sup.spec(&key("worker", 1)).is_none());
        assert_eq!(sup.spec(&key("web", 1)).unwrap().port(), Some("5100"));
        sup.killall("KILL").unwrap();
    }

    #[tokio::test]
    async fn failing_instance_is_respawned() {
        let mut sup = supervisor(RespawnPolicy::fixed(Duration::ZERO));
        let procfile = Procfile::from_entries([("web", "echo boot; exit 1")]);
        sup.launch(&procfile, &Formation::parse(&["web"]).unwrap(), &HashMap::new(), 5000)
            .unwrap();

        let web = key("web", 1);
        step_until(&mut sup, |sup| sup.incarnation(&web).unwrap_or(0) >= 2).await;
        let errors = sup.console().errors_for("web.1");
        assert!(errors.iter().any(|m| m.ends_with("exited with code 1")));
        assert!(sup.console().output_for("web.1").contains("boot"));
        assert!(sup
            .console()
            .infos_for("web.1")
            .contains(&"waiting to respawn (0 ms)"));
    }

    #[tokio::test]
    async fn fatal_signal_logs_error_and_respawns() {
        let mut sup = supervisor(RespawnPolicy::fixed(Duration::ZERO));
        let procfile = Procfile::from_entries([("web", "kill -TERM $$")]);
        sup.launch(&procfile, &Formation::parse(&["web"]).unwrap(), &HashMap::new(), 5000)
            .unwrap();

        let web = key("web", 1);
        step_until(&mut sup, |sup| sup.incarnation(&web).unwrap_or(0) >= 2).await;
        assert!(sup
            .console()
            .errors_for("web.1")
            .iter()
            .any(|m| m.ends_with("terminated by SIGTERM")));
    }

    #[tokio::test]
    async fn benign_signal_logs_info_and_respawns() {
        let mut sup = supervisor(RespawnPolicy::fixed(Duration::ZERO));
        let procfile = Procfile::from_entries([("web", "kill -USR1 $$")]);
        sup.launch(&procfile, &Formation::parse(&["web"]).unwrap(), &HashMap::new(), 5000)
            .unwrap();

        let web = key("web", 1);
        step_until(&mut sup, |sup| sup.incarnation(&web).unwrap_or(0) >= 2).await;
        assert!(sup
            .console()
            .infos_for("web.1")
            .iter()
            .any(|m| m.ends_with("terminated by SIGUSR1")));
        assert!(sup.console().errors_for("web.1").is_empty());
    }

    #[tokio::test]
    async fn killall_reaches_only_instances_alive_at_the_call() {
        let sink = RecordingSink::default();
        let mut sup =
            supervisor(RespawnPolicy::default()).with_signal_sink(Box::new(sink.clone()));
        let procfile = Procfile::from_entries([("web", "sleep 30"), ("api", "sleep 30")]);
        sup.launch(&procfile, &Formation::parse(&["web=2,api=1"]).unwrap(), &HashMap::new(), 5000)
            .unwrap();

        assert_eq!(sup.killall("SIGTERM").unwrap(), 3);
        let live_pids: Vec<u32> = [key("web", 1), key("web", 2), key("api", 1)]
            .iter()
            .map(|k| sup.registry().get(k).unwrap().pid)
            .collect();

        sup.launch(&procfile, &Formation::parse(&["web=3"]).unwrap(), &HashMap::new(), 5000)
            .unwrap();
        assert!(sup.registry().get(&key("web", 3)).is_some());

        let sent = sink.sent.borrow().clone();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|(pid, signal)| {
            *signal == Signal::Term && live_pids.contains(pid)
        }));
        assert_eq!(
            sup.killall("SIGWHATEVER"),
            Err(FleetError::UnknownSignal("SIGWHATEVER".into()))
        );
    }

    #[tokio::test]
    async fn respawned_incarnation_replaces_registry_entry() {
        let mut sup = supervisor(RespawnPolicy::fixed(Duration::ZERO));
        let procfile = Procfile::from_entries([("web", "exit 2")]);
        sup.launch(&procfile, &Formation::parse(&["web"]).unwrap(), &HashMap::new(), 5000)
            .unwrap();

        let web = key("web", 1);
        step_until(&mut sup, |sup| sup.incarnation(&web).unwrap_or(0) >= 3).await;
        assert!(sup.registry().len() <= 1);
        if let Some(handle) = sup.registry().get(&web) {
            assert_eq!(Some(handle.incarnation), sup.incarnation(&web));
        }
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let policy = RespawnPolicy {
            max_attempts: Some(2),
            ..RespawnPolicy::fixed(Duration::ZERO)
        };
        let mut sup = supervisor(policy);
        let procfile = Procfile::from_entries([("web", "exit 1")]);
        sup.launch(&procfile, &Formation::parse(&["web"]).unwrap(), &HashMap::new(), 5000)
            .unwrap();

        assert_eq!(within(sup.run()).await, RunOutcome::Exhausted);
        assert_eq!(sup.unit_count(), 0);
        assert!(sup
            .console()
            .errors_for("web.1")
            .contains(&"giving up after 2 consecutive respawns"));
    }

    #[tokio::test]
    async fn spawn_failure_is_contained_and_respawned() {
        let policy = RespawnPolicy {
            max_attempts: Some(1),
            ..RespawnPolicy::fixed(Duration::ZERO)
        };
        let mut sup = supervisor(policy).with_shell(Shell::Posix {
            program: "/nonexistent/sh".into(),
        });
        let procfile = Procfile::from_entries([("web", "true"), ("api", "true")]);
        let started = sup
            .launch(&procfile, &Formation::parse(&["web,api"]).unwrap(), &HashMap::new(), 5000)
            .unwrap();
        assert_eq!(started, 2);

        assert_eq!(within(sup.run()).await, RunOutcome::Exhausted);
        let errors = sup.console().errors_for("web.1");
        assert_eq!(
            errors
                .iter()
                .filter(|m| m.starts_with("failed to start"))
                .count(),
            2
        );
        assert!(sup.console().errors_for("api.1").len() >= 2);
    }

    #[tokio::test]
    async fn shutdown_stops_the_fleet_without_respawning() {
        let mut sup = supervisor(RespawnPolicy::fixed(Duration::ZERO));
        let procfile = Procfile::from_entries([("web", "sleep 30")]);
        sup.launch(&procfile, &Formation::parse(&["web=2"]).unwrap(), &HashMap::new(), 5000)
            .unwrap();

        sup.sender()
            .send(Event::Shutdown {
                signal: Signal::Term,
            })
            .await
            .unwrap();
        assert_eq!(within(sup.run()).await, RunOutcome::Stopped);
        assert_eq!(sup.incarnation(&key("web", 1)), Some(1));
        assert_eq!(sup.incarnation(&key("web", 2)), Some(1));
        assert!(sup
            .console()
            .infos_for("web.1")
            .contains(&"received exit signal: SIGTERM"));
    }

    #[tokio::test]
    async fn shutdown_escalates_to_kill_after_timeout() {
        let mut sup = Supervisor::new(
            RecordingConsole::default(),
            EnvSnapshot::capture(),
            SupervisorSettings {
                policy: RespawnPolicy::default(),
                shutdown_timeout: Duration::from_millis(200),
            },
        )
        .with_shell(Shell::posix());
        let procfile =
            Procfile::from_entries([("web", "trap '' TERM; echo ready; sleep 30 & wait")]);
        sup.launch(&procfile, &Formation::parse(&["web"]).unwrap(), &HashMap::new(), 5000)
            .unwrap();
        step_until(&mut sup, |sup| sup.console().output_for("web.1").contains("ready")).await;

        sup.sender()
            .send(Event::Shutdown {
                signal: Signal::Term,
            })
            .await
            .unwrap();
        assert_eq!(within(sup.run()).await, RunOutcome::Stopped);
        assert!(sup
            .console()
            .infos_for("web.1")
            .contains(&"received exit signal: SIGKILL"));
    }

    #[tokio::test]
    async fn out_of_range_port_is_warned_about() {
        let mut sup = supervisor(RespawnPolicy::default());
        let procfile = Procfile::from_entries([("web", "sleep 30"), ("api", "sleep 30")]);
        sup.launch(&procfile, &Formation::parse(&["web,api"]).unwrap(), &HashMap::new(), 65500)
            .unwrap();
        assert_eq!(sup.console().warnings(), 1);
        assert_eq!(sup.spec(&key("api", 1)).unwrap().port(), Some("65600"));
        sup.killall("KILL").unwrap();
    }

    #[test]
    fn attempt_counter_saturates_and_resets_on_clean_exit() {
        let mut unit = Unit {
            spec: ProcessSpec {
                command: "false".into(),
                env: HashMap::new(),
                color: None,
            },
            incarnation: 1,
            attempts: u32::MAX - 1,
        };
        assert_eq!(unit.record_exit(false), u32::MAX);
        assert_eq!(unit.record_exit(false), u32::MAX);
        assert_eq!(unit.record_exit(true), 1);
    }
}
