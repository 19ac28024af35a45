//! Multi-device orchestration.
//!
//! The [`Orchestrator`] runs one OS thread per configured device. Each thread
//! owns its [`DeviceSession`], encoder and transport outright; the only shared
//! pieces are the [`Shutdown`] signal and a status board holding the latest
//! [`DeviceReport`] of every device. Each device overwrites its own entry, so
//! the board never grows past one report per device.
//!
//! A failure on one device (bad catalogue, broker unreachable, publish error)
//! is confined to that device's thread. Its siblings keep running.

use crate::config::{BrokerConfig, DeviceConfig, RunLimit, SimulatorConfig};
use crate::encoding::{Encoder, Encoding};
use crate::error::{Error, Result};
use crate::payload::Payload;
use crate::publisher::{Connector, LinkEvent, Transport};
use crate::registry::MetricRegistry;
use crate::session::DeviceSession;
use crate::types::MetricValue;
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Coordinated shutdown signal.
///
/// Device threads sleep on this instead of `thread::sleep`, so a
/// [`trigger`](Shutdown::trigger) wakes every one of them immediately.
#[derive(Debug, Default)]
pub struct Shutdown {
    triggered: Mutex<bool>,
    signal: Condvar,
}

impl Shutdown {
    /// Creates an untriggered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Triggers shutdown and wakes all waiters.
    pub fn trigger(&self) {
        let mut triggered = self.triggered.lock().unwrap_or_else(PoisonError::into_inner);
        *triggered = true;
        self.signal.notify_all();
    }

    /// Returns true once shutdown was triggered.
    pub fn is_triggered(&self) -> bool {
        *self.triggered.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps until `deadline` or shutdown. Returns true on shutdown.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut triggered = self.triggered.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if *triggered {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            triggered = self
                .signal
                .wait_timeout(triggered, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Sleeps for `timeout` or until shutdown. Returns true on shutdown.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }
}

/// Lifecycle state of a simulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    /// Building the session and connecting.
    Starting,
    /// Born and publishing data.
    Running,
    /// The broker connection is down; the device keeps ticking.
    Reconnecting,
    /// The device thread has finished.
    Stopped,
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeviceState::Starting => "starting",
            DeviceState::Running => "running",
            DeviceState::Reconnecting => "reconnecting",
            DeviceState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Latest known status of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    /// Device identifier.
    pub device_id: String,
    /// Lifecycle state.
    pub state: DeviceState,
    /// Sequence number of the last message produced.
    pub last_seq: Option<u8>,
    /// Messages accepted by the transport, births included.
    pub published: u64,
    /// Failed connection attempts and publishes.
    pub failures: u64,
    /// Error that stopped the device, if any.
    pub last_error: Option<String>,
}

impl DeviceReport {
    fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            state: DeviceState::Starting,
            last_seq: None,
            published: 0,
            failures: 0,
            last_error: None,
        }
    }
}

type StatusBoard = Arc<Mutex<BTreeMap<String, DeviceReport>>>;

/// Runs many device sessions concurrently.
///
/// # Example
///
/// ```no_run
/// use sparkplug_sim::{MqttConnector, Orchestrator, SimulatorConfig};
///
/// let config = SimulatorConfig::water_level_demo();
/// let mut orchestrator = Orchestrator::from_config(&config, MqttConnector::new());
/// orchestrator.start(config.devices.clone())?;
///
/// std::thread::sleep(std::time::Duration::from_secs(30));
/// for report in orchestrator.stop() {
///     println!("{}: {} messages", report.device_id, report.published);
/// }
/// # Ok::<(), sparkplug_sim::Error>(())
/// ```
pub struct Orchestrator {
    broker: BrokerConfig,
    encoder: Encoder,
    run: RunLimit,
    connector: Arc<dyn Connector>,
    shutdown: Arc<Shutdown>,
    workers: Vec<(String, JoinHandle<()>)>,
    reports: StatusBoard,
}

impl Orchestrator {
    /// Creates an idle orchestrator. Devices run until stopped.
    pub fn new(broker: BrokerConfig, encoding: Encoding, connector: impl Connector + 'static) -> Self {
        Self {
            broker,
            encoder: Encoder::new(encoding),
            run: RunLimit::unbounded(),
            connector: Arc::new(connector),
            shutdown: Arc::new(Shutdown::new()),
            workers: Vec::new(),
            reports: StatusBoard::default(),
        }
    }

    /// Creates an orchestrator with the broker, encoding and run limit of `config`.
    pub fn from_config(config: &SimulatorConfig, connector: impl Connector + 'static) -> Self {
        Self::new(config.broker.clone(), config.encoding, connector).with_run_limit(config.run)
    }

    /// Limits how long each device runs.
    pub fn with_run_limit(mut self, run: RunLimit) -> Self {
        self.run = run;
        self
    }

    /// Returns the shutdown signal, e.g. for a Ctrl-C handler.
    pub fn shutdown_handle(&self) -> Arc<Shutdown> {
        Arc::clone(&self.shutdown)
    }

    /// Returns true while device threads are outstanding.
    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Spawns one thread per device.
    ///
    /// Device-level problems (invalid catalogue, unreachable broker) do not
    /// fail this call; they show up as a `Stopped` report for that device.
    pub fn start(&mut self, devices: Vec<DeviceConfig>) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }

        for config in devices {
            let device_id = config.device_id.clone();
            self.board()
                .insert(device_id.clone(), DeviceReport::new(device_id.clone()));

            let worker = DeviceWorker {
                report: DeviceReport::new(device_id.clone()),
                config,
                broker: self.broker.clone(),
                encoder: self.encoder,
                run: self.run,
                connector: Arc::clone(&self.connector),
                shutdown: Arc::clone(&self.shutdown),
                status: Arc::clone(&self.reports),
            };
            let handle = thread::Builder::new()
                .name(device_id.clone())
                .spawn(move || worker.run())?;
            self.workers.push((device_id, handle));
        }

        info!("Started {} device(s)", self.workers.len());
        Ok(())
    }

    /// Signals shutdown, waits for every device to finish its in-flight
    /// publish and returns the final reports.
    pub fn stop(&mut self) -> Vec<DeviceReport> {
        info!("Stopping {} device(s)", self.workers.len());
        self.shutdown.trigger();
        self.wait()
    }

    /// Waits for every device to finish on its own (run limit reached or
    /// shutdown triggered elsewhere) and returns the final reports.
    pub fn wait(&mut self) -> Vec<DeviceReport> {
        for (device_id, handle) in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("Device '{}' thread panicked", device_id);
                let mut board = self.reports.lock().unwrap_or_else(PoisonError::into_inner);
                let report = board
                    .entry(device_id.clone())
                    .or_insert_with(|| DeviceReport::new(device_id));
                report.state = DeviceState::Stopped;
                report.last_error = Some("device thread panicked".to_string());
            }
        }
        self.statuses()
    }

    /// Latest report of every device, ordered by device id.
    ///
    /// Safe to call while the devices run, e.g. for periodic health output.
    pub fn statuses(&self) -> Vec<DeviceReport> {
        self.board().values().cloned().collect()
    }

    /// Latest report of one device.
    pub fn status(&self, device_id: &str) -> Option<DeviceReport> {
        self.board().get(device_id).cloned()
    }

    /// Returns true once every started device has reached `Stopped`.
    pub fn all_stopped(&self) -> bool {
        self.board()
            .values()
            .all(|report| report.state == DeviceState::Stopped)
    }

    fn board(&self) -> MutexGuard<'_, BTreeMap<String, DeviceReport>> {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

/// Everything one device thread owns.
struct DeviceWorker {
    config: DeviceConfig,
    broker: BrokerConfig,
    encoder: Encoder,
    run: RunLimit,
    connector: Arc<dyn Connector>,
    shutdown: Arc<Shutdown>,
    status: StatusBoard,
    report: DeviceReport,
}

impl DeviceWorker {
    fn run(mut self) {
        match self.simulate() {
            Ok(()) => info!(
                "Device '{}' stopped after {} message(s)",
                self.config.device_id, self.report.published
            ),
            Err(e) => {
                error!("Device '{}' stopped: {}", self.config.device_id, e);
                self.report.last_error = Some(e.to_string());
            }
        }
        self.set_state(DeviceState::Stopped);
    }

    fn simulate(&mut self) -> Result<()> {
        self.config.validate()?;
        let registry = MetricRegistry::new(&self.config.metrics)?;
        let mut session = DeviceSession::new(
            self.config.device_id.clone(),
            registry,
            self.config.seed,
            self.config.phase,
        );

        let Some(mut transport) = self.connect()? else {
            return Ok(());
        };
        let result = self.publish_loop(&mut session, transport.as_mut());
        if let Err(e) = transport.close() {
            warn!("Device '{}': disconnect failed: {}", self.config.device_id, e);
        }
        result
    }

    /// Connects, retrying with backoff. `None` means shutdown came first.
    fn connect(&mut self) -> Result<Option<Box<dyn Transport>>> {
        let mut attempts: u32 = 0;
        loop {
            if self.shutdown.is_triggered() {
                return Ok(None);
            }
            match self.connector.connect(&self.broker, &self.config) {
                Ok(transport) => return Ok(Some(transport)),
                Err(e) => {
                    attempts += 1;
                    self.report.failures += 1;
                    warn!(
                        "Device '{}': connection attempt {} failed: {}",
                        self.config.device_id, attempts, e
                    );
                    if self
                        .broker
                        .max_reconnect_attempts
                        .is_some_and(|max| attempts >= max)
                    {
                        return Err(e);
                    }
                    self.set_state(DeviceState::Reconnecting);
                    if self.shutdown.wait_timeout(self.broker.reconnect_backoff()) {
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn publish_loop(&mut self, session: &mut DeviceSession, transport: &mut dyn Transport) -> Result<()> {
        let birth_topic = self.config.birth_topic();
        let data_topic = self.config.data_topic();
        let interval = self.config.publish_interval();
        let started = Instant::now();

        info!(
            "Device '{}' ({}) publishing {} metric(s) every {:?}",
            self.config.device_id,
            self.config.location.as_deref().unwrap_or("no location"),
            session.registry().len(),
            interval
        );

        let birth = session.birth()?;
        self.publish(transport, &birth, &birth_topic)?;
        self.set_state(DeviceState::Running);

        let mut ticks: u32 = 0;
        let mut data_messages: u64 = 0;
        loop {
            if self
                .run
                .max_data_messages
                .is_some_and(|max| data_messages >= max)
            {
                return Ok(());
            }

            ticks = next_tick(ticks, started, interval);
            let offset = interval.saturating_mul(ticks);
            if self.run.duration().is_some_and(|limit| offset > limit) {
                return Ok(());
            }
            if self.shutdown.wait_until(started + offset) {
                return Ok(());
            }

            while let Some(event) = transport.poll_link() {
                self.handle_link_event(event, session, transport, &birth_topic)?;
            }

            let data = session.data()?;
            let delivered = self.publish(transport, &data, &data_topic)?;
            data_messages += 1;
            if delivered {
                info!(
                    "Device '{}' NDATA seq={}: {}",
                    self.config.device_id,
                    data.seq(),
                    describe_values(session.registry(), &data)
                );
            }
            if !delivered && self.shutdown.wait_timeout(self.broker.reconnect_backoff()) {
                return Ok(());
            }
        }
    }

    fn handle_link_event(
        &mut self,
        event: LinkEvent,
        session: &mut DeviceSession,
        transport: &mut dyn Transport,
        birth_topic: &str,
    ) -> Result<()> {
        match event {
            LinkEvent::Connected => {}
            LinkEvent::Reconnected => {
                info!("Device '{}' reconnected", self.config.device_id);
                if self.config.rebirth_on_reconnect {
                    session.reset();
                    let birth = session.birth()?;
                    self.publish(transport, &birth, birth_topic)?;
                }
                self.set_state(DeviceState::Running);
            }
            LinkEvent::Lost(reason) => {
                warn!("Device '{}' lost connection: {}", self.config.device_id, reason);
                self.set_state(DeviceState::Reconnecting);
            }
            LinkEvent::Exhausted => {
                return Err(Error::ConnectionFailed(format!(
                    "gave up reconnecting to {}:{}",
                    self.broker.host, self.broker.port
                )));
            }
        }
        Ok(())
    }

    /// Encodes and publishes a payload. Returns whether the transport
    /// accepted it; only encoding errors are fatal.
    fn publish(&mut self, transport: &mut dyn Transport, payload: &Payload, topic: &str) -> Result<bool> {
        let message_type = payload.kind().message_type();
        let bytes = self.encoder.encode(payload)?;
        self.report.last_seq = Some(payload.seq());

        let delivered = match transport.publish(message_type, topic, &bytes) {
            Ok(()) => {
                self.report.published += 1;
                debug!(
                    "Device '{}' published {} seq={} to {}",
                    self.config.device_id,
                    message_type,
                    payload.seq(),
                    topic
                );
                true
            }
            Err(e) => {
                self.report.failures += 1;
                warn!("Device '{}': {}", self.config.device_id, e);
                false
            }
        };
        self.send_status();
        Ok(delivered)
    }

    fn set_state(&mut self, state: DeviceState) {
        self.report.state = state;
        self.send_status();
    }

    fn send_status(&self) {
        let mut board = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        match board.get_mut(&self.report.device_id) {
            Some(entry) => entry.clone_from(&self.report),
            None => {
                board.insert(self.report.device_id.clone(), self.report.clone());
            }
        }
    }
}

/// Renders the values of a payload as `Name=value` pairs for logging.
fn describe_values(registry: &MetricRegistry, payload: &Payload) -> String {
    let mut out = String::new();
    for (alias, value) in payload.values() {
        if !out.is_empty() {
            out.push(' ');
        }
        match registry.by_alias(alias) {
            Some(metric) => out.push_str(&metric.name),
            None => {
                let _ = write!(out, "#{}", alias);
            }
        }
        let _ = match value {
            MetricValue::Float(v) => write!(out, "={:.2}", v),
            MetricValue::Double(v) => write!(out, "={:.2}", v),
            MetricValue::Boolean(v) => write!(out, "={}", v),
            other => write!(out, "={}", other.as_f64()),
        };
    }
    out
}

/// Advances the tick counter, skipping deadlines that have already passed so
/// a stalled device resumes on schedule instead of bursting.
fn next_tick(ticks: u32, started: Instant, interval: Duration) -> u32 {
    let next = ticks.saturating_add(1);
    let elapsed = started.elapsed();
    if interval.saturating_mul(next) >= elapsed || interval.is_zero() {
        return next;
    }
    let behind = (elapsed.as_nanos() / interval.as_nanos()).min(u32::MAX as u128) as u32;
    behind.saturating_add(1).max(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_wakes_waiter() {
        let shutdown = Arc::new(Shutdown::new());
        let waiter = Arc::clone(&shutdown);
        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(30)));

        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        shutdown.trigger();
        assert!(handle.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_wait_times_out_without_trigger() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.wait_timeout(Duration::from_millis(5)));
        assert!(!shutdown.is_triggered());
    }

    #[test]
    fn test_describe_values_names_every_metric() {
        let catalogue = crate::config::water_level_catalogue(150.0, 0.0, 60.0);
        let registry = MetricRegistry::new(&catalogue).unwrap();
        let mut session = DeviceSession::new("d1", registry, Some(1), 0.0);
        session.birth().unwrap();
        let data = session.data().unwrap();

        let line = describe_values(session.registry(), &data);
        let names: Vec<&str> = line
            .split(' ')
            .map(|pair| pair.split('=').next().unwrap())
            .collect();
        assert_eq!(names, vec!["WaterLevel", "BatteryVoltage", "SignalStrength"]);
        // Floats keep two decimals, integers none
        let level = line.split(' ').next().unwrap();
        assert_eq!(level.split('.').nth(1).map(str::len), Some(2));
        assert!(!line.split(' ').nth(2).unwrap().contains('.'));
    }

    #[test]
    fn test_next_tick_on_schedule() {
        let started = Instant::now();
        assert_eq!(next_tick(0, started, Duration::from_secs(10)), 1);
        assert_eq!(next_tick(1, started, Duration::from_secs(10)), 2);
    }

    #[test]
    fn test_next_tick_skips_missed_deadlines() {
        let started = Instant::now() - Duration::from_millis(55);
        assert_eq!(next_tick(1, started, Duration::from_millis(10)), 6);
    }
}
