//! # Modem Controller
//!
//! Owns the per-modem state and exposes the lifecycle entry points the
//! framework calls:
//!
//! ```text
//!   probe ──▶ Created ──enable──▶ Enabling ──powered──▶ Enabled
//!                ▲                   │                     │
//!                └──── Disabled ◀── Disabling ◀──disable───┘
//!
//!   remove (any state) ──▶ Removed
//! ```
//!
//! Enabling opens the transport and queries card status. A present card
//! starts the power-on sequencer; a successful power-on is reported to the
//! framework once, after which the framework drives the phase checkpoints.
//!
//! The controller does no I/O scheduling of its own. Completions and retry
//! timer firings are fed in by the control loop, and everything the loop
//! must act on comes back out through [`ModemController::drain_events`].
//! Both inputs carry the enable cycle they belong to; anything from an
//! earlier cycle is dropped.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ril_proto::{RequestType, RilErrno};
use serde::Serialize;

use crate::config::ModemConfig;
use crate::dispatch::{Phase, PhaseDispatcher, PhaseReport};
use crate::error::ModemError;
use crate::power::{PowerOnSequencer, PowerOutcome, PowerState};
use crate::sim::{ProbeOutcome, SimStatusProber};
use crate::subsystem::{DriverContext, DriverRegistry, DriverSet, SubsystemKind};
use crate::transport::{
    format_request, Completion, CompletionSink, PendingRequests, TransportConnector,
    TransportHandle,
};

// ─── Types ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    Created,
    Enabling,
    Enabled,
    Disabling,
    Disabled,
    Removed,
}

/// Successful return of [`ModemController::enable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableStatus {
    /// Bring-up continues asynchronously; `Powered` follows on success.
    InProgress,
    AlreadyEnabled,
}

/// Things the control loop and the framework need to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModemEvent {
    SimStatusRequested,
    CardPresent,
    CardAbsent,
    SimStatusFailed,
    PowerOnRequested { attempt: u32 },
    /// Arm a one-shot timer; on expiry call `on_retry_timer(cycle)`.
    RetryScheduled {
        retries: u32,
        delay: Duration,
        cycle: u64,
    },
    Powered,
    /// Terminal for this enable cycle.
    PowerOnFailed { retries: u32 },
}

/// Properties the framework attaches to a modem before probing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModemProperties {
    pub interface: Option<String>,
    pub address: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    SimStatus,
    PowerOn,
}

/// Per-modem state. Mutated only from the control loop.
struct ModemState {
    interface: String,
    address: u32,
    transport: Option<TransportHandle>,
    cycle: u64,
    pending: PendingRequests<PendingKind>,
    prober: SimStatusProber,
    power: PowerOnSequencer,
    has_sim: bool,
    online: bool,
    reported: bool,
}

/// Serializable snapshot of a modem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModemStatus {
    pub name: String,
    pub interface: String,
    pub address: u32,
    pub lifecycle: LifecycleState,
    pub cycle: u64,
    pub has_sim: bool,
    pub powered: bool,
    pub online: bool,
    pub power_state: PowerState,
    pub power_on_retries: u32,
    pub drivers: Vec<SubsystemKind>,
}

// ─── Controller ─────────────────────────────────────────────────────────────

pub struct ModemController {
    lifecycle: LifecycleState,
    state: ModemState,
    config: ModemConfig,
    registry: Arc<DriverRegistry>,
    connector: Box<dyn TransportConnector>,
    sink: CompletionSink,
    drivers: DriverSet,
    events: Vec<ModemEvent>,
}

impl ModemController {
    /// Create per-modem state. Fails if the interface name is missing.
    pub fn probe(
        props: &ModemProperties,
        config: ModemConfig,
        registry: Arc<DriverRegistry>,
        connector: Box<dyn TransportConnector>,
        sink: CompletionSink,
    ) -> Result<Self, ModemError> {
        let interface = props
            .interface
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                tracing::debug!(modem = %sink.modem(), "no interface name");
                ModemError::MissingInterface
            })?
            .to_string();

        tracing::debug!(
            modem = %sink.modem(),
            interface = %interface,
            address = props.address,
            "modem probed"
        );

        Ok(ModemController {
            lifecycle: LifecycleState::Created,
            state: ModemState {
                interface,
                address: props.address,
                transport: None,
                cycle: 0,
                pending: PendingRequests::new(),
                prober: SimStatusProber::new(),
                power: PowerOnSequencer::from_config(&config),
                has_sim: false,
                online: false,
                reported: false,
            },
            config,
            registry,
            connector,
            sink,
            drivers: DriverSet::new(),
            events: Vec::new(),
        })
    }

    // ── Lifecycle entry points ──────────────────────────────────────────

    /// Open the transport and start the card probe.
    ///
    /// Returns `InProgress` immediately; completion is reported later as
    /// [`ModemEvent::Powered`]. A transport that cannot be created aborts the
    /// attempt with [`ModemError::Io`] before anything is sent.
    pub fn enable(&mut self) -> Result<EnableStatus, ModemError> {
        match self.lifecycle {
            LifecycleState::Removed => return Err(ModemError::Removed),
            LifecycleState::Enabling => return Ok(EnableStatus::InProgress),
            LifecycleState::Enabled => return Ok(EnableStatus::AlreadyEnabled),
            LifecycleState::Created | LifecycleState::Disabling | LifecycleState::Disabled => {}
        }

        tracing::debug!(modem = %self.name(), interface = %self.state.interface, "enabling");

        let cycle = self.state.cycle + 1;
        let transport = self
            .connector
            .connect(&self.state.interface, self.sink.for_cycle(cycle))
            .inspect_err(|e| {
                tracing::error!(modem = %self.sink.modem(), error = %e, "failed to create radio transport");
            })?;

        if self.config.debug {
            tracing::debug!(modem = %self.name(), "protocol tracing enabled");
            transport.set_debug(Some(self.config.debug_prefix.clone()));
        }

        let st = &mut self.state;
        st.cycle = cycle;
        st.transport = Some(transport);
        st.pending.clear();
        st.prober.reset();
        st.power.reset();
        st.has_sim = false;
        st.online = false;
        st.reported = false;
        self.lifecycle = LifecycleState::Enabling;

        self.query_sim_status();
        Ok(EnableStatus::InProgress)
    }

    /// Release the transport and drivers. In-flight requests and a pending
    /// retry timer are not cancelled; they become stale and are dropped when
    /// they come back.
    pub fn disable(&mut self) -> Result<(), ModemError> {
        match self.lifecycle {
            LifecycleState::Removed => return Err(ModemError::Removed),
            LifecycleState::Created | LifecycleState::Disabled => return Ok(()),
            _ => {}
        }

        self.lifecycle = LifecycleState::Disabling;
        self.release();
        self.state.cycle += 1;
        self.lifecycle = LifecycleState::Disabled;
        tracing::info!(modem = %self.name(), "modem disabled");
        Ok(())
    }

    /// Free everything. Further lifecycle calls fail with `Removed`.
    pub fn remove(&mut self) {
        if self.lifecycle == LifecycleState::Removed {
            return;
        }
        tracing::debug!(modem = %self.name(), interface = %self.state.interface, "removing modem");
        self.release();
        self.state.has_sim = false;
        self.events.clear();
        self.lifecycle = LifecycleState::Removed;
    }

    pub fn pre_sim(&mut self) -> Option<PhaseReport> {
        self.run_phase(Phase::PreSim)
    }

    pub fn post_sim(&mut self) -> Option<PhaseReport> {
        self.run_phase(Phase::PostSim)
    }

    pub fn post_online(&mut self) -> Option<PhaseReport> {
        self.run_phase(Phase::PostOnline)
    }

    pub fn run_phase(&mut self, phase: Phase) -> Option<PhaseReport> {
        if self.lifecycle == LifecycleState::Removed {
            return None;
        }
        let Some(transport) = self.state.transport.clone() else {
            tracing::warn!(modem = %self.name(), phase = phase.as_str(), "phase checkpoint without transport");
            return None;
        };

        let ctx = DriverContext {
            modem: self.sink.modem(),
            variant: self.config.variant,
            driver: &self.config.driver,
            transport: &transport,
        };
        let report =
            PhaseDispatcher::new(&self.registry, ctx).run(phase, &mut self.drivers, self.state.has_sim);

        if phase == Phase::PostOnline {
            self.state.online = true;
        }

        tracing::info!(
            modem = %self.sink.modem(),
            phase = phase.as_str(),
            created = report.created.len(),
            missing = report.missing.len(),
            "phase checkpoint done"
        );
        Some(report)
    }

    // ── Asynchronous inputs ─────────────────────────────────────────────

    /// Feed a transport completion.
    pub fn on_completion(&mut self, completion: Completion) {
        if completion.cycle != self.state.cycle
            || !matches!(
                self.lifecycle,
                LifecycleState::Enabling | LifecycleState::Enabled
            )
        {
            tracing::trace!(
                modem = %self.name(),
                id = %completion.id,
                cycle = completion.cycle,
                "stale completion dropped"
            );
            return;
        }

        match self.state.pending.take(completion.id) {
            Some(PendingKind::SimStatus) => {
                self.handle_sim_status(completion.errno, completion.payload)
            }
            Some(PendingKind::PowerOn) => self.handle_power_response(completion.errno),
            None => {
                if !self.drivers.dispatch_completion(&completion) {
                    tracing::trace!(modem = %self.name(), id = %completion.id, "unclaimed completion");
                }
            }
        }
    }

    /// A retry timer armed by [`ModemEvent::RetryScheduled`] fired.
    pub fn on_retry_timer(&mut self, cycle: u64) {
        if self.lifecycle != LifecycleState::Enabling
            || cycle != self.state.cycle
            || !self.state.power.retry_due()
        {
            tracing::debug!(modem = %self.name(), cycle, "stale retry timer ignored");
            return;
        }
        self.attempt_power_on();
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, ModemEvent> {
        self.events.drain(..)
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        self.sink.modem()
    }

    pub fn interface(&self) -> &str {
        &self.state.interface
    }

    pub fn address(&self) -> u32 {
        self.state.address
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    pub fn cycle(&self) -> u64 {
        self.state.cycle
    }

    pub fn has_transport(&self) -> bool {
        self.state.transport.is_some()
    }

    pub fn has_sim(&self) -> bool {
        self.state.has_sim
    }

    pub fn is_online(&self) -> bool {
        self.state.online
    }

    pub fn has_reported_powered(&self) -> bool {
        self.state.reported
    }

    pub fn power_state(&self) -> PowerState {
        self.state.power.state()
    }

    pub fn power_on_retries(&self) -> u32 {
        self.state.power.retries()
    }

    pub fn pending_requests(&self) -> usize {
        self.state.pending.len()
    }

    pub fn drivers(&self) -> &DriverSet {
        &self.drivers
    }

    pub fn status(&self) -> ModemStatus {
        ModemStatus {
            name: self.name().to_string(),
            interface: self.state.interface.clone(),
            address: self.state.address,
            lifecycle: self.lifecycle,
            cycle: self.state.cycle,
            has_sim: self.state.has_sim,
            powered: self.state.reported,
            online: self.state.online,
            power_state: self.state.power.state(),
            power_on_retries: self.state.power.retries(),
            drivers: self.drivers.kinds(),
        }
    }

    // ─── Internal ───────────────────────────────────────────────────────

    fn release(&mut self) {
        self.drivers.clear();
        self.state.pending.clear();
        if let Some(transport) = self.state.transport.take() {
            transport.set_debug(None);
        }
        self.state.online = false;
    }

    fn query_sim_status(&mut self) {
        if !self.state.prober.begin() {
            return;
        }
        let Some(transport) = self.state.transport.as_ref() else {
            return;
        };

        match transport.send(RequestType::GetSimStatus, Bytes::new()) {
            Ok(id) => {
                tracing::debug!(modem = %self.sink.modem(), "{}", format_request(id, RequestType::GetSimStatus));
                self.state.pending.insert(id, PendingKind::SimStatus);
                self.events.push(ModemEvent::SimStatusRequested);
            }
            Err(e) => {
                tracing::warn!(modem = %self.sink.modem(), error = %e, "card status query not sent");
                let outcome = self.state.prober.on_send_failed();
                self.apply_probe_outcome(outcome);
            }
        }
    }

    fn handle_sim_status(&mut self, errno: RilErrno, payload: Bytes) {
        let outcome = self.state.prober.on_response(errno, payload);
        self.apply_probe_outcome(outcome);
    }

    fn apply_probe_outcome(&mut self, outcome: ProbeOutcome) {
        match outcome {
            ProbeOutcome::CardPresent(status) => {
                tracing::debug!(
                    modem = %self.name(),
                    pin = ?status.universal_pin_state,
                    apps = status.apps.len(),
                    "card present, powering on radio"
                );
                self.state.has_sim = true;
                self.events.push(ModemEvent::CardPresent);
                self.attempt_power_on();
            }
            ProbeOutcome::CardAbsent(card_state) => {
                tracing::info!(modem = %self.name(), ?card_state, "no card present");
                self.events.push(ModemEvent::CardAbsent);
            }
            ProbeOutcome::QueryFailed(errno) => {
                tracing::warn!(modem = %self.name(), %errno, "card status query failed");
                self.events.push(ModemEvent::SimStatusFailed);
            }
            ProbeOutcome::Malformed(e) => {
                tracing::warn!(modem = %self.name(), error = %e, "malformed card status");
                self.events.push(ModemEvent::SimStatusFailed);
            }
            ProbeOutcome::Ignored => {}
        }
    }

    fn attempt_power_on(&mut self) {
        let Some(transport) = self.state.transport.clone() else {
            return;
        };
        let Some(payload) = self.state.power.begin_attempt() else {
            return;
        };
        let attempt = self.state.power.attempts();

        match transport.send(RequestType::RadioPower, payload) {
            Ok(id) => {
                tracing::debug!(modem = %self.name(), attempt, "{}", format_request(id, RequestType::RadioPower));
                self.state.pending.insert(id, PendingKind::PowerOn);
                self.events.push(ModemEvent::PowerOnRequested { attempt });
            }
            Err(e) => {
                tracing::warn!(modem = %self.name(), error = %e, attempt, "radio power request not sent");
                self.handle_power_response(RilErrno::RadioNotAvailable);
            }
        }
    }

    fn handle_power_response(&mut self, errno: RilErrno) {
        match self.state.power.on_response(errno) {
            PowerOutcome::Powered => {
                if self.state.reported {
                    return;
                }
                tracing::info!(modem = %self.name(), attempts = self.state.power.attempts(), "radio powered on");
                self.state.reported = true;
                self.lifecycle = LifecycleState::Enabled;
                self.events.push(ModemEvent::Powered);
            }
            PowerOutcome::Retry { retries, delay } => {
                tracing::warn!(modem = %self.name(), %errno, retries, "radio power on request failed");
                self.events.push(ModemEvent::RetryScheduled {
                    retries,
                    delay,
                    cycle: self.state.cycle,
                });
            }
            PowerOutcome::Exhausted { retries } => {
                tracing::warn!(modem = %self.name(), %errno, retries, "radio power on request failed");
                tracing::error!(modem = %self.name(), "max retries for radio power on exceeded");
                self.events.push(ModemEvent::PowerOnFailed { retries });
            }
            PowerOutcome::Ignored => {
                tracing::trace!(modem = %self.name(), %errno, "power response without request");
            }
        }
    }
}

impl std::fmt::Debug for ModemController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModemController")
            .field("name", &self.name())
            .field("lifecycle", &self.lifecycle)
            .field("interface", &self.state.interface)
            .field("cycle", &self.state.cycle)
            .field("has_transport", &self.state.transport.is_some())
            .field("has_sim", &self.state.has_sim)
            .field("power", &self.state.power)
            .field("drivers", &self.drivers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use ril_proto::{CardState, CardStatus, RadioPowerRequest};
    use tokio::sync::mpsc;

    use super::*;
    use crate::error::TransportError;
    use crate::subsystem::SubsystemDriver;
    use crate::transport::{RadioTransport, RequestId};

    // ─── Test transport ─────────────────────────────────────────────────

    #[derive(Default)]
    struct WireState {
        sent: Vec<(RequestId, RequestType, Bytes)>,
        next: u32,
        closed: bool,
        debug: Option<String>,
        connects: u32,
    }

    #[derive(Default, Clone)]
    struct Wire(Arc<Mutex<WireState>>);

    impl Wire {
        fn sent(&self) -> Vec<(RequestId, RequestType, Bytes)> {
            self.0.lock().unwrap().sent.clone()
        }
        fn count(&self, request: RequestType) -> usize {
            self.sent().iter().filter(|(_, r, _)| *r == request).count()
        }
        fn last(&self) -> (RequestId, RequestType, Bytes) {
            self.sent().last().cloned().expect("no request sent")
        }
        fn close(&self) {
            self.0.lock().unwrap().closed = true;
        }
        fn debug(&self) -> Option<String> {
            self.0.lock().unwrap().debug.clone()
        }
        fn connects(&self) -> u32 {
            self.0.lock().unwrap().connects
        }
    }

    struct WireTransport(Wire);

    impl RadioTransport for WireTransport {
        fn send(&self, request: RequestType, payload: Bytes) -> Result<RequestId, TransportError> {
            let mut w = (self.0).0.lock().unwrap();
            if w.closed {
                return Err(TransportError::Closed);
            }
            w.next += 1;
            let id = RequestId(w.next);
            w.sent.push((id, request, payload));
            Ok(id)
        }
        fn set_debug(&self, prefix: Option<String>) {
            (self.0).0.lock().unwrap().debug = prefix;
        }
    }

    struct WireConnector {
        wire: Wire,
        fail: bool,
    }

    impl TransportConnector for WireConnector {
        fn connect(&self, _interface: &str, _sink: CompletionSink) -> std::io::Result<TransportHandle> {
            if self.fail {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "radio socket unavailable",
                ));
            }
            self.wire.0.lock().unwrap().connects += 1;
            Ok(Arc::new(WireTransport(self.wire.clone())))
        }
    }

    // ─── Test drivers ───────────────────────────────────────────────────

    struct SimDriver(Arc<AtomicBool>);

    impl SubsystemDriver for SimDriver {
        fn kind(&self) -> SubsystemKind {
            SubsystemKind::Sim
        }
        fn card_inserted(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    struct Generic(SubsystemKind);

    impl SubsystemDriver for Generic {
        fn kind(&self) -> SubsystemKind {
            self.0
        }
    }

    fn registry(card_flag: Arc<AtomicBool>) -> DriverRegistry {
        let mut reg = DriverRegistry::new();
        reg.register(SubsystemKind::Sim, move |_| {
            Some(Box::new(SimDriver(card_flag.clone())) as Box<dyn SubsystemDriver>)
        });
        for kind in SubsystemKind::ALL.into_iter().skip(1) {
            reg.register(kind, move |_| {
                Some(Box::new(Generic(kind)) as Box<dyn SubsystemDriver>)
            });
        }
        reg
    }

    // ─── Helpers ────────────────────────────────────────────────────────

    struct Harness {
        modem: ModemController,
        wire: Wire,
        card_flag: Arc<AtomicBool>,
    }

    fn harness_with(config: ModemConfig, fail_connect: bool) -> Harness {
        let wire = Wire::default();
        let card_flag = Arc::new(AtomicBool::new(false));
        let (tx, _rx) = mpsc::unbounded_channel();
        let modem = ModemController::probe(
            &ModemProperties {
                interface: Some("ttys".into()),
                address: 0,
            },
            config,
            Arc::new(registry(card_flag.clone())),
            Box::new(WireConnector {
                wire: wire.clone(),
                fail: fail_connect,
            }),
            CompletionSink::new("ril0", tx),
        )
        .unwrap();
        Harness {
            modem,
            wire,
            card_flag,
        }
    }

    fn harness() -> Harness {
        harness_with(ModemConfig::default(), false)
    }

    impl Harness {
        fn complete(&mut self, id: RequestId, errno: RilErrno, payload: Bytes) {
            let cycle = self.modem.cycle();
            self.modem.on_completion(Completion {
                id,
                cycle,
                errno,
                payload,
            });
        }

        fn answer_last(&mut self, errno: RilErrno, payload: Bytes) {
            let (id, _, _) = self.wire.last();
            self.complete(id, errno, payload);
        }

        fn events(&mut self) -> Vec<ModemEvent> {
            self.modem.drain_events().collect()
        }

        /// Enable and answer the card query with a present card.
        fn enable_with_card(&mut self) {
            assert_eq!(self.modem.enable().unwrap(), EnableStatus::InProgress);
            self.answer_last(RilErrno::Success, card(CardState::Present));
        }
    }

    fn card(state: CardState) -> Bytes {
        CardStatus::with_state(state).encode()
    }

    // ─── Probe ──────────────────────────────────────────────────────────

    #[test]
    fn probe_requires_interface() {
        for iface in [None, Some(String::new()), Some("  ".to_string())] {
            let (tx, _rx) = mpsc::unbounded_channel();
            let err = ModemController::probe(
                &ModemProperties {
                    interface: iface,
                    address: 0,
                },
                ModemConfig::default(),
                Arc::new(DriverRegistry::new()),
                Box::new(WireConnector {
                    wire: Wire::default(),
                    fail: false,
                }),
                CompletionSink::new("ril0", tx),
            )
            .unwrap_err();
            assert!(matches!(err, ModemError::MissingInterface));
        }
    }

    #[test]
    fn probed_modem_has_no_transport() {
        let h = harness();
        assert_eq!(h.modem.lifecycle(), LifecycleState::Created);
        assert!(!h.modem.has_transport());
        assert_eq!(h.modem.interface(), "ttys");
        assert_eq!(h.wire.connects(), 0);
    }

    // ─── Enable ─────────────────────────────────────────────────────────

    #[test]
    fn enable_opens_transport_and_queries_card() {
        let mut h = harness();
        assert_eq!(h.modem.enable().unwrap(), EnableStatus::InProgress);
        assert!(h.modem.has_transport());
        assert_eq!(h.modem.lifecycle(), LifecycleState::Enabling);
        assert_eq!(h.wire.count(RequestType::GetSimStatus), 1);
        assert!(h.wire.last().2.is_empty(), "status query has no payload");
        assert_eq!(h.events(), vec![ModemEvent::SimStatusRequested]);
        assert_eq!(h.modem.power_on_retries(), 0);
    }

    #[test]
    fn enable_is_idempotent_while_in_progress() {
        let mut h = harness();
        h.modem.enable().unwrap();
        assert_eq!(h.modem.enable().unwrap(), EnableStatus::InProgress);
        assert_eq!(h.wire.count(RequestType::GetSimStatus), 1);
        assert_eq!(h.wire.connects(), 1);
    }

    #[test]
    fn transport_failure_is_io_error() {
        let mut h = harness_with(ModemConfig::default(), true);
        let err = h.modem.enable().unwrap_err();
        assert!(matches!(err, ModemError::Io(_)));
        assert!(!h.modem.has_transport());
        assert_eq!(h.modem.lifecycle(), LifecycleState::Created);
        assert!(h.wire.sent().is_empty());
        assert!(h.events().is_empty());
    }

    #[test]
    fn debug_flag_installs_trace_prefix() {
        let config = ModemConfig {
            debug: true,
            ..Default::default()
        };
        let mut h = harness_with(config, false);
        h.modem.enable().unwrap();
        assert_eq!(h.wire.debug().as_deref(), Some("Device: "));

        h.modem.disable().unwrap();
        assert_eq!(h.wire.debug(), None);
    }

    // ─── Card probe ─────────────────────────────────────────────────────

    #[test]
    fn present_card_starts_power_on() {
        let mut h = harness();
        h.enable_with_card();

        assert!(h.modem.has_sim());
        let (_, request, payload) = h.wire.last();
        assert_eq!(request, RequestType::RadioPower);
        let decoded = RadioPowerRequest::decode(payload).unwrap();
        assert_eq!((decoded.array_len, decoded.value), (1, 1));
        assert_eq!(
            h.events(),
            vec![
                ModemEvent::SimStatusRequested,
                ModemEvent::CardPresent,
                ModemEvent::PowerOnRequested { attempt: 1 }
            ]
        );
    }

    #[test]
    fn absent_card_never_powers_on() {
        let mut h = harness();
        h.modem.enable().unwrap();
        h.answer_last(RilErrno::Success, card(CardState::Absent));

        assert!(!h.modem.has_sim());
        assert_eq!(h.wire.count(RequestType::RadioPower), 0);
        assert!(h.events().contains(&ModemEvent::CardAbsent));
        assert_eq!(h.modem.lifecycle(), LifecycleState::Enabling);
    }

    #[test]
    fn failed_card_query_is_silent() {
        let mut h = harness();
        h.modem.enable().unwrap();
        h.answer_last(RilErrno::GenericFailure, Bytes::new());

        assert_eq!(h.wire.count(RequestType::RadioPower), 0);
        assert_eq!(h.wire.count(RequestType::GetSimStatus), 1, "no re-query");
        assert!(h.events().contains(&ModemEvent::SimStatusFailed));
    }

    #[test]
    fn query_send_failure() {
        let mut h = harness();
        h.wire.close();
        h.modem.enable().unwrap();
        assert_eq!(h.events(), vec![ModemEvent::SimStatusFailed]);
        assert_eq!(h.modem.pending_requests(), 0);
        assert!(!h.modem.has_sim());
        assert_eq!(h.wire.count(RequestType::RadioPower), 0);
    }

    // ─── Power-on sequencing ────────────────────────────────────────────

    #[test]
    fn retries_are_bounded() {
        let mut h = harness();
        h.enable_with_card();
        h.events();

        let mut scheduled = 0;
        for _ in 0..4 {
            h.answer_last(RilErrno::RadioNotAvailable, Bytes::new());
            let events = h.events();
            let Some(ModemEvent::RetryScheduled { delay, cycle, .. }) = events.last().cloned() else {
                panic!("expected retry, got {events:?}");
            };
            assert_eq!(delay, Duration::from_secs(1));
            scheduled += 1;
            h.modem.on_retry_timer(cycle);
        }
        assert_eq!(scheduled, 4);
        assert_eq!(h.wire.count(RequestType::RadioPower), 5);

        h.answer_last(RilErrno::RadioNotAvailable, Bytes::new());
        assert_eq!(h.events(), vec![ModemEvent::PowerOnFailed { retries: 5 }]);
        assert_eq!(h.modem.power_state(), PowerState::Failed);
        assert_eq!(h.modem.power_on_retries(), 5);

        // A late timer does not revive the sequencer.
        let cycle = h.modem.cycle();
        h.modem.on_retry_timer(cycle);
        assert_eq!(h.wire.count(RequestType::RadioPower), 5);
        assert!(!h.modem.has_reported_powered());
    }

    #[test]
    fn powered_is_reported_once() {
        let mut h = harness();
        h.enable_with_card();
        let (id, _, _) = h.wire.last();
        h.complete(id, RilErrno::Success, Bytes::new());
        h.complete(id, RilErrno::Success, Bytes::new());

        let powered = h
            .events()
            .into_iter()
            .filter(|e| *e == ModemEvent::Powered)
            .count();
        assert_eq!(powered, 1);
        assert_eq!(h.modem.lifecycle(), LifecycleState::Enabled);
        assert!(h.modem.has_reported_powered());
        assert_eq!(h.modem.enable().unwrap(), EnableStatus::AlreadyEnabled);
    }

    #[test]
    fn send_failure_counts_as_failed_attempt() {
        let mut h = harness();
        h.modem.enable().unwrap();
        let (id, _, _) = h.wire.last();
        h.wire.close();
        h.complete(id, RilErrno::Success, card(CardState::Present));

        assert_eq!(h.modem.power_on_retries(), 1);
        assert!(matches!(
            h.events().last(),
            Some(ModemEvent::RetryScheduled { retries: 1, .. })
        ));
    }

    #[test]
    fn early_timer_is_ignored() {
        let mut h = harness();
        h.enable_with_card();
        let cycle = h.modem.cycle();
        // Power request still outstanding, no retry due.
        h.modem.on_retry_timer(cycle);
        assert_eq!(h.wire.count(RequestType::RadioPower), 1);
    }

    // ─── Disable / stale inputs ─────────────────────────────────────────

    #[test]
    fn disable_with_pending_retry_sends_nothing_more() {
        let mut h = harness();
        h.enable_with_card();
        h.answer_last(RilErrno::GenericFailure, Bytes::new());
        let Some(ModemEvent::RetryScheduled { cycle, .. }) = h.events().last().cloned() else {
            panic!("expected retry");
        };

        h.modem.disable().unwrap();
        assert!(!h.modem.has_transport());
        assert_eq!(h.modem.lifecycle(), LifecycleState::Disabled);

        h.modem.on_retry_timer(cycle);
        assert_eq!(h.wire.count(RequestType::RadioPower), 1);
    }

    #[test]
    fn completion_from_previous_cycle_is_dropped() {
        let mut h = harness();
        h.modem.enable().unwrap();
        let (old_id, _, _) = h.wire.last();
        let old_cycle = h.modem.cycle();
        h.modem.disable().unwrap();
        h.modem.enable().unwrap();
        h.events();

        h.modem.on_completion(Completion {
            id: old_id,
            cycle: old_cycle,
            errno: RilErrno::Success,
            payload: card(CardState::Present),
        });
        assert!(!h.modem.has_sim());
        assert_eq!(h.wire.count(RequestType::RadioPower), 0);
        assert!(h.events().is_empty());
    }

    #[test]
    fn reenable_resets_counters() {
        let mut h = harness();
        h.enable_with_card();
        h.answer_last(RilErrno::GenericFailure, Bytes::new());
        assert_eq!(h.modem.power_on_retries(), 1);

        h.modem.disable().unwrap();
        h.modem.enable().unwrap();
        assert_eq!(h.modem.power_on_retries(), 0);
        assert!(!h.modem.has_sim());
        assert_eq!(h.modem.power_state(), PowerState::Idle);
        assert_eq!(h.wire.count(RequestType::GetSimStatus), 2);
    }

    #[test]
    fn disable_is_idempotent() {
        let mut h = harness();
        h.modem.disable().unwrap();
        assert_eq!(h.modem.lifecycle(), LifecycleState::Created);
        h.modem.enable().unwrap();
        h.modem.disable().unwrap();
        h.modem.disable().unwrap();
        assert_eq!(h.modem.lifecycle(), LifecycleState::Disabled);
    }

    // ─── Phases ─────────────────────────────────────────────────────────

    #[test]
    fn phases_need_a_transport() {
        let mut h = harness();
        assert!(h.modem.pre_sim().is_none());
        assert!(h.modem.drivers().is_empty());
    }

    #[test]
    fn full_bring_up_instantiates_all_drivers() {
        let mut h = harness();
        h.enable_with_card();
        h.answer_last(RilErrno::Success, Bytes::new());

        let pre = h.modem.pre_sim().unwrap();
        assert!(pre.card_notified);
        assert!(h.card_flag.load(Ordering::SeqCst));

        let post = h.modem.post_sim().unwrap();
        assert!(post.context_linked);
        assert!(!h.modem.is_online());

        h.modem.post_online().unwrap();
        assert!(h.modem.is_online());
        assert_eq!(h.modem.drivers().len(), SubsystemKind::ALL.len());

        let status = h.modem.status();
        assert!(status.powered);
        assert_eq!(status.lifecycle, LifecycleState::Enabled);
        assert_eq!(status.drivers.len(), 12);
    }

    #[test]
    fn disable_drops_drivers() {
        let mut h = harness();
        h.enable_with_card();
        h.modem.pre_sim();
        assert!(!h.modem.drivers().is_empty());
        h.modem.disable().unwrap();
        assert!(h.modem.drivers().is_empty());
        assert!(!h.modem.is_online());
    }

    // ─── Remove ─────────────────────────────────────────────────────────

    #[test]
    fn removed_modem_rejects_lifecycle_calls() {
        let mut h = harness();
        h.enable_with_card();
        h.modem.remove();

        assert_eq!(h.modem.lifecycle(), LifecycleState::Removed);
        assert!(!h.modem.has_transport());
        assert!(matches!(h.modem.enable(), Err(ModemError::Removed)));
        assert!(matches!(h.modem.disable(), Err(ModemError::Removed)));
        assert!(h.modem.pre_sim().is_none());

        let sent = h.wire.sent().len();
        h.answer_last(RilErrno::Success, Bytes::new());
        h.modem.on_retry_timer(h.modem.cycle());
        assert_eq!(h.wire.sent().len(), sent);
        assert!(h.events().is_empty());
    }
}
