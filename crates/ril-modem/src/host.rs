//! # Modem Host
//!
//! The single control loop every modem runs on. Transport completions and
//! retry-timer firings from all modems arrive on one channel and are applied
//! to the owning [`ModemController`] one at a time, so controllers never see
//! concurrent mutation.
//!
//! Retry timers are detached one-shot tokio tasks. They are never cancelled:
//! a timer that outlives its enable cycle, or its modem, is dropped when it
//! fires.
//!
//! Must be driven from inside a tokio runtime.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::ModemConfig;
use crate::dispatch::{Phase, PhaseReport};
use crate::error::ModemError;
use crate::modem::{EnableStatus, ModemController, ModemEvent, ModemProperties, ModemStatus};
use crate::subsystem::DriverRegistry;
use crate::transport::{Completion, CompletionSink, TransportConnector};

/// Input to the control loop.
#[derive(Debug)]
pub enum HostEvent {
    Completion {
        modem: Arc<str>,
        completion: Completion,
    },
    RetryTimer {
        modem: Arc<str>,
        cycle: u64,
    },
}

/// A [`ModemEvent`] tagged with the modem it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModemNotice {
    pub modem: String,
    pub event: ModemEvent,
}

pub struct ModemHost {
    modems: HashMap<Arc<str>, ModemController>,
    registry: Arc<DriverRegistry>,
    events_tx: mpsc::UnboundedSender<HostEvent>,
    events_rx: mpsc::UnboundedReceiver<HostEvent>,
    ready: VecDeque<ModemNotice>,
}

impl ModemHost {
    pub fn new(registry: Arc<DriverRegistry>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        ModemHost {
            modems: HashMap::new(),
            registry,
            events_tx,
            events_rx,
            ready: VecDeque::new(),
        }
    }

    /// Create and probe a modem.
    pub fn create(
        &mut self,
        name: &str,
        props: &ModemProperties,
        config: ModemConfig,
        connector: Box<dyn TransportConnector>,
    ) -> Result<(), ModemError> {
        if self.modems.contains_key(name) {
            return Err(ModemError::DuplicateModem(name.to_string()));
        }
        let key: Arc<str> = Arc::from(name);
        let sink = CompletionSink::new(key.clone(), self.events_tx.clone());
        let controller =
            ModemController::probe(props, config, self.registry.clone(), connector, sink)?;
        self.modems.insert(key, controller);
        Ok(())
    }

    pub fn enable(&mut self, name: &str) -> Result<EnableStatus, ModemError> {
        let result = self.controller_mut(name)?.enable();
        self.collect(name);
        result
    }

    pub fn disable(&mut self, name: &str) -> Result<(), ModemError> {
        let result = self.controller_mut(name)?.disable();
        self.collect(name);
        result
    }

    /// Remove a modem. Anything still in flight for it is dropped on arrival.
    pub fn remove(&mut self, name: &str) -> Result<(), ModemError> {
        let mut controller = self
            .modems
            .remove(name)
            .ok_or_else(|| ModemError::UnknownModem(name.to_string()))?;
        controller.remove();
        self.ready.retain(|notice| notice.modem != name);
        tracing::info!(modem = %name, "modem removed");
        Ok(())
    }

    pub fn run_phase(&mut self, name: &str, phase: Phase) -> Result<Option<PhaseReport>, ModemError> {
        let report = self.controller_mut(name)?.run_phase(phase);
        self.collect(name);
        Ok(report)
    }

    pub fn pre_sim(&mut self, name: &str) -> Result<Option<PhaseReport>, ModemError> {
        self.run_phase(name, Phase::PreSim)
    }

    pub fn post_sim(&mut self, name: &str) -> Result<Option<PhaseReport>, ModemError> {
        self.run_phase(name, Phase::PostSim)
    }

    pub fn post_online(&mut self, name: &str) -> Result<Option<PhaseReport>, ModemError> {
        self.run_phase(name, Phase::PostOnline)
    }

    pub fn modem(&self, name: &str) -> Option<&ModemController> {
        self.modems.get(name)
    }

    pub fn status(&self, name: &str) -> Option<ModemStatus> {
        self.modems.get(name).map(ModemController::status)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modems.keys().map(|k| k.to_string()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.modems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modems.is_empty()
    }

    /// Wait for the next notice, processing completions and timers as they
    /// arrive. Never returns `None` while the host is alive; callers bound it
    /// with `select!` or a timeout.
    pub async fn next_notice(&mut self) -> Option<ModemNotice> {
        loop {
            if let Some(notice) = self.ready.pop_front() {
                return Some(notice);
            }
            let event = self.events_rx.recv().await?;
            self.handle(event);
        }
    }

    /// Apply every input already queued, without waiting. Returns how many
    /// were processed.
    pub fn poll_ready(&mut self) -> usize {
        let mut n = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle(event);
            n += 1;
        }
        n
    }

    /// Take notices produced so far without waiting.
    pub fn take_notices(&mut self) -> Vec<ModemNotice> {
        self.ready.drain(..).collect()
    }

    // ─── Internal ───────────────────────────────────────────────────────

    fn controller_mut(&mut self, name: &str) -> Result<&mut ModemController, ModemError> {
        self.modems
            .get_mut(name)
            .ok_or_else(|| ModemError::UnknownModem(name.to_string()))
    }

    fn handle(&mut self, event: HostEvent) {
        let modem = match event {
            HostEvent::Completion { modem, completion } => {
                match self.modems.get_mut(&*modem) {
                    Some(controller) => controller.on_completion(completion),
                    None => {
                        tracing::trace!(modem = %modem, id = %completion.id, "completion for unknown modem");
                        return;
                    }
                }
                modem
            }
            HostEvent::RetryTimer { modem, cycle } => {
                match self.modems.get_mut(&*modem) {
                    Some(controller) => controller.on_retry_timer(cycle),
                    None => {
                        tracing::debug!(modem = %modem, cycle, "retry timer for unknown modem");
                        return;
                    }
                }
                modem
            }
        };
        self.collect(&modem);
    }

    fn collect(&mut self, name: &str) {
        let Some(controller) = self.modems.get_mut(name) else {
            return;
        };
        let events: Vec<ModemEvent> = controller.drain_events().collect();
        for event in events {
            if let ModemEvent::RetryScheduled { delay, cycle, .. } = event {
                self.arm_retry_timer(name, delay, cycle);
            }
            self.ready.push_back(ModemNotice {
                modem: name.to_string(),
                event,
            });
        }
    }

    fn arm_retry_timer(&self, name: &str, delay: Duration, cycle: u64) {
        let tx = self.events_tx.clone();
        let modem: Arc<str> = Arc::from(name);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(HostEvent::RetryTimer { modem, cycle });
        });
    }
}

impl std::fmt::Debug for ModemHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModemHost")
            .field("modems", &self.names())
            .field("ready", &self.ready.len())
            .finish()
    }
}
