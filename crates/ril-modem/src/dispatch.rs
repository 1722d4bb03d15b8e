//! # Lifecycle Phase Dispatcher
//!
//! The framework walks each modem through three checkpoints, always in this
//! order:
//!
//! ```text
//!   PreSim     → sim, devinfo, voicecall          (+ card-inserted to sim)
//!   PostSim    → sms, gprs, gprs-context,         (+ context linked to gprs)
//!                radio-settings, phonebook
//!   PostOnline → call-volume, netreg, ussd, call-settings
//! ```
//!
//! Every checkpoint is idempotent: kinds already present this cycle are not
//! constructed again. A declined constructor only drops that one kind and
//! any wiring that depended on it.

use serde::Serialize;

use crate::subsystem::{DriverContext, DriverRegistry, DriverSet, SubsystemKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    PreSim,
    PostSim,
    PostOnline,
}

impl Phase {
    pub const ORDER: [Phase; 3] = [Phase::PreSim, Phase::PostSim, Phase::PostOnline];

    /// Subsystems instantiated at this checkpoint, in construction order.
    pub fn subsystems(self) -> &'static [SubsystemKind] {
        use SubsystemKind::*;
        match self {
            Phase::PreSim => &[Sim, Devinfo, Voicecall],
            Phase::PostSim => &[Sms, Gprs, GprsContext, RadioSettings, Phonebook],
            Phase::PostOnline => &[CallVolume, Netreg, Ussd, CallSettings],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::PreSim => "pre-sim",
            Phase::PostSim => "post-sim",
            Phase::PostOnline => "post-online",
        }
    }
}

/// What one checkpoint invocation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub created: Vec<SubsystemKind>,
    /// Constructors that declined or were not registered.
    pub missing: Vec<SubsystemKind>,
    /// Already present from an earlier invocation.
    pub existing: Vec<SubsystemKind>,
    pub card_notified: bool,
    pub context_linked: bool,
}

impl PhaseReport {
    fn new(phase: Phase) -> Self {
        PhaseReport {
            phase,
            created: Vec::new(),
            missing: Vec::new(),
            existing: Vec::new(),
            card_notified: false,
            context_linked: false,
        }
    }

    fn created(&self, kind: SubsystemKind) -> bool {
        self.created.contains(&kind)
    }
}

pub struct PhaseDispatcher<'a> {
    registry: &'a DriverRegistry,
    ctx: DriverContext<'a>,
}

impl<'a> PhaseDispatcher<'a> {
    pub fn new(registry: &'a DriverRegistry, ctx: DriverContext<'a>) -> Self {
        PhaseDispatcher { registry, ctx }
    }

    pub fn run(&self, phase: Phase, drivers: &mut DriverSet, has_sim: bool) -> PhaseReport {
        let mut report = PhaseReport::new(phase);

        for &kind in phase.subsystems() {
            if drivers.contains(kind) {
                report.existing.push(kind);
                continue;
            }
            match self.registry.create(kind, &self.ctx) {
                Some(driver) => {
                    tracing::debug!(modem = %self.ctx.modem, %kind, "subsystem created");
                    drivers.insert(driver);
                    report.created.push(kind);
                }
                None => {
                    tracing::debug!(modem = %self.ctx.modem, %kind, "subsystem unavailable");
                    report.missing.push(kind);
                }
            }
        }

        match phase {
            Phase::PreSim => {
                if has_sim && report.created(SubsystemKind::Sim) {
                    if let Some(sim) = drivers.get_mut(SubsystemKind::Sim) {
                        sim.card_inserted();
                        report.card_notified = true;
                    }
                }
            }
            Phase::PostSim => {
                if report.created(SubsystemKind::Gprs) && report.created(SubsystemKind::GprsContext)
                {
                    report.context_linked = self.link_context(drivers);
                }
            }
            Phase::PostOnline => {}
        }

        report
    }

    fn link_context(&self, drivers: &mut DriverSet) -> bool {
        let Some(context) = drivers.take(SubsystemKind::GprsContext) else {
            return false;
        };
        let Some(gprs) = drivers.get_mut(SubsystemKind::Gprs) else {
            drivers.insert(context);
            return false;
        };
        match gprs.add_context(context) {
            Ok(()) => {
                drivers.mark_linked(SubsystemKind::GprsContext);
                tracing::debug!(modem = %self.ctx.modem, "data context linked");
                true
            }
            Err(context) => {
                tracing::warn!(modem = %self.ctx.modem, "data session refused context");
                drivers.insert(context);
                false
            }
        }
    }
}
