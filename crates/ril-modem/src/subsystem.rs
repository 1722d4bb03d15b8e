//! # Subsystem Drivers
//!
//! Feature subsystems (SIM, voice call, SMS, data session, ...) are external
//! drivers. The modem core only constructs them through a [`DriverRegistry`]
//! and keeps the instances for the lifetime of an enable cycle.
//!
//! A constructor may decline (return `None`); callers treat that as a
//! missing capability, never as an error.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::transport::{Completion, TransportHandle};

// ─── Kinds ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubsystemKind {
    Sim,
    Devinfo,
    Voicecall,
    Sms,
    Gprs,
    GprsContext,
    RadioSettings,
    Phonebook,
    CallVolume,
    Netreg,
    Ussd,
    CallSettings,
}

impl SubsystemKind {
    pub const ALL: [SubsystemKind; 12] = [
        SubsystemKind::Sim,
        SubsystemKind::Devinfo,
        SubsystemKind::Voicecall,
        SubsystemKind::Sms,
        SubsystemKind::Gprs,
        SubsystemKind::GprsContext,
        SubsystemKind::RadioSettings,
        SubsystemKind::Phonebook,
        SubsystemKind::CallVolume,
        SubsystemKind::Netreg,
        SubsystemKind::Ussd,
        SubsystemKind::CallSettings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SubsystemKind::Sim => "sim",
            SubsystemKind::Devinfo => "devinfo",
            SubsystemKind::Voicecall => "voicecall",
            SubsystemKind::Sms => "sms",
            SubsystemKind::Gprs => "gprs",
            SubsystemKind::GprsContext => "gprs-context",
            SubsystemKind::RadioSettings => "radio-settings",
            SubsystemKind::Phonebook => "phonebook",
            SubsystemKind::CallVolume => "call-volume",
            SubsystemKind::Netreg => "netreg",
            SubsystemKind::Ussd => "ussd",
            SubsystemKind::CallSettings => "call-settings",
        }
    }
}

impl fmt::Display for SubsystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Driver Trait ───────────────────────────────────────────────────────────

/// Arguments every constructor receives.
pub struct DriverContext<'a> {
    pub modem: &'a str,
    pub variant: u32,
    pub driver: &'a str,
    pub transport: &'a TransportHandle,
}

/// A feature subsystem instance. It owns its own protocol exchanges; the
/// core only calls the wiring hooks below.
pub trait SubsystemDriver: Send {
    fn kind(&self) -> SubsystemKind;

    /// A card is present (SIM driver).
    fn card_inserted(&mut self) {}

    /// Attach a bearer context (data-session driver). Drivers that take no
    /// contexts hand it back.
    ///
    /// An accepted context leaves the modem's [`DriverSet`], so the owner
    /// must offer it every completion it does not claim itself.
    fn add_context(
        &mut self,
        context: Box<dyn SubsystemDriver>,
    ) -> Result<(), Box<dyn SubsystemDriver>> {
        Err(context)
    }

    /// A completion the core did not claim. Return `true` if consumed.
    fn handle_completion(&mut self, _completion: &Completion) -> bool {
        false
    }
}

// ─── Registry ───────────────────────────────────────────────────────────────

pub type Constructor =
    Box<dyn Fn(&DriverContext<'_>) -> Option<Box<dyn SubsystemDriver>> + Send + Sync>;

/// Constructors keyed by subsystem kind.
#[derive(Default)]
pub struct DriverRegistry {
    constructors: HashMap<SubsystemKind, Constructor>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the constructor for `kind`.
    pub fn register<F>(&mut self, kind: SubsystemKind, constructor: F) -> &mut Self
    where
        F: Fn(&DriverContext<'_>) -> Option<Box<dyn SubsystemDriver>> + Send + Sync + 'static,
    {
        self.constructors.insert(kind, Box::new(constructor));
        self
    }

    pub fn with<F>(mut self, kind: SubsystemKind, constructor: F) -> Self
    where
        F: Fn(&DriverContext<'_>) -> Option<Box<dyn SubsystemDriver>> + Send + Sync + 'static,
    {
        self.register(kind, constructor);
        self
    }

    pub fn contains(&self, kind: SubsystemKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    /// Construct a driver. `None` when no constructor is registered or the
    /// constructor declined.
    pub fn create(
        &self,
        kind: SubsystemKind,
        ctx: &DriverContext<'_>,
    ) -> Option<Box<dyn SubsystemDriver>> {
        self.constructors.get(&kind).and_then(|ctor| ctor(ctx))
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.constructors.keys().copied().collect();
        kinds.sort();
        f.debug_struct("DriverRegistry").field("kinds", &kinds).finish()
    }
}

// ─── Driver Set ─────────────────────────────────────────────────────────────

/// Drivers instantiated for one modem during the current enable cycle.
///
/// A context linked into its data-session driver is owned by that driver
/// and only remembered here by kind; completions reach it through the owner.
#[derive(Default)]
pub struct DriverSet {
    drivers: BTreeMap<SubsystemKind, Box<dyn SubsystemDriver>>,
    linked: BTreeSet<SubsystemKind>,
}

impl DriverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, kind: SubsystemKind) -> bool {
        self.drivers.contains_key(&kind) || self.linked.contains(&kind)
    }

    pub fn insert(&mut self, driver: Box<dyn SubsystemDriver>) {
        self.drivers.insert(driver.kind(), driver);
    }

    pub fn get_mut(&mut self, kind: SubsystemKind) -> Option<&mut Box<dyn SubsystemDriver>> {
        self.drivers.get_mut(&kind)
    }

    pub fn take(&mut self, kind: SubsystemKind) -> Option<Box<dyn SubsystemDriver>> {
        self.drivers.remove(&kind)
    }

    pub fn mark_linked(&mut self, kind: SubsystemKind) {
        self.linked.insert(kind);
    }

    pub fn is_linked(&self, kind: SubsystemKind) -> bool {
        self.linked.contains(&kind)
    }

    /// Every instantiated kind, linked ones included, in enum order.
    pub fn kinds(&self) -> Vec<SubsystemKind> {
        self.drivers
            .keys()
            .chain(self.linked.iter())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.drivers.len() + self.linked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty() && self.linked.is_empty()
    }

    pub fn clear(&mut self) {
        self.drivers.clear();
        self.linked.clear();
    }

    /// Offer a completion to each driver until one consumes it.
    pub fn dispatch_completion(&mut self, completion: &Completion) -> bool {
        self.drivers
            .values_mut()
            .any(|driver| driver.handle_completion(completion))
    }
}

impl fmt::Debug for DriverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverSet")
            .field("kinds", &self.kinds())
            .finish()
    }
}
