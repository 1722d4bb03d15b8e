//! Logging subsystem drivers.
//!
//! The feature drivers (SIM manager, call handling, data sessions, ...) live
//! outside the modem core. These stand-ins log their wiring so a bring-up can
//! be followed end to end; the device-info driver also reads the IMEI to
//! exercise driver-owned requests.

use std::collections::BTreeSet;

use bytes::Bytes;
use ril_modem::{
    Completion, DriverContext, DriverRegistry, RequestId, SubsystemDriver, SubsystemKind,
    TransportHandle,
};
use ril_proto::{ParcelReader, RequestType};

/// Registry with a constructor for every kind. Kinds in `missing` decline.
pub fn registry(missing: &BTreeSet<SubsystemKind>) -> DriverRegistry {
    let mut reg = DriverRegistry::new();
    for kind in SubsystemKind::ALL {
        if missing.contains(&kind) {
            reg.register(kind, move |ctx| {
                tracing::debug!(modem = %ctx.modem, %kind, "driver not available");
                None
            });
        } else {
            reg.register(kind, move |ctx| Some(build(kind, ctx)));
        }
    }
    reg
}

fn build(kind: SubsystemKind, ctx: &DriverContext<'_>) -> Box<dyn SubsystemDriver> {
    tracing::debug!(modem = %ctx.modem, %kind, driver = ctx.driver, variant = ctx.variant, "creating driver");
    match kind {
        SubsystemKind::Sim => Box::new(SimDriver {
            modem: ctx.modem.to_string(),
            card_inserted: false,
        }),
        SubsystemKind::Devinfo => Box::new(DevinfoDriver::new(ctx.modem, ctx.transport.clone())),
        SubsystemKind::Gprs => Box::new(GprsDriver {
            modem: ctx.modem.to_string(),
            contexts: Vec::new(),
        }),
        other => Box::new(LoggingDriver { kind: other }),
    }
}

// ─── Drivers ────────────────────────────────────────────────────────────────

struct LoggingDriver {
    kind: SubsystemKind,
}

impl SubsystemDriver for LoggingDriver {
    fn kind(&self) -> SubsystemKind {
        self.kind
    }
}

struct SimDriver {
    modem: String,
    card_inserted: bool,
}

impl SubsystemDriver for SimDriver {
    fn kind(&self) -> SubsystemKind {
        SubsystemKind::Sim
    }

    fn card_inserted(&mut self) {
        if !self.card_inserted {
            self.card_inserted = true;
            tracing::info!(modem = %self.modem, "sim card inserted");
        }
    }
}

struct GprsDriver {
    modem: String,
    contexts: Vec<Box<dyn SubsystemDriver>>,
}

impl SubsystemDriver for GprsDriver {
    fn kind(&self) -> SubsystemKind {
        SubsystemKind::Gprs
    }

    fn add_context(
        &mut self,
        context: Box<dyn SubsystemDriver>,
    ) -> Result<(), Box<dyn SubsystemDriver>> {
        self.contexts.push(context);
        tracing::info!(modem = %self.modem, contexts = self.contexts.len(), "data context attached");
        Ok(())
    }

    fn handle_completion(&mut self, completion: &Completion) -> bool {
        self.contexts
            .iter_mut()
            .any(|context| context.handle_completion(completion))
    }
}

/// Reads the IMEI once at creation.
struct DevinfoDriver {
    modem: String,
    pending: Option<RequestId>,
    imei: Option<String>,
}

impl DevinfoDriver {
    fn new(modem: &str, transport: TransportHandle) -> Self {
        let pending = match transport.send(RequestType::GetImei, Bytes::new()) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(modem, error = %e, "identity query not sent");
                None
            }
        };
        Self {
            modem: modem.to_string(),
            pending,
            imei: None,
        }
    }
}

impl SubsystemDriver for DevinfoDriver {
    fn kind(&self) -> SubsystemKind {
        SubsystemKind::Devinfo
    }

    fn handle_completion(&mut self, completion: &Completion) -> bool {
        if self.pending != Some(completion.id) {
            return false;
        }
        self.pending = None;

        if !completion.errno.is_success() {
            tracing::warn!(modem = %self.modem, errno = %completion.errno, "identity query failed");
            return true;
        }
        match ParcelReader::new(completion.payload.clone()).read_string() {
            Ok(imei) => {
                tracing::info!(modem = %self.modem, imei = imei.as_deref().unwrap_or("-"), "device identity");
                self.imei = imei;
            }
            Err(e) => tracing::warn!(modem = %self.modem, error = %e, "malformed identity"),
        }
        true
    }
}
