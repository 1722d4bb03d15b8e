//! # ril-modem
//!
//! Bring-up controller for a cellular modem driven through an asynchronous
//! radio control protocol.
//!
//! Enabling a modem opens its transport and queries card status. A present
//! card starts radio power-on with bounded, fixed-delay retries. Once the
//! radio reports success the framework is told the modem is powered and
//! walks it through three checkpoints that instantiate feature subsystem
//! drivers.
//!
//! ## Crate structure
//!
//! - [`transport`] — Transport traits, completion routing, pending-request table
//! - [`power`] — Power-on sequencer with bounded retries
//! - [`sim`] — One-shot card status prober
//! - [`subsystem`] — Subsystem kinds, driver trait, constructor registry
//! - [`dispatch`] — Phase checkpoints (pre-sim, post-sim, post-online)
//! - [`modem`] — Per-modem controller and lifecycle state machine
//! - [`host`] — Single-threaded control loop with one-shot retry timers
//! - [`config`] — Modem settings (TOML + environment)

pub mod config;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod modem;
pub mod power;
pub mod sim;
pub mod subsystem;
pub mod transport;

pub use config::ModemConfig;
pub use dispatch::{Phase, PhaseReport};
pub use error::{ConfigError, ModemError, TransportError};
pub use host::{HostEvent, ModemHost, ModemNotice};
pub use modem::{
    EnableStatus, LifecycleState, ModemController, ModemEvent, ModemProperties, ModemStatus,
};
pub use subsystem::{DriverContext, DriverRegistry, SubsystemDriver, SubsystemKind};
pub use transport::{
    ChannelTransport, Completion, CompletionSink, RadioTransport, RequestFrame, RequestId,
    TransportConnector, TransportHandle,
};
