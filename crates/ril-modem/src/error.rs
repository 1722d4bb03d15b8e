//! Error types for the modem core.

use thiserror::Error;

/// Errors surfaced to the framework by lifecycle entry points.
#[derive(Debug, Error)]
pub enum ModemError {
    /// The modem was created without an `Interface` property.
    #[error("modem has no interface name")]
    MissingInterface,
    /// The radio transport could not be created.
    #[error("failed to open radio transport: {0}")]
    Io(#[from] std::io::Error),
    #[error("modem has been removed")]
    Removed,
    #[error("unknown modem: {0}")]
    UnknownModem(String),
    #[error("modem already exists: {0}")]
    DuplicateModem(String),
}

/// Errors returned by a radio transport when a request cannot be queued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("radio transport is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
