use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable that turns on protocol tracing through the
/// transport's debug hook.
pub const DEBUG_ENV: &str = "RIL_DEBUG";

pub const DEFAULT_DRIVER: &str = "rilmodem";
pub const DEFAULT_MAX_POWER_ON_RETRIES: u32 = 5;
/// Upper bound on failed power-on attempts per enable cycle.
pub const MAX_POWER_ON_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_DEBUG_PREFIX: &str = "Device: ";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModemConfigInput {
    pub driver: Option<String>,
    pub variant: Option<u32>,
    pub max_power_on_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub debug: Option<bool>,
    pub debug_prefix: Option<String>,
}

/// Per-modem settings shared by the sequencer, the prober and the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModemConfig {
    /// Driver name passed to every subsystem constructor.
    pub driver: String,
    /// Variant index passed to every subsystem constructor.
    pub variant: u32,
    pub max_power_on_retries: u32,
    pub retry_delay: Duration,
    pub debug: bool,
    pub debug_prefix: String,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            driver: DEFAULT_DRIVER.to_string(),
            variant: 0,
            max_power_on_retries: DEFAULT_MAX_POWER_ON_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            debug: false,
            debug_prefix: DEFAULT_DEBUG_PREFIX.to_string(),
        }
    }
}

impl ModemConfigInput {
    pub fn resolve(self) -> Result<ModemConfig, ConfigError> {
        let defaults = ModemConfig::default();

        let driver = match self.driver {
            Some(d) if d.trim().is_empty() => {
                return Err(ConfigError::Invalid("driver name is empty".into()))
            }
            Some(d) => d.trim().to_string(),
            None => defaults.driver,
        };

        let max_power_on_retries = self
            .max_power_on_retries
            .unwrap_or(defaults.max_power_on_retries);
        if max_power_on_retries == 0 {
            return Err(ConfigError::Invalid(
                "max_power_on_retries must be at least 1".into(),
            ));
        }
        if max_power_on_retries > MAX_POWER_ON_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "max_power_on_retries must be at most {MAX_POWER_ON_RETRIES}"
            )));
        }

        Ok(ModemConfig {
            driver,
            variant: self.variant.unwrap_or(defaults.variant),
            max_power_on_retries,
            retry_delay: self
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_delay),
            debug: self.debug.unwrap_or(defaults.debug),
            debug_prefix: self.debug_prefix.unwrap_or(defaults.debug_prefix),
        })
    }
}

impl ModemConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(ModemConfig::default());
        }
        let parsed: ModemConfigInput = toml::from_str(input)?;
        parsed.resolve()
    }

    /// Turn on protocol tracing if [`DEBUG_ENV`] is present.
    pub fn apply_env(mut self) -> Self {
        if std::env::var_os(DEBUG_ENV).is_some() {
            self.debug = true;
        }
        self
    }
}
