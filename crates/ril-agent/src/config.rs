//! Agent configuration (TOML).
//!
//! ```toml
//! missing_drivers = ["phonebook"]
//!
//! [[modems]]
//! name = "ril0"
//! interface = "ttys"
//!
//! [modem]
//! max_power_on_retries = 5
//! retry_delay_ms = 1000
//!
//! [radio]
//! card_present = true
//! power_on_failures = 2
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context};
use ril_modem::config::ModemConfigInput;
use ril_modem::{ModemConfig, ModemProperties, SubsystemKind};
use serde::Deserialize;

pub const DEFAULT_MODEM_NAME: &str = "ril0";
pub const DEFAULT_INTERFACE: &str = "ttys";

// ─── Input (serde) ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentConfigInput {
    pub modems: Option<Vec<ModemEntryInput>>,
    pub modem: ModemConfigInput,
    pub radio: RadioConfigInput,
    pub missing_drivers: Vec<SubsystemKind>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModemEntryInput {
    pub name: Option<String>,
    pub interface: Option<String>,
    pub address: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RadioConfigInput {
    pub card_present: Option<bool>,
    pub power_on_failures: Option<u32>,
    pub latency_ms: Option<u64>,
    pub fail_connect: Option<bool>,
}

// ─── Resolved ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModemEntry {
    pub name: String,
    pub props: ModemProperties,
}

/// Behaviour of the simulated radio behind every modem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioConfig {
    pub card_present: bool,
    /// Power-on requests answered with a failure before one succeeds.
    pub power_on_failures: u32,
    /// Base response latency; up to half again is added as jitter.
    pub latency_ms: u64,
    pub fail_connect: bool,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            card_present: true,
            power_on_failures: 0,
            latency_ms: 20,
            fail_connect: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub modems: Vec<ModemEntry>,
    pub modem: ModemConfig,
    pub radio: RadioConfig,
    pub missing_drivers: BTreeSet<SubsystemKind>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            modems: vec![default_modem()],
            modem: ModemConfig::default(),
            radio: RadioConfig::default(),
            missing_drivers: BTreeSet::new(),
        }
    }
}

fn default_modem() -> ModemEntry {
    ModemEntry {
        name: DEFAULT_MODEM_NAME.to_string(),
        props: ModemProperties {
            interface: Some(DEFAULT_INTERFACE.to_string()),
            address: 0,
        },
    }
}

impl AgentConfigInput {
    pub fn resolve(self) -> anyhow::Result<AgentConfig> {
        let modems = match self.modems {
            None => vec![default_modem()],
            Some(entries) if entries.is_empty() => bail!("at least one [[modems]] entry is required"),
            Some(entries) => entries
                .into_iter()
                .enumerate()
                .map(|(i, e)| ModemEntry {
                    name: e.name.unwrap_or_else(|| format!("ril{i}")),
                    // Left as given: a missing interface is reported by probe.
                    props: ModemProperties {
                        interface: e.interface,
                        address: e.address.unwrap_or(0),
                    },
                })
                .collect(),
        };

        let mut seen = BTreeSet::new();
        for entry in &modems {
            if !seen.insert(entry.name.as_str()) {
                bail!("duplicate modem name {:?}", entry.name);
            }
        }

        let defaults = RadioConfig::default();
        let radio = RadioConfig {
            card_present: self.radio.card_present.unwrap_or(defaults.card_present),
            power_on_failures: self
                .radio
                .power_on_failures
                .unwrap_or(defaults.power_on_failures),
            latency_ms: self.radio.latency_ms.unwrap_or(defaults.latency_ms),
            fail_connect: self.radio.fail_connect.unwrap_or(defaults.fail_connect),
        };

        Ok(AgentConfig {
            modems,
            modem: self.modem.resolve()?,
            radio,
            missing_drivers: self.missing_drivers.into_iter().collect(),
        })
    }
}

impl AgentConfig {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        if input.trim().is_empty() {
            return Ok(AgentConfig::default());
        }
        let parsed: AgentConfigInput = toml::from_str(input).context("invalid agent config")?;
        parsed.resolve()
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }
}
