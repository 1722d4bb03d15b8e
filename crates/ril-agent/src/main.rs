//! Modem bring-up agent
//!
//! Framework side of the modem core:
//!
//! - Registers the subsystem driver constructors
//! - Creates each configured modem, probes it, then enables it
//! - Walks pre-sim, post-sim and post-online checkpoints once a modem
//!   reports powered
//! - Prints each modem's status as JSON when its bring-up settles
//!
//! The radio daemon is simulated; see [`radio`].

mod config;
mod drivers;
mod radio;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ril_modem::{ModemEvent, ModemHost, ModemNotice, Phase};
use tracing_subscriber::EnvFilter;

use crate::config::AgentConfig;
use crate::radio::SimulatedConnector;

/// Cellular modem bring-up agent.
#[derive(Parser, Debug)]
#[command(name = "ril-agent", about = "Cellular modem bring-up agent")]
struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Interface name for the first modem.
    #[arg(long)]
    interface: Option<String>,

    /// Trace every protocol frame (same as setting RIL_DEBUG).
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Radio power requests the simulated radio fails before succeeding.
    #[arg(long)]
    power_on_failures: Option<u32>,

    /// Simulate an empty card slot.
    #[arg(long, default_value_t = false)]
    no_card: bool,

    /// Exit once every modem has settled instead of waiting for Ctrl-C.
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    tracing::info!(
        modems = cfg.modems.len(),
        driver = %cfg.modem.driver,
        debug = cfg.modem.debug,
        card_present = cfg.radio.card_present,
        power_on_failures = cfg.radio.power_on_failures,
        "ril-agent starting"
    );

    let registry = Arc::new(drivers::registry(&cfg.missing_drivers));
    let mut host = ModemHost::new(registry);
    let mut settling = BTreeSet::new();

    for entry in &cfg.modems {
        let connector = Box::new(SimulatedConnector::new(cfg.radio.clone()));
        if let Err(e) = host.create(&entry.name, &entry.props, cfg.modem.clone(), connector) {
            tracing::error!(modem = %entry.name, error = %e, "probe failed");
            continue;
        }
        match host.enable(&entry.name) {
            Ok(status) => {
                tracing::debug!(modem = %entry.name, ?status, "enable requested");
                settling.insert(entry.name.clone());
            }
            Err(e) => {
                tracing::error!(modem = %entry.name, error = %e, "enable failed");
                print_status(&host, &entry.name)?;
            }
        }
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    while !(cli.once && settling.is_empty()) {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("received SIGINT, shutting down");
                break;
            }
            notice = host.next_notice() => {
                let Some(notice) = notice else { break };
                if handle_notice(&mut host, &notice)? {
                    settling.remove(&notice.modem);
                }
            }
        }
    }

    for name in host.names() {
        host.disable(&name)
            .with_context(|| format!("disabling {name}"))?;
        host.remove(&name)
            .with_context(|| format!("removing {name}"))?;
    }

    tracing::info!("ril-agent stopped");
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<AgentConfig> {
    let mut cfg = match &cli.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };

    if let Some(interface) = &cli.interface {
        if let Some(first) = cfg.modems.first_mut() {
            first.props.interface = Some(interface.clone());
        }
    }
    if cli.debug {
        cfg.modem.debug = true;
    }
    if let Some(n) = cli.power_on_failures {
        cfg.radio.power_on_failures = n;
    }
    if cli.no_card {
        cfg.radio.card_present = false;
    }
    cfg.modem = cfg.modem.apply_env();
    Ok(cfg)
}

/// React to one notice. Returns `true` once that modem's bring-up settled.
fn handle_notice(host: &mut ModemHost, notice: &ModemNotice) -> anyhow::Result<bool> {
    let name = notice.modem.as_str();
    match &notice.event {
        ModemEvent::Powered => {
            for phase in Phase::ORDER {
                if let Some(report) = host.run_phase(name, phase)? {
                    tracing::info!(
                        modem = %name,
                        phase = phase.as_str(),
                        created = ?report.created,
                        missing = ?report.missing,
                        "checkpoint"
                    );
                }
            }
            print_status(host, name)?;
            Ok(true)
        }
        ModemEvent::CardAbsent | ModemEvent::SimStatusFailed | ModemEvent::PowerOnFailed { .. } => {
            tracing::warn!(modem = %name, event = ?notice.event, "bring-up stopped");
            print_status(host, name)?;
            Ok(true)
        }
        ModemEvent::RetryScheduled { retries, delay, .. } => {
            tracing::info!(modem = %name, retries, delay_ms = delay.as_millis() as u64, "radio power retry scheduled");
            Ok(false)
        }
        event => {
            tracing::debug!(modem = %name, ?event, "modem event");
            Ok(false)
        }
    }
}

fn print_status(host: &ModemHost, name: &str) -> anyhow::Result<()> {
    if let Some(status) = host.status(name) {
        println!("{}", serde_json::to_string_pretty(&status)?);
    }
    Ok(())
}
