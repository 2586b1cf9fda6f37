//! ---
//! pwl_section: "01-core-functionality"
//! pwl_subsection: "binary"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Binary entrypoint for the pwrlab controller daemon."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use pwrlab_common::config::{AppConfig, DeviceConfig, Mode};
use pwrlab_common::logging::init_tracing;
use pwrlab_core::supervisor::STARTUP_FRAME;
use pwrlab_core::{AttackEngine, CommandDispatcher, Plant, Supervisor};
use pwrlab_device::{DeviceManager, LinkFactory, SerialLink, SimulatedBank};
use pwrlab_net::{CommandServer, TelemetryServer};
use pwrlab_proto::parse_frame;
use pwrlab_state::{ScenarioTable, StateStore};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Load level assumed for telemetry lookups when no PLCs are polled.
const SIM_LOAD_LEVEL: usize = 3;

#[derive(Debug, Parser)]
#[command(author, version, about = "pwrlab testbed controller daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, help = "Override operating mode")]
    mode: Option<CliMode>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMode {
    Production,
    Simulation,
}

impl From<CliMode> for Mode {
    fn from(value: CliMode) -> Self {
        match value {
            CliMode::Production => Mode::Production,
            CliMode::Simulation => Mode::Simulation,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/pwrlab.toml"));
    candidates.push(PathBuf::from("configs/example.dev.toml"));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    if let Some(mode) = cli.mode {
        config.mode = mode.into();
    }
    init_tracing("pwrlabd", &config.logging)?;
    info!(source = %loaded.source.display(), mode = ?config.mode, "configuration loaded");

    run(config).await
}

async fn run(config: AppConfig) -> Result<()> {
    let table = ScenarioTable::from_path(&config.scenario.table_path).with_context(|| {
        format!(
            "failed to load scenario table {}",
            config.scenario.table_path.display()
        )
    })?;

    let simulation = config.mode.is_simulation();
    let manager = match config.mode {
        Mode::Simulation => {
            let bank = SimulatedBank::new();
            DeviceManager::connect(
                Arc::new(bank.clone()),
                Box::new(bank.serial_link()),
                config.devices.reconnect_window,
                config.devices.link_timeout,
            )
            .await
        }
        Mode::Production => {
            let (factory, serial) = deployment_links(&config.devices)?;
            DeviceManager::connect(
                factory,
                serial,
                config.devices.reconnect_window,
                config.devices.link_timeout,
            )
            .await
        }
    };
    let store = StateStore::new(table, simulation.then_some(SIM_LOAD_LEVEL));
    let plant = Plant::new(store, manager, !simulation);

    if plant.forward_serial && plant.devices.lock().await.serial_connected() {
        let patch = parse_frame(STARTUP_FRAME).context("startup frame")?;
        plant.apply_gen_patch(&patch).await;
    }

    let engine = AttackEngine::new(Arc::clone(&plant));
    let dispatcher = CommandDispatcher::new(Arc::clone(&plant), engine.clone());

    let command_server =
        CommandServer::spawn(config.servers.command_listen, dispatcher.clone()).await?;
    let telemetry_server = match config.servers.telemetry_listen {
        Some(addr) => Some(TelemetryServer::spawn(addr, dispatcher.clone()).await?),
        None => {
            info!("telemetry server disabled by configuration");
            None
        }
    };

    let (shutdown_tx, _) = broadcast::channel(4);
    let supervisor = Supervisor::new(Arc::clone(&plant), config.poll_interval, simulation);
    let supervisor_task = tokio::spawn(supervisor.run(shutdown_tx.subscribe()));

    info!("daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");

    // tick loop first, then the listeners, then any running script,
    // and the device links last
    let _ = shutdown_tx.send(());
    if let Err(err) = supervisor_task.await {
        warn!(error = %err, "supervisor join error");
    }
    command_server.shutdown().await;
    if let Some(server) = telemetry_server {
        server.shutdown().await;
    }
    if plant.session.is_locked() {
        engine.stop().await;
    }
    plant.devices.lock().await.close_all().await;

    Ok(())
}

/// Concrete field-bus drivers are deployment property; a site build supplies
/// its factory and serial port here. None are bundled.
fn deployment_links(
    _devices: &DeviceConfig,
) -> Result<(Arc<dyn LinkFactory>, Box<dyn SerialLink>)> {
    bail!("production mode requires a deployment link factory; run with --mode simulation")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_links_are_not_bundled() {
        let err = deployment_links(&DeviceConfig::default()).err().unwrap();
        assert!(err.to_string().contains("--mode simulation"));
    }
}
