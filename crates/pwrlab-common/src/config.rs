//! ---
//! pwl_section: "01-core-functionality"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Shared primitives for the testbed controller runtime."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_mode() -> Mode {
    Mode::Simulation
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_command_listen() -> SocketAddr {
    "0.0.0.0:5005"
        .parse()
        .expect("valid default command address")
}

fn default_telemetry_listen() -> Option<SocketAddr> {
    Some(
        "0.0.0.0:5009"
            .parse()
            .expect("valid default telemetry address"),
    )
}

fn default_plc1_addr() -> String {
    "192.168.10.72:502".to_owned()
}

fn default_plc2_addr() -> String {
    "192.168.10.73:102".to_owned()
}

fn default_plc3_addr() -> String {
    "192.168.10.71:502".to_owned()
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_reconnect_window() -> u32 {
    10
}

fn default_link_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_scenario_path() -> PathBuf {
    PathBuf::from("configs/substation_params.csv")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for the PwrLab controller runtime.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_mode")]
    pub mode: Mode,
    /// Supervisor tick interval driving device polling and auto control.
    #[serde(default = "default_poll_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub poll_interval: Duration,
    #[serde(default)]
    pub servers: ServerConfig,
    #[serde(default)]
    pub devices: DeviceConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "PWRLAB_CONFIG";

    /// Load configuration from disk, respecting the `PWRLAB_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(anyhow!("poll_interval must be greater than zero"));
        }
        self.devices.validate()?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            poll_interval: default_poll_interval(),
            servers: ServerConfig::default(),
            devices: DeviceConfig::default(),
            scenario: ScenarioConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Operating mode for the controller.
///
/// Simulation mode suppresses real device I/O: field links are replaced by
/// the in-memory bank and the load number is randomised per tick.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Production,
    #[default]
    Simulation,
}

impl Mode {
    pub fn is_simulation(&self) -> bool {
        matches!(self, Mode::Simulation)
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Mode::Production),
            "simulation" => Ok(Mode::Simulation),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

/// Listener endpoints for the two network front-ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Connectionless command/response endpoint used by the operator console.
    #[serde(default = "default_command_listen")]
    pub command_listen: SocketAddr,
    /// Connection-oriented telemetry bus endpoint. `None` disables the server.
    #[serde(default = "default_telemetry_listen")]
    pub telemetry_listen: Option<SocketAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command_listen: default_command_listen(),
            telemetry_listen: default_telemetry_listen(),
        }
    }
}

/// Field device endpoints and the link retry policy.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_plc1_addr")]
    pub plc1_addr: String,
    #[serde(default = "default_plc2_addr")]
    pub plc2_addr: String,
    #[serde(default = "default_plc3_addr")]
    pub plc3_addr: String,
    /// Serial port for the generator microcontroller; auto-discovered when unset.
    #[serde(default)]
    pub serial_port: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Ticks to wait before retrying a dropped link.
    #[serde(default = "default_reconnect_window")]
    pub reconnect_window: u32,
    /// Upper bound on a single link read or write.
    #[serde(default = "default_link_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub link_timeout: Duration,
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reconnect_window == 0 {
            return Err(anyhow!("reconnect_window must be at least one tick"));
        }
        Ok(())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            plc1_addr: default_plc1_addr(),
            plc2_addr: default_plc2_addr(),
            plc3_addr: default_plc3_addr(),
            serial_port: None,
            baud_rate: default_baud_rate(),
            reconnect_window: default_reconnect_window(),
            link_timeout: default_link_timeout(),
        }
    }
}

/// Source of the canned substation measurement snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_scenario_path")]
    pub table_path: PathBuf,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            table_path: default_scenario_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.mode.is_simulation());
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn parses_minimal_toml() {
        let config: AppConfig = r#"
            mode = "production"
            poll_interval = 2

            [servers]
            command_listen = "127.0.0.1:6005"

            [devices]
            reconnect_window = 5
        "#
        .parse()
        .expect("config parses");
        assert_eq!(config.mode, Mode::Production);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.devices.reconnect_window, 5);
        assert_eq!(
            config.servers.command_listen,
            "127.0.0.1:6005".parse().unwrap()
        );
        assert!(config.servers.telemetry_listen.is_some());
    }

    #[test]
    fn rejects_zero_reconnect_window() {
        let parsed = r#"
            [devices]
            reconnect_window = 0
        "#
        .parse::<AppConfig>();
        assert!(parsed.is_err());
    }
}
