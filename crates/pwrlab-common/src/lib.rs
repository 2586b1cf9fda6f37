//! ---
//! pwl_section: "01-core-functionality"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Shared primitives for the testbed controller runtime."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Shared primitives for the PwrLab testbed controller workspace.
//! This crate exposes configuration loading and logging initialisation
//! consumed by every other workspace member.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, DeviceConfig, LoggingConfig, Mode, ScenarioConfig, ServerConfig,
};
pub use logging::{init_tracing, LogFormat};
