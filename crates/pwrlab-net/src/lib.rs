//! ---
//! pwl_section: "03-network-interfaces"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "UDP command server and TCP telemetry server."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Transport adapters over the command dispatcher: the connectionless
//! command channel the console talks to and the connection-oriented
//! telemetry bus channel. Failing to bind either socket aborts startup;
//! everything after that is recovered locally.

pub mod tcp;
pub mod udp;

pub use tcp::TelemetryServer;
pub use udp::CommandServer;
