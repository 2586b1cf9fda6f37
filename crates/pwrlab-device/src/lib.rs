//! ---
//! pwl_section: "05-field-devices"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Field device links, wiring rules, and the device manager."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Field device layer: the opaque [`DeviceLink`]/[`SerialLink`] capability
//! traits, the per-PLC wiring tables that turn raw memory blocks into load
//! indicators, the in-memory simulated bank, and the [`DeviceManager`] that
//! polls, actuates, and reconnects under partial failure.

pub mod link;
pub mod manager;
pub mod sim;
pub mod wiring;

/// Shared result type for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Errors raised on the field side.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// A memory-block read failed on the named link.
    #[error("{link} read failed: {reason}")]
    Read {
        /// Link the failure occurred on.
        link: &'static str,
        /// Driver-reported reason.
        reason: String,
    },
    /// A memory-cell write failed on the named link.
    #[error("{link} write to {cell} failed: {reason}")]
    Write {
        /// Link the failure occurred on.
        link: &'static str,
        /// Target memory cell.
        cell: String,
        /// Driver-reported reason.
        reason: String,
    },
    /// A link operation exceeded the configured bound.
    #[error("{link} operation timed out")]
    Timeout {
        /// Link the timeout occurred on.
        link: &'static str,
    },
    /// The serial device line is not available.
    #[error("serial link unavailable")]
    SerialUnavailable,
}

pub use link::{DeviceLink, LinkFactory, PlcId, SerialLink};
pub use manager::{ConnectionSnapshot, DeviceManager, ReconnectCountdown};
pub use sim::{SimulatedBank, SimulatedPlc, SimulatedSerial};
