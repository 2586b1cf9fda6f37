//! ---
//! pwl_section: "05-field-devices"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Field device links, wiring rules, and the device manager."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Capability traits at the field-bus seam. The concrete byte protocols
//! (Modbus variants, S7, serial line discipline) live behind these traits;
//! the testbed ships the in-memory implementations in [`crate::sim`] and a
//! production deployment plugs its own through the [`LinkFactory`].

use async_trait::async_trait;

use crate::Result;

/// The three supervised PLC positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlcId {
    Plc1,
    Plc2,
    Plc3,
}

impl PlcId {
    /// Stable name used in logs and connectivity snapshots.
    pub fn name(&self) -> &'static str {
        match self {
            PlcId::Plc1 => "plc1",
            PlcId::Plc2 => "plc2",
            PlcId::Plc3 => "plc3",
        }
    }

    /// All positions in polling order.
    pub const ALL: [PlcId; 3] = [PlcId::Plc1, PlcId::Plc2, PlcId::Plc3];
}

impl std::fmt::Display for PlcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque link to one PLC: connect state, a memory-block read, and
/// cell-addressed writes.
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Whether the link considers itself connected.
    fn connected(&self) -> bool;

    /// Read the device's output memory block.
    async fn read_memory(&mut self) -> Result<Vec<u8>>;

    /// Write one memory cell (e.g. `M10`, `qx0.2`). Values are 0/1 for
    /// discrete outputs.
    async fn write_memory(&mut self, cell: &str, value: u16) -> Result<()>;

    /// Release any held resource. Idempotent.
    async fn disconnect(&mut self);
}

/// Opaque line to the serial-attached generator microcontroller.
#[async_trait]
pub trait SerialLink: Send + Sync {
    /// Whether the port is open.
    fn connected(&self) -> bool;

    /// Push one colon-delimited frame down the line.
    async fn send_frame(&mut self, frame: &str) -> Result<()>;

    /// Close the port. Idempotent.
    async fn close(&mut self);
}

/// Builds (and rebuilds) PLC links. Reconnection re-instantiates the link
/// rather than resurrecting a dead socket; a failed connect returns a link
/// whose `connected()` reports false.
#[async_trait]
pub trait LinkFactory: Send + Sync {
    /// Create a fresh link for the given position.
    async fn connect(&self, id: PlcId) -> Box<dyn DeviceLink>;
}
