//! ---
//! pwl_section: "05-field-devices"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Field device links, wiring rules, and the device manager."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! In-memory field devices used in simulation mode and throughout the test
//! suite. The bank keeps one shared cell per PLC so a test (or the
//! simulation driver) can rewrite blocks, knock links offline, and inspect
//! actuator writes while the manager holds the links.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::link::{DeviceLink, LinkFactory, PlcId, SerialLink};
use crate::{DeviceError, Result};

#[derive(Debug)]
struct PlcShared {
    block: Vec<u8>,
    cells: HashMap<String, u16>,
    online: bool,
    fail_reads: bool,
    connect_attempts: u32,
}

impl PlcShared {
    fn new(block: Vec<u8>) -> Self {
        Self {
            block,
            cells: HashMap::new(),
            online: true,
            fail_reads: false,
            connect_attempts: 0,
        }
    }
}

#[derive(Debug, Default)]
struct SerialShared {
    frames: Vec<String>,
    connected: bool,
}

/// Simulated PLC bank plus the serial microcontroller, acting as the link
/// factory in simulation mode.
#[derive(Clone)]
pub struct SimulatedBank {
    plcs: Arc<HashMap<PlcId, Arc<Mutex<PlcShared>>>>,
    serial: Arc<Mutex<SerialShared>>,
}

impl Default for SimulatedBank {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBank {
    /// Bank with blocks matching the documented default load snapshot
    /// (airport, station, and track B drawing power).
    pub fn new() -> Self {
        let mut plcs = HashMap::new();
        plcs.insert(
            PlcId::Plc1,
            Arc::new(Mutex::new(PlcShared::new(vec![
                0x00, 0x04, 0, 0, 0, 0, 0, 0xFF,
            ]))),
        );
        plcs.insert(
            PlcId::Plc2,
            Arc::new(Mutex::new(PlcShared::new(vec![0x01, 0x00, 0x01]))),
        );
        plcs.insert(
            PlcId::Plc3,
            Arc::new(Mutex::new(PlcShared::new(vec![
                0x00, 0x00, 0x10, 0, 0, 0, 0, 0xFF,
            ]))),
        );
        Self {
            plcs: Arc::new(plcs),
            serial: Arc::new(Mutex::new(SerialShared {
                frames: Vec::new(),
                connected: true,
            })),
        }
    }

    fn shared(&self, id: PlcId) -> Arc<Mutex<PlcShared>> {
        self.plcs.get(&id).expect("bank holds all plcs").clone()
    }

    /// Replace a PLC's output memory block.
    pub fn set_block(&self, id: PlcId, block: Vec<u8>) {
        self.shared(id).lock().block = block;
    }

    /// Force the next reads on a link to fail (a wedged or dropped device).
    pub fn fail_reads(&self, id: PlcId, fail: bool) {
        self.shared(id).lock().fail_reads = fail;
    }

    /// Mark a PLC reachable/unreachable for future connect attempts.
    pub fn set_online(&self, id: PlcId, online: bool) {
        self.shared(id).lock().online = online;
    }

    /// Last value written to a named cell, if any.
    pub fn written(&self, id: PlcId, cell: &str) -> Option<u16> {
        self.shared(id).lock().cells.get(cell).copied()
    }

    /// Number of connect attempts made against a PLC.
    pub fn connect_attempts(&self, id: PlcId) -> u32 {
        self.shared(id).lock().connect_attempts
    }

    /// Handle to the simulated serial microcontroller.
    pub fn serial_link(&self) -> SimulatedSerial {
        SimulatedSerial {
            shared: self.serial.clone(),
        }
    }

    /// Frames pushed down the serial line so far.
    pub fn serial_frames(&self) -> Vec<String> {
        self.serial.lock().frames.clone()
    }

    /// Open/close the simulated serial port.
    pub fn set_serial_connected(&self, connected: bool) {
        self.serial.lock().connected = connected;
    }
}

#[async_trait]
impl LinkFactory for SimulatedBank {
    async fn connect(&self, id: PlcId) -> Box<dyn DeviceLink> {
        let shared = self.shared(id);
        let online = {
            let mut guard = shared.lock();
            guard.connect_attempts += 1;
            guard.online
        };
        Box::new(SimulatedPlc {
            id,
            shared,
            connected: online,
        })
    }
}

/// One simulated PLC link handed to the device manager.
pub struct SimulatedPlc {
    id: PlcId,
    shared: Arc<Mutex<PlcShared>>,
    connected: bool,
}

#[async_trait]
impl DeviceLink for SimulatedPlc {
    fn connected(&self) -> bool {
        self.connected
    }

    async fn read_memory(&mut self) -> Result<Vec<u8>> {
        let guard = self.shared.lock();
        if !self.connected || guard.fail_reads || !guard.online {
            return Err(DeviceError::Read {
                link: self.id.name(),
                reason: "simulated read failure".to_owned(),
            });
        }
        Ok(guard.block.clone())
    }

    async fn write_memory(&mut self, cell: &str, value: u16) -> Result<()> {
        let mut guard = self.shared.lock();
        if !self.connected || !guard.online {
            return Err(DeviceError::Write {
                link: self.id.name(),
                cell: cell.to_owned(),
                reason: "simulated link down".to_owned(),
            });
        }
        guard.cells.insert(cell.to_owned(), value);
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }
}

/// Simulated serial line capturing every frame it is asked to push.
#[derive(Clone)]
pub struct SimulatedSerial {
    shared: Arc<Mutex<SerialShared>>,
}

#[async_trait]
impl SerialLink for SimulatedSerial {
    fn connected(&self) -> bool {
        self.shared.lock().connected
    }

    async fn send_frame(&mut self, frame: &str) -> Result<()> {
        let mut guard = self.shared.lock();
        if !guard.connected {
            return Err(DeviceError::SerialUnavailable);
        }
        guard.frames.push(frame.to_owned());
        Ok(())
    }

    async fn close(&mut self) {
        self.shared.lock().connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bank_defaults_match_default_load_snapshot() {
        let bank = SimulatedBank::new();
        let mut link = bank.connect(PlcId::Plc1).await;
        let block = link.read_memory().await.unwrap();
        assert_eq!(block[1], 0x04);
        assert_eq!(bank.connect_attempts(PlcId::Plc1), 1);
    }

    #[tokio::test]
    async fn offline_bank_rejects_connects_and_writes() {
        let bank = SimulatedBank::new();
        bank.set_online(PlcId::Plc2, false);
        let mut link = bank.connect(PlcId::Plc2).await;
        assert!(!link.connected());
        assert!(link.write_memory("qx0.0", 1).await.is_err());
    }

    #[tokio::test]
    async fn serial_captures_frames_until_closed() {
        let bank = SimulatedBank::new();
        let mut serial = bank.serial_link();
        serial.send_frame("50.00:-:-:-:-:-:-:off").await.unwrap();
        assert_eq!(bank.serial_frames(), vec!["50.00:-:-:-:-:-:-:off"]);
        serial.close().await;
        assert!(serial.send_frame("x:-:-:-:-:-:-:-").await.is_err());
    }
}
