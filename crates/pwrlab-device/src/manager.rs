//! ---
//! pwl_section: "05-field-devices"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Field device links, wiring rules, and the device manager."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Owner of the four field links. Polls PLC memory, drives the actuator
//! write sequences, and retries dropped links on a bounded countdown.
//! Individual link failures are isolated: one dead PLC never blocks polling
//! or control of the others.

use std::sync::Arc;
use std::time::Duration;

use pwrlab_proto::{Speed, Switch};
use pwrlab_state::LoadPatch;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::link::{DeviceLink, LinkFactory, PlcId, SerialLink};
use crate::wiring;
use crate::Result;

/// Settle delay between the writes of a power sequence.
const SETTLE_POWER: Duration = Duration::from_millis(100);

/// Settle delay between the two bits of a speed selector, so the actuator
/// observes a valid intermediate state only momentarily.
const SETTLE_SELECTOR: Duration = Duration::from_millis(10);

/// Per-link reconnect policy. A countdown greater than zero means a retry is
/// scheduled; reaching exactly 1 fires the reconnect on that tick, after
/// which the policy resets to idle or re-arms depending on the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectCountdown {
    window: u32,
    remaining: u32,
}

impl ReconnectCountdown {
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            remaining: 0,
        }
    }

    /// Schedule a retry if one is not already pending.
    pub fn arm(&mut self) {
        if self.remaining == 0 {
            self.remaining = self.window;
        }
    }

    /// Advance one tick. Returns true when the reconnect should fire now.
    pub fn tick(&mut self) -> bool {
        match self.remaining {
            0 => false,
            1 => {
                self.remaining = 0;
                true
            }
            n => {
                self.remaining = n - 1;
                false
            }
        }
    }

    /// Record the reconnect outcome; failure re-arms the full window.
    pub fn resolve(&mut self, reconnected: bool) {
        if !reconnected {
            self.remaining = self.window;
        }
    }

    /// Ticks left before the pending retry fires (0 when idle).
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

/// Per-link connectivity snapshot in the shape the console expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    #[serde(rename = "Serial")]
    pub serial: bool,
    #[serde(rename = "Plc1")]
    pub plc1: bool,
    #[serde(rename = "Plc2")]
    pub plc2: bool,
    #[serde(rename = "Plc3")]
    pub plc3: bool,
}

struct LinkSlot {
    id: PlcId,
    link: Box<dyn DeviceLink>,
    connected: bool,
    retry: ReconnectCountdown,
}

/// Owns the three PLC links plus the serial line.
pub struct DeviceManager {
    slots: Vec<LinkSlot>,
    serial: Box<dyn SerialLink>,
    factory: Arc<dyn LinkFactory>,
    link_timeout: Duration,
}

impl DeviceManager {
    /// Connect every link through the factory. Links that fail to come up
    /// start with a retry already scheduled.
    pub async fn connect(
        factory: Arc<dyn LinkFactory>,
        serial: Box<dyn SerialLink>,
        reconnect_window: u32,
        link_timeout: Duration,
    ) -> Self {
        let mut slots = Vec::with_capacity(PlcId::ALL.len());
        for id in PlcId::ALL {
            let link = factory.connect(id).await;
            let connected = link.connected();
            let mut retry = ReconnectCountdown::new(reconnect_window);
            if !connected {
                warn!(link = %id, "link did not come up at startup");
                retry.arm();
            }
            slots.push(LinkSlot {
                id,
                link,
                connected,
                retry,
            });
        }
        info!(serial = serial.connected(), "device manager connected");
        Self {
            slots,
            serial,
            factory,
            link_timeout,
        }
    }

    // Slots are built in `PlcId::ALL` order, so the discriminant indexes them.
    fn slot_mut(&mut self, id: PlcId) -> &mut LinkSlot {
        &mut self.slots[id as usize]
    }

    fn slot(&self, id: PlcId) -> &LinkSlot {
        &self.slots[id as usize]
    }

    /// Whether a PLC link is currently considered up.
    pub fn is_connected(&self, id: PlcId) -> bool {
        self.slot(id).connected
    }

    /// Ticks left on a link's pending retry.
    pub fn retry_remaining(&self, id: PlcId) -> u32 {
        self.slot(id).retry.remaining()
    }

    /// Per-link connectivity booleans (serial + 3 PLCs).
    pub fn connectivity(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            serial: self.serial.connected(),
            plc1: self.is_connected(PlcId::Plc1),
            plc2: self.is_connected(PlcId::Plc2),
            plc3: self.is_connected(PlcId::Plc3),
        }
    }

    /// Read every connected PLC's memory block and translate it through the
    /// wiring tables. A failed read marks only that link down and leaves its
    /// load fields absent from the patch (stale-but-available upstream).
    pub async fn poll_all(&mut self) -> LoadPatch {
        let mut patch = LoadPatch::default();
        for slot in &mut self.slots {
            if !slot.connected {
                continue;
            }
            match timeout(self.link_timeout, slot.link.read_memory()).await {
                Ok(Ok(block)) => wiring::extract(slot.id, &block, &mut patch),
                Ok(Err(err)) => {
                    warn!(link = %slot.id, error = %err, "memory read failed; marking link down");
                    slot.connected = false;
                    slot.retry.arm();
                }
                Err(_) => {
                    warn!(link = %slot.id, "memory read timed out; marking link down");
                    slot.connected = false;
                    slot.retry.arm();
                }
            }
        }
        patch
    }

    /// Advance every disconnected link's countdown; when one fires, release
    /// the old link and build a fresh one through the factory.
    pub async fn tick_reconnect(&mut self) {
        for idx in 0..self.slots.len() {
            if self.slots[idx].connected || !self.slots[idx].retry.tick() {
                continue;
            }
            let id = self.slots[idx].id;
            info!(link = %id, "retry window elapsed; reconnecting");
            self.slots[idx].link.disconnect().await;
            let link = self.factory.connect(id).await;
            let connected = link.connected();
            self.slots[idx].link = link;
            self.slots[idx].connected = connected;
            self.slots[idx].retry.resolve(connected);
            if connected {
                info!(link = %id, "link restored");
            } else {
                warn!(link = %id, window = self.slots[idx].retry.remaining(), "reconnect failed; window re-armed");
            }
        }
    }

    /// Write one memory cell. A disconnected link makes this a logged no-op;
    /// a failing write marks the link down and surfaces the error so a
    /// scripted caller can log it at its own step boundary.
    pub async fn write_cell(&mut self, id: PlcId, cell: &str, value: u16) -> Result<()> {
        let link_timeout = self.link_timeout;
        let slot = self.slot_mut(id);
        if !slot.connected {
            warn!(link = %id, cell, value, "link down; setpoint write skipped");
            return Ok(());
        }
        let outcome = timeout(link_timeout, slot.link.write_memory(cell, value)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(crate::DeviceError::Timeout { link: id.name() }),
        };
        if let Err(err) = &result {
            warn!(link = %id, cell, error = %err, "setpoint write failed; marking link down");
            slot.connected = false;
            slot.retry.arm();
        }
        result
    }

    async fn write_or_warn(&mut self, id: PlcId, cell: &str, value: u16) {
        // write_cell already logs; actuator sequences keep going regardless.
        let _ = self.write_cell(id, cell, value).await;
    }

    /// Main power sequence across all three PLCs.
    pub async fn set_main_power(&mut self, value: Switch) {
        let pwr = u16::from(value == Switch::On);
        let led = 1 - pwr;
        self.write_or_warn(PlcId::Plc1, "M0", pwr).await;
        tokio::time::sleep(SETTLE_POWER).await;
        self.write_or_warn(PlcId::Plc1, "M10", pwr).await;
        tokio::time::sleep(SETTLE_POWER).await;
        self.write_or_warn(PlcId::Plc1, "M60", led).await;
        tokio::time::sleep(SETTLE_POWER).await;
        self.write_or_warn(PlcId::Plc2, "qx0.0", pwr).await;
        tokio::time::sleep(SETTLE_POWER).await;
        self.write_or_warn(PlcId::Plc2, "qx0.2", led).await;
        tokio::time::sleep(SETTLE_POWER).await;
        self.write_or_warn(PlcId::Plc3, "M10", pwr).await;
        tokio::time::sleep(SETTLE_POWER).await;
        self.write_or_warn(PlcId::Plc3, "M60", led).await;
    }

    /// Track sensor power, both bits set together.
    pub async fn set_sensor_power(&mut self, value: Switch) {
        let bit = u16::from(value == Switch::On);
        self.write_or_warn(PlcId::Plc3, "M4", bit).await;
        self.write_or_warn(PlcId::Plc3, "M5", bit).await;
    }

    /// Two-bit pump speed selector on PLC1 (00 off, 01 low, 10 high).
    pub async fn set_pump_speed(&mut self, speed: Speed) {
        let (high_bit, low_bit) = selector_bits(speed);
        self.write_or_warn(PlcId::Plc1, "M4", high_bit).await;
        tokio::time::sleep(SETTLE_SELECTOR).await;
        self.write_or_warn(PlcId::Plc1, "M5", low_bit).await;
    }

    /// Two-bit motor speed selector on PLC2 (00 off, 01 low, 10 high).
    pub async fn set_moto_speed(&mut self, speed: Speed) {
        let (high_bit, low_bit) = selector_bits(speed);
        self.write_or_warn(PlcId::Plc2, "qx0.3", high_bit).await;
        tokio::time::sleep(SETTLE_SELECTOR).await;
        self.write_or_warn(PlcId::Plc2, "qx0.4", low_bit).await;
    }

    /// Push one frame down the serial line. A closed port is a logged no-op.
    pub async fn serial_frame(&mut self, frame: &str) -> Result<()> {
        if !self.serial.connected() {
            warn!(frame, "serial link down; frame dropped");
            return Ok(());
        }
        self.serial.send_frame(frame).await
    }

    /// Whether the serial line is up.
    pub fn serial_connected(&self) -> bool {
        self.serial.connected()
    }

    /// Release every link. Called last during shutdown, after no further
    /// writes can be issued.
    pub async fn close_all(&mut self) {
        for slot in &mut self.slots {
            slot.link.disconnect().await;
            slot.connected = false;
        }
        self.serial.close().await;
        info!("all device links closed");
    }
}

fn selector_bits(speed: Speed) -> (u16, u16) {
    match speed {
        Speed::Off => (0, 0),
        Speed::Low => (0, 1),
        Speed::High => (1, 0),
    }
}
