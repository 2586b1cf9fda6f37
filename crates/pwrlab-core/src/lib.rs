//! ---
//! pwl_section: "01-core-functionality"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Control-plane runtime: dispatch, attack sequencing, auto control, supervisor."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Control-plane runtime. [`Plant`] bundles the shared resources (state
//! store, device manager, attack session) that the dispatcher, the attack
//! engine, and the supervisor coordinate over; no ambient singletons.

pub mod attack;
pub mod dispatch;
pub mod policy;
pub mod supervisor;

use std::sync::Arc;

use pwrlab_device::DeviceManager;
use pwrlab_proto::GenPatch;
use pwrlab_state::StateStore;
use tokio::sync::Mutex;
use tracing::warn;

pub use attack::{AttackEngine, AttackSession};
pub use dispatch::{CommandDispatcher, Outcome};
pub use policy::{derive_indicators, AutoControl};
pub use supervisor::Supervisor;

/// Shared runtime resources, owned once and handed out as an `Arc`.
pub struct Plant {
    /// Canonical plant state.
    pub store: StateStore,
    /// Field links. The async mutex serializes poll, actuator, and attack
    /// traffic; the supervisor skips a tick instead of queueing on it.
    pub devices: Mutex<DeviceManager>,
    /// Attack coordination flags shared with the supervisor.
    pub session: AttackSession,
    /// Whether operator `SetGen` merges are pushed down the serial line.
    /// Off in simulation mode, matching a rig with no microcontroller wired.
    pub forward_serial: bool,
}

impl Plant {
    pub fn new(store: StateStore, devices: DeviceManager, forward_serial: bool) -> Arc<Self> {
        Arc::new(Self {
            store,
            devices: Mutex::new(devices),
            session: AttackSession::default(),
            forward_serial,
        })
    }

    /// Merge a generator patch and push the resulting projection down the
    /// serial line. Shared by the attack engine, the recovery path, and the
    /// auto-control apply step; a serial failure is logged, never fatal.
    pub async fn apply_gen_patch(&self, patch: &GenPatch) {
        let wire = self.store.merge_gen(patch);
        let mut devices = self.devices.lock().await;
        if let Err(err) = devices.serial_frame(&wire).await {
            warn!(error = %err, "serial push failed");
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    use pwrlab_device::{DeviceManager, SimulatedBank};
    use pwrlab_state::{ScenarioTable, StateStore};
    use tempfile::NamedTempFile;

    use crate::Plant;

    pub(crate) fn scenario_table() -> ScenarioTable {
        let mut file = NamedTempFile::new().expect("tempfile");
        writeln!(file, "tag,load,v0,v1,v2,v3,v4,v5,v6,v7,v8,v9").unwrap();
        for tag in 0..2 {
            for load in 0..4 {
                writeln!(
                    file,
                    "{},{},34.2,1.3,34.1,1.2,68.3,2.5,68.1,2.4,33.0,33.1",
                    tag, load
                )
                .unwrap();
            }
        }
        file.flush().unwrap();
        ScenarioTable::from_path(file.path()).expect("table loads")
    }

    pub(crate) async fn sim_plant() -> (Arc<Plant>, SimulatedBank) {
        let store = StateStore::new(scenario_table(), None);
        let bank = SimulatedBank::new();
        let manager = DeviceManager::connect(
            Arc::new(bank.clone()),
            Box::new(bank.serial_link()),
            10,
            Duration::from_millis(200),
        )
        .await;
        (Plant::new(store, manager, true), bank)
    }
}
