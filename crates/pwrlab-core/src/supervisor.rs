//! ---
//! pwl_section: "01-core-functionality"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Control-plane runtime: dispatch, attack sequencing, auto control, supervisor."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Top-level control cycle: per tick, poll the PLCs, drive the reconnect
//! countdowns, and evaluate auto control. All control actions are skipped
//! while an attack script holds the session.

use std::sync::Arc;
use std::time::Duration;

use pwrlab_proto::Mode;
use rand::Rng;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info};

use crate::policy::AutoControl;
use crate::Plant;

/// Frame pushed to the serial device once at startup on a real rig.
pub const STARTUP_FRAME: &str = "50.00:11.00:green:green:green:green:slow:off";

/// Owns the periodic control cycle.
pub struct Supervisor {
    plant: Arc<Plant>,
    control: AutoControl,
    poll_interval: Duration,
    /// Simulation mode: no field polling, the load count is randomized per
    /// tick the way the bench rig exercises the auto policy.
    simulate_loads: bool,
}

impl Supervisor {
    pub fn new(plant: Arc<Plant>, poll_interval: Duration, simulate_loads: bool) -> Self {
        Self {
            plant,
            control: AutoControl::new(),
            poll_interval,
            simulate_loads,
        }
    }

    /// Tick until the shutdown signal arrives.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.poll_interval);
        info!(interval = ?self.poll_interval, simulate_loads = self.simulate_loads, "supervisor loop started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("supervisor shutdown signal received");
                    break;
                }
                _ = ticker.tick() => self.tick().await,
            }
        }
        info!("supervisor loop exited");
    }

    /// Run one control cycle.
    pub async fn tick(&mut self) {
        if self.plant.session.is_locked() {
            debug!("attack script active; control tick skipped");
            return;
        }
        if self.simulate_loads {
            let count = rand::thread_rng().gen_range(0..=3);
            self.auto_control(count).await;
            return;
        }
        let patch = {
            // a cycle still in flight means we skip, not queue
            let Ok(mut devices) = self.plant.devices.try_lock() else {
                debug!("device cycle still in flight; tick skipped");
                return;
            };
            let patch = devices.poll_all().await;
            devices.tick_reconnect().await;
            patch
        };
        self.plant.store.merge_load(&patch);
        let count = self.plant.store.auto_load_count();
        self.auto_control(count).await;
    }

    async fn auto_control(&mut self, count: usize) {
        if self.plant.store.mode() != Mode::Auto {
            return;
        }
        if let Some(patch) = self.control.evaluate(count) {
            info!(count, "auto control applying new indicator set");
            self.plant.apply_gen_patch(&patch).await;
        }
    }
}
