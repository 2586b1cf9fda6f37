//! ---
//! pwl_section: "01-core-functionality"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Control-plane runtime: dispatch, attack sequencing, auto control, supervisor."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Scripted attack sequences. Each script is a fixed timeline of literal
//! (delay, action) steps so a given script id always produces the same
//! observable incident; step failures are caught at the step boundary and
//! the remaining timeline still executes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pwrlab_device::PlcId;
use pwrlab_proto::{parse_frame, Mode, ScriptId};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::Plant;

/// Known-safe generator frame commanded by [`AttackEngine::stop`].
pub const RECOVERY_FRAME: &str = "52.00:11.00:green:green:green:green:off:off";

const DISTRESS_FRAME: &str = "52.00:11.00:amber:amber:amber:amber:off:on";
const BLACKOUT_FRAME: &str = "50.00:00.00:red:red:red:red:off:off";
const STEALTH_ONSET_FRAME: &str = "49.89:11.00:red:red:red:red:off:on";
const STEALTH_MID_FRAME: &str = "50.80:11.00:red:red:red:red:off:off";
const STEALTH_LATE_FRAME: &str = "50.00:11.00:amber:amber:amber:amber:off:on";
const STEALTH_FINAL_FRAME: &str = "51.20:11.00:red:red:red:red:off:off";

/// Coordination flags between the attack task, the dispatcher, and the
/// supervisor tick. At most one script runs at a time: `locked` is taken
/// before any device mutation and released only by the owning script's
/// completion or an explicit stop.
#[derive(Debug, Default)]
pub struct AttackSession {
    locked: AtomicBool,
    stealth: AtomicBool,
    active: Mutex<Option<ScriptId>>,
}

impl AttackSession {
    /// Take the session for a new script. Fails when one is already running.
    fn try_begin(&self, script: ScriptId) -> bool {
        if self
            .locked
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        *self.active.lock() = Some(script);
        true
    }

    /// Take the session for the recovery sequence, whether or not a script
    /// holds it. Keeps the control loop out until [`AttackSession::end`]
    /// releases the session again.
    fn seize(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    /// Release the session. Safe on an already-released session.
    fn end(&self) {
        *self.active.lock() = None;
        self.locked.store(false, Ordering::SeqCst);
    }

    /// Whether a script currently holds the session.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// Whether telemetry lookups should draw from the falsified population.
    pub fn stealth_active(&self) -> bool {
        self.stealth.load(Ordering::SeqCst)
    }

    fn set_stealth(&self, active: bool) {
        self.stealth.store(active, Ordering::SeqCst);
    }

    /// Script currently holding the session, if any.
    pub fn active_script(&self) -> Option<ScriptId> {
        *self.active.lock()
    }
}

/// Runs the named scripts on their own task and owns the recovery path.
#[derive(Clone)]
pub struct AttackEngine {
    plant: Arc<Plant>,
}

impl AttackEngine {
    pub fn new(plant: Arc<Plant>) -> Self {
        Self { plant }
    }

    /// Launch a script on its own task. A no-op returning false while
    /// another script holds the session. The session is released
    /// unconditionally when the timeline ends, error steps included.
    pub fn start(&self, script: ScriptId) -> bool {
        if !self.plant.session.try_begin(script) {
            info!(script = %script, "attack session locked; start ignored");
            return false;
        }
        self.plant.store.set_mode(Mode::Manual);
        info!(script = %script, "attack script started");
        let plant = Arc::clone(&self.plant);
        tokio::spawn(async move {
            match script {
                ScriptId::GenDistress => run_gen_distress(&plant).await,
                ScriptId::Stealthy => run_stealthy(&plant).await,
            }
            plant.session.end();
            info!(script = %script, "attack script finished");
        });
        true
    }

    /// Idempotent recovery: command the all-green generator frame, restore
    /// nominal PLC outputs, clear the session and the stealth flag. Valid
    /// whether or not a script is running.
    pub async fn stop(&self) {
        info!("attack stop; restoring nominal state");
        // the session stays taken across the whole sequence so a control
        // tick cannot overwrite the recovery state halfway through
        self.plant.session.seize();
        push_frame(&self.plant, RECOVERY_FRAME).await;
        write_step(&self.plant, PlcId::Plc1, "M0", 1).await;
        write_step(&self.plant, PlcId::Plc1, "M10", 1).await;
        write_step(&self.plant, PlcId::Plc1, "M60", 0).await;
        write_step(&self.plant, PlcId::Plc2, "qx0.0", 1).await;
        write_step(&self.plant, PlcId::Plc3, "M10", 1).await;
        self.plant.session.set_stealth(false);
        self.plant.session.end();
    }
}

/// Generator distress escalation: alert after 10 s, full outage 5 s later,
/// then hand control back to the auto policy.
async fn run_gen_distress(plant: &Arc<Plant>) {
    sleep(Duration::from_secs(10)).await;
    push_frame(plant, DISTRESS_FRAME).await;
    sleep(Duration::from_secs(5)).await;
    push_frame(plant, BLACKOUT_FRAME).await;
    plant.store.set_mode(Mode::Auto);
}

/// Stealthy flicker-and-recover: physical manipulation of runway lights,
/// substation output, and the train circuit while the telemetry channel
/// serves the falsified measurement population.
async fn run_stealthy(plant: &Arc<Plant>) {
    sleep(Duration::from_secs(5)).await;
    push_frame(plant, STEALTH_ONSET_FRAME).await;
    // telemetry switches population only after the first visible action
    plant.session.set_stealth(true);
    sleep(Duration::from_secs(1)).await;
    write_step(plant, PlcId::Plc1, "M60", 1).await;
    sleep(Duration::from_secs(1)).await;

    for round in 0..15u16 {
        let val = round % 2;
        // flicker the runway lights
        write_step(plant, PlcId::Plc1, "M0", val).await;
        sleep(Duration::from_millis(300)).await;
        write_step(plant, PlcId::Plc1, "M10", val).await;
        sleep(Duration::from_millis(300)).await;
        // flicker the substation output
        write_step(plant, PlcId::Plc2, "qx0.0", val).await;
        sleep(Duration::from_millis(300)).await;
        // stop/start the train circuit
        write_step(plant, PlcId::Plc3, "M10", 0).await;
        sleep(Duration::from_millis(500)).await;
        write_step(plant, PlcId::Plc3, "M10", 1).await;
        if round == 5 {
            push_frame(plant, STEALTH_MID_FRAME).await;
        }
        if round == 10 {
            push_frame(plant, STEALTH_LATE_FRAME).await;
        }
    }

    write_step(plant, PlcId::Plc1, "M10", 0).await;
    sleep(Duration::from_secs(10)).await;
    push_frame(plant, STEALTH_FINAL_FRAME).await;
    write_step(plant, PlcId::Plc3, "M10", 0).await;
    sleep(Duration::from_secs(10)).await;
    write_step(plant, PlcId::Plc3, "M60", 1).await;
}

async fn push_frame(plant: &Plant, frame: &str) {
    match parse_frame(frame) {
        Ok(patch) => plant.apply_gen_patch(&patch).await,
        Err(err) => warn!(frame, error = %err, "bad generator frame"),
    }
}

async fn write_step(plant: &Plant, id: PlcId, cell: &str, value: u16) {
    let mut devices = plant.devices.lock().await;
    if let Err(err) = devices.write_cell(id, cell, value).await {
        warn!(link = %id, cell, error = %err, "script step failed; continuing");
    }
}
