//! ---
//! pwl_section: "01-core-functionality"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Control-plane runtime: dispatch, attack sequencing, auto control, supervisor."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Table-driven generator auto control. Pure derivation from the discrete
//! load count; the supervisor decides when to apply it.

use pwrlab_proto::{GenPatch, LedColor, SmokeLevel, Switch};

/// Target frequency per load count 0..=3.
const FREQ_TABLE: [&str; 4] = ["51.2", "50.8", "50.0", "49.8"];

const NOMINAL_VOLT: &str = "11.00";

/// Derive the generator indicator set for a load count. Counts above the
/// table range clamp to the heaviest entry.
pub fn derive_indicators(load_count: usize) -> GenPatch {
    let count = load_count.min(FREQ_TABLE.len() - 1);
    let color = if count == 0 {
        LedColor::Red
    } else {
        LedColor::Green
    };
    GenPatch {
        freq: Some(FREQ_TABLE[count].to_owned()),
        volt: Some(NOMINAL_VOLT.to_owned()),
        fled: Some(color),
        vled: Some(color),
        mled: Some(color),
        pled: Some(color),
        smok: Some(SmokeLevel::Fast),
        sirn: Some(Switch::Off),
    }
}

/// Change detector wrapped around [`derive_indicators`]: yields a patch only
/// when the count differs from the last evaluation, so the supervisor never
/// issues redundant writes.
#[derive(Debug, Default)]
pub struct AutoControl {
    last_count: Option<usize>,
}

impl AutoControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one tick's load count.
    pub fn evaluate(&mut self, load_count: usize) -> Option<GenPatch> {
        if self.last_count == Some(load_count) {
            return None;
        }
        self.last_count = Some(load_count);
        Some(derive_indicators(load_count))
    }

    /// Forget the last evaluation, forcing the next one to apply.
    pub fn reset(&mut self) {
        self.last_count = None;
    }
}
