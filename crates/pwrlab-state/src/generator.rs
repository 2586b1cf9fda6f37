//! ---
//! pwl_section: "01-core-functionality"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Canonical in-memory model of the simulated plant."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
use pwrlab_proto::{
    project_frame, GenPatch, LedColor, Mode, PlcPatch, SmokeLevel, Speed, Switch,
};
use serde::{Deserialize, Serialize};

/// Generator/controller front-panel state. Field names keep the casing the
/// operator console sends on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorState {
    #[serde(rename = "Freq")]
    pub freq: String,
    #[serde(rename = "Volt")]
    pub volt: String,
    #[serde(rename = "Fled")]
    pub fled: LedColor,
    #[serde(rename = "Vled")]
    pub vled: LedColor,
    #[serde(rename = "Mled")]
    pub mled: LedColor,
    #[serde(rename = "Pled")]
    pub pled: LedColor,
    #[serde(rename = "Smok")]
    pub smok: SmokeLevel,
    #[serde(rename = "Pspd")]
    pub pspd: Speed,
    #[serde(rename = "Mspd")]
    pub mspd: Speed,
    #[serde(rename = "Sirn")]
    pub sirn: Switch,
    #[serde(rename = "Spwr")]
    pub spwr: Switch,
    #[serde(rename = "Mpwr")]
    pub mpwr: Switch,
    #[serde(rename = "Mode")]
    pub mode: Mode,
}

impl Default for GeneratorState {
    fn default() -> Self {
        Self {
            freq: "50.00".to_owned(),
            volt: "11.00".to_owned(),
            fled: LedColor::Green,
            vled: LedColor::Green,
            mled: LedColor::Green,
            pled: LedColor::Green,
            smok: SmokeLevel::Off,
            pspd: Speed::Off,
            mspd: Speed::Off,
            sirn: Switch::Off,
            spwr: Switch::Off,
            mpwr: Switch::On,
            mode: Mode::Manual,
        }
    }
}

impl GeneratorState {
    /// Merge a partial update along the serial field sequence and return the
    /// fixed-arity wire projection for the serial-attached device.
    pub fn apply_serial(&mut self, patch: &GenPatch) -> String {
        if let Some(freq) = &patch.freq {
            self.freq = freq.clone();
        }
        if let Some(volt) = &patch.volt {
            self.volt = volt.clone();
        }
        if let Some(fled) = patch.fled {
            self.fled = fled;
        }
        if let Some(vled) = patch.vled {
            self.vled = vled;
        }
        if let Some(mled) = patch.mled {
            self.mled = mled;
        }
        if let Some(pled) = patch.pled {
            self.pled = pled;
        }
        if let Some(smok) = patch.smok {
            self.smok = smok;
        }
        if let Some(sirn) = patch.sirn {
            self.sirn = sirn;
        }
        project_frame(patch)
    }

    /// Unconditional merge of the recognized PLC actuator fields. No
    /// validation against actuator success, matching the control path the
    /// console expects.
    pub fn apply_plc(&mut self, patch: &PlcPatch) {
        if let Some(mpwr) = patch.mpwr {
            self.mpwr = mpwr;
        }
        if let Some(spwr) = patch.spwr {
            self.spwr = spwr;
        }
        if let Some(pspd) = patch.pspd {
            self.pspd = pspd;
        }
        if let Some(mspd) = patch.mspd {
            self.mspd = mspd;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_snapshot() {
        let state = GeneratorState::default();
        assert_eq!(state.freq, "50.00");
        assert_eq!(state.sirn, Switch::Off);
        assert_eq!(state.mpwr, Switch::On);
        assert_eq!(state.mode, Mode::Manual);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["Freq"], "50.00");
        assert_eq!(json["Mode"], 0);
    }

    #[test]
    fn serial_merge_updates_only_present_fields() {
        let mut state = GeneratorState::default();
        let patch = GenPatch {
            freq: Some("51.20".to_owned()),
            fled: Some(LedColor::Red),
            ..GenPatch::default()
        };
        let projection = state.apply_serial(&patch);
        assert_eq!(projection, "51.20:-:red:-:-:-:-:-");
        assert_eq!(state.freq, "51.20");
        assert_eq!(state.fled, LedColor::Red);
        // untouched fields keep their defaults
        assert_eq!(state.volt, "11.00");
        assert_eq!(state.vled, LedColor::Green);
    }

    #[test]
    fn plc_merge_leaves_mode_unchanged() {
        let mut state = GeneratorState::default();
        state.apply_plc(&PlcPatch {
            pspd: Some(Speed::High),
            ..PlcPatch::default()
        });
        assert_eq!(state.pspd, Speed::High);
        assert_eq!(state.mode, Mode::Manual);
    }
}
