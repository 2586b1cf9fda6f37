//! ---
//! pwl_section: "01-core-functionality"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Canonical in-memory model of the simulated plant."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
use indexmap::IndexMap;
use parking_lot::Mutex;
use pwrlab_proto::{encode_register, GenPatch, Mode, PlcPatch, MDBUS_HEADER};

use crate::generator::GeneratorState;
use crate::load::{LoadPatch, LoadState};
use crate::scenario::{ScenarioTable, ScenarioTag, REGISTER_COUNT};
use crate::Result;

/// Explicit owner of all shared plant state. One mutex per logical store;
/// a `get` never observes a half-applied merge.
#[derive(Debug)]
pub struct StateStore {
    gen: Mutex<GeneratorState>,
    load: Mutex<LoadState>,
    sub: Mutex<IndexMap<String, String>>,
    table: ScenarioTable,
    /// Fixed load level used for telemetry lookups in simulation mode.
    sim_load_override: Option<usize>,
}

impl StateStore {
    pub fn new(table: ScenarioTable, sim_load_override: Option<usize>) -> Self {
        // Register order is the bus encoding order; ff10 is the attack flag.
        let mut sub = IndexMap::with_capacity(REGISTER_COUNT + 1);
        for idx in 0..REGISTER_COUNT {
            sub.insert(format!("ff{:02}", idx), "0".to_owned());
        }
        sub.insert("ff10".to_owned(), "0".to_owned());
        Self {
            gen: Mutex::new(GeneratorState::default()),
            load: Mutex::new(LoadState::default()),
            sub: Mutex::new(sub),
            table,
            sim_load_override,
        }
    }

    /// Generator snapshot as the wire JSON object.
    pub fn gen_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&*self.gen.lock())?)
    }

    /// Copy of the generator snapshot.
    pub fn gen_snapshot(&self) -> GeneratorState {
        self.gen.lock().clone()
    }

    /// Load snapshot as the wire JSON object.
    pub fn load_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&*self.load.lock())?)
    }

    /// Copy of the load snapshot.
    pub fn load_snapshot(&self) -> LoadState {
        self.load.lock().clone()
    }

    /// Merge a generator update along the serial path, returning the
    /// fixed-arity projection for the serial-attached device.
    pub fn merge_gen(&self, patch: &GenPatch) -> String {
        self.gen.lock().apply_serial(patch)
    }

    /// Unconditional merge of the PLC actuator fields.
    pub fn merge_plc(&self, patch: &PlcPatch) {
        self.gen.lock().apply_plc(patch);
    }

    /// Mirror the auto-control flag into the generator mode field.
    pub fn set_mode(&self, mode: Mode) {
        self.gen.lock().mode = mode;
    }

    /// Current control mode.
    pub fn mode(&self) -> Mode {
        self.gen.lock().mode
    }

    /// Merge a partial poll result into the load store.
    pub fn merge_load(&self, patch: &LoadPatch) {
        self.load.lock().apply(patch);
    }

    /// Load count feeding auto control and telemetry lookups.
    pub fn auto_load_count(&self) -> usize {
        match self.sim_load_override {
            Some(fixed) => fixed,
            None => self.load.lock().auto_load_count(),
        }
    }

    /// Replace the whole substation register map from the scenario table and
    /// return it as the wire JSON object. `ff10` is the falsified attack
    /// flag: it reads "0" while the stealthy attack is active.
    pub fn sub_json(&self, attack: bool) -> Result<String> {
        let tag = if attack {
            ScenarioTag::Attack
        } else {
            ScenarioTag::Normal
        };
        let load = self.auto_load_count();
        let row = self.table.pick_row(tag, load)?;
        let mut sub = self.sub.lock();
        for (idx, value) in row.iter().enumerate() {
            sub.insert(format!("ff{:02}", idx), value.clone());
        }
        let flag = if attack { "0" } else { "1" };
        sub.insert("ff10".to_owned(), flag.to_owned());
        Ok(serde_json::to_string(&*sub)?)
    }

    /// Register-encoded telemetry string for the bus channel: the constant
    /// header followed by every register in `ff00..ff10` order.
    pub fn modbus_string(&self) -> String {
        let sub = self.sub.lock();
        let mut out = String::from(MDBUS_HEADER);
        for value in sub.values() {
            let real = value.parse::<f32>().unwrap_or(0.0);
            out.push_str(&encode_register(real));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pwrlab_proto::{LedColor, Speed, Switch};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn store() -> StateStore {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "tag,load,v0,v1,v2,v3,v4,v5,v6,v7,v8,v9").unwrap();
        for tag in 0..2 {
            for load in 0..4 {
                writeln!(
                    file,
                    "{},{},0.5,1.5,2.5,3.5,4.5,5.5,6.5,7.5,8.5,9.5",
                    tag, load
                )
                .unwrap();
            }
        }
        file.flush().unwrap();
        let table = ScenarioTable::from_path(file.path()).unwrap();
        StateStore::new(table, None)
    }

    #[test]
    fn merge_gen_returns_projection_and_updates_store() {
        let store = store();
        let patch = GenPatch {
            volt: Some("00.00".to_owned()),
            pled: Some(LedColor::Red),
            ..GenPatch::default()
        };
        assert_eq!(store.merge_gen(&patch), "-:00.00:-:-:-:red:-:-");
        let snapshot = store.gen_snapshot();
        assert_eq!(snapshot.volt, "00.00");
        assert_eq!(snapshot.pled, LedColor::Red);
    }

    #[test]
    fn plc_merge_does_not_touch_mode() {
        let store = store();
        store.merge_plc(&pwrlab_proto::PlcPatch {
            mspd: Some(Speed::Low),
            spwr: Some(Switch::On),
            ..Default::default()
        });
        let snapshot = store.gen_snapshot();
        assert_eq!(snapshot.mspd, Speed::Low);
        assert_eq!(snapshot.spwr, Switch::On);
        assert_eq!(snapshot.mode, Mode::Manual);
    }

    #[test]
    fn sub_json_replaces_whole_register_map() {
        let store = store();
        let normal: serde_json::Value =
            serde_json::from_str(&store.sub_json(false).unwrap()).unwrap();
        assert_eq!(normal["ff10"], "1");
        assert_eq!(normal["ff00"], "0.5");
        let attacked: serde_json::Value =
            serde_json::from_str(&store.sub_json(true).unwrap()).unwrap();
        assert_eq!(attacked["ff10"], "0");
        assert_eq!(attacked.as_object().unwrap().len(), 11);
    }

    #[test]
    fn modbus_string_is_header_plus_eleven_registers() {
        let store = store();
        store.sub_json(false).unwrap();
        let wire = store.modbus_string();
        assert!(wire.starts_with(MDBUS_HEADER));
        // 11 registers, each "0x" + 8 hex digits
        assert_eq!(wire.len(), MDBUS_HEADER.len() + 11 * 10);
        assert_eq!(&wire[MDBUS_HEADER.len()..MDBUS_HEADER.len() + 10], "0x3F000000");
    }

    #[test]
    fn sim_override_pins_load_level() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "tag,load,v0,v1,v2,v3,v4,v5,v6,v7,v8,v9").unwrap();
        writeln!(file, "0,3,1,1,1,1,1,1,1,1,1,1").unwrap();
        file.flush().unwrap();
        let table = ScenarioTable::from_path(file.path()).unwrap();
        let store = StateStore::new(table, Some(3));
        assert!(store.sub_json(false).is_ok());
    }
}
