//! ---
//! pwl_section: "01-core-functionality"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Canonical in-memory model of the simulated plant."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Seven binary plant-zone indicators, each owned by exactly one upstream
/// PLC. Written only by the device poll path; read-only to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadState {
    #[serde(rename = "Indu")]
    pub indu: u8,
    #[serde(rename = "Airp")]
    pub airp: u8,
    #[serde(rename = "Resi")]
    pub resi: u8,
    #[serde(rename = "Stat")]
    pub stat: u8,
    #[serde(rename = "TrkA")]
    pub trka: u8,
    #[serde(rename = "TrkB")]
    pub trkb: u8,
    #[serde(rename = "City")]
    pub city: u8,
}

impl Default for LoadState {
    fn default() -> Self {
        Self {
            indu: 0,
            airp: 1,
            resi: 0,
            stat: 1,
            trka: 0,
            trkb: 1,
            city: 0,
        }
    }
}

impl LoadState {
    /// Merge a partial poll result. Fields a disconnected PLC could not
    /// deliver stay at their last known value.
    pub fn apply(&mut self, patch: &LoadPatch) {
        if let Some(indu) = patch.indu {
            self.indu = indu;
        }
        if let Some(airp) = patch.airp {
            self.airp = airp;
        }
        if let Some(resi) = patch.resi {
            self.resi = resi;
        }
        if let Some(stat) = patch.stat {
            self.stat = stat;
        }
        if let Some(trka) = patch.trka {
            self.trka = trka;
        }
        if let Some(trkb) = patch.trkb {
            self.trkb = trkb;
        }
        if let Some(city) = patch.city {
            self.city = city;
        }
    }

    /// Load count driving the auto-control policy (airport, station, track A).
    pub fn auto_load_count(&self) -> usize {
        (self.airp + self.stat + self.trka) as usize
    }
}

/// Partial load update produced by one polling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadPatch {
    pub indu: Option<u8>,
    pub airp: Option<u8>,
    pub resi: Option<u8>,
    pub stat: Option<u8>,
    pub trka: Option<u8>,
    pub trkb: Option<u8>,
    pub city: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_apply_keeps_stale_fields() {
        let mut load = LoadState::default();
        load.apply(&LoadPatch {
            indu: Some(1),
            airp: Some(0),
            ..LoadPatch::default()
        });
        assert_eq!(load.indu, 1);
        assert_eq!(load.airp, 0);
        // untouched fields keep their prior values
        assert_eq!(load.stat, 1);
        assert_eq!(load.trkb, 1);
    }

    #[test]
    fn auto_load_count_counts_the_three_auto_keys() {
        let load = LoadState {
            airp: 1,
            stat: 1,
            trka: 1,
            trkb: 0,
            ..LoadState::default()
        };
        assert_eq!(load.auto_load_count(), 3);
        assert_eq!(LoadState::default().auto_load_count(), 2);
    }
}
