//! ---
//! pwl_section: "05-field-devices"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Field device links, wiring rules, and the device manager."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Per-PLC wiring tables: which load indicator each PLC owns and how its
//! state is read out of the raw memory block. Earlier ladder revisions wired
//! these differently; this table follows the final wiring and supersedes
//! them.

use pwrlab_state::LoadPatch;

use crate::link::PlcId;

/// Load indicator owned by a wiring rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPoint {
    Indu,
    Airp,
    Resi,
    Stat,
    TrkA,
    TrkB,
    City,
}

/// How a block byte maps to "load on".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnWhen {
    /// On when the byte equals the given value.
    Equals(u8),
    /// On when the byte is non-zero.
    NonZero,
}

/// One bit-extraction rule: byte offset within the block plus the match that
/// means the zone is drawing power.
#[derive(Debug, Clone, Copy)]
pub struct BitRule {
    pub point: LoadPoint,
    pub offset: usize,
    pub on_when: OnWhen,
}

impl BitRule {
    fn evaluate(&self, block: &[u8]) -> Option<u8> {
        let byte = *block.get(self.offset)?;
        let on = match self.on_when {
            OnWhen::Equals(expect) => byte == expect,
            OnWhen::NonZero => byte != 0,
        };
        Some(u8::from(on))
    }
}

const PLC1_RULES: &[BitRule] = &[
    BitRule {
        point: LoadPoint::Indu,
        offset: 7,
        on_when: OnWhen::Equals(0x00),
    },
    BitRule {
        point: LoadPoint::Airp,
        offset: 1,
        on_when: OnWhen::Equals(0x04),
    },
];

// PLC2 exposes its output image one byte per discrete output; the resident
// zone indicator is wired inverted.
const PLC2_RULES: &[BitRule] = &[
    BitRule {
        point: LoadPoint::Stat,
        offset: 0,
        on_when: OnWhen::NonZero,
    },
    BitRule {
        point: LoadPoint::Resi,
        offset: 2,
        on_when: OnWhen::Equals(0x00),
    },
];

const PLC3_RULES: &[BitRule] = &[
    BitRule {
        point: LoadPoint::TrkA,
        offset: 1,
        on_when: OnWhen::Equals(0x04),
    },
    BitRule {
        point: LoadPoint::TrkB,
        offset: 2,
        on_when: OnWhen::Equals(0x10),
    },
    BitRule {
        point: LoadPoint::City,
        offset: 7,
        on_when: OnWhen::Equals(0x00),
    },
];

/// Extraction rules for one PLC position.
pub fn rules_for(id: PlcId) -> &'static [BitRule] {
    match id {
        PlcId::Plc1 => PLC1_RULES,
        PlcId::Plc2 => PLC2_RULES,
        PlcId::Plc3 => PLC3_RULES,
    }
}

/// Apply one PLC's rules to its freshly read block, filling only the fields
/// that PLC owns.
pub fn extract(id: PlcId, block: &[u8], patch: &mut LoadPatch) {
    for rule in rules_for(id) {
        let Some(value) = rule.evaluate(block) else {
            continue;
        };
        let slot = match rule.point {
            LoadPoint::Indu => &mut patch.indu,
            LoadPoint::Airp => &mut patch.airp,
            LoadPoint::Resi => &mut patch.resi,
            LoadPoint::Stat => &mut patch.stat,
            LoadPoint::TrkA => &mut patch.trka,
            LoadPoint::TrkB => &mut patch.trkb,
            LoadPoint::City => &mut patch.city,
        };
        *slot = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plc1_block_decodes_industrial_and_airport() {
        let mut patch = LoadPatch::default();
        let block = [0u8, 0x04, 0, 0, 0, 0, 0, 0x00];
        extract(PlcId::Plc1, &block, &mut patch);
        assert_eq!(patch.indu, Some(1));
        assert_eq!(patch.airp, Some(1));
        assert!(patch.trka.is_none());

        let mut patch = LoadPatch::default();
        let block = [0u8, 0x00, 0, 0, 0, 0, 0, 0xFF];
        extract(PlcId::Plc1, &block, &mut patch);
        assert_eq!(patch.indu, Some(0));
        assert_eq!(patch.airp, Some(0));
    }

    #[test]
    fn plc2_resident_indicator_is_inverted() {
        let mut patch = LoadPatch::default();
        extract(PlcId::Plc2, &[1, 0, 0], &mut patch);
        assert_eq!(patch.stat, Some(1));
        assert_eq!(patch.resi, Some(1));

        let mut patch = LoadPatch::default();
        extract(PlcId::Plc2, &[0, 0, 1], &mut patch);
        assert_eq!(patch.stat, Some(0));
        assert_eq!(patch.resi, Some(0));
    }

    #[test]
    fn short_block_fills_nothing_beyond_its_length() {
        let mut patch = LoadPatch::default();
        extract(PlcId::Plc3, &[0, 0x04], &mut patch);
        assert_eq!(patch.trka, Some(1));
        assert!(patch.trkb.is_none());
        assert!(patch.city.is_none());
    }
}
