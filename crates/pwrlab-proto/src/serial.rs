//! ---
//! pwl_section: "02-messaging-ipc-data-model"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Command protocol schema and wire codecs."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Serial device line format: an 8-field colon-delimited ASCII record in the
//! fixed order `Freq:Volt:Fled:Vled:Mled:Pled:Smok:Sirn`, with `'-'` as the
//! per-field "unchanged" sentinel. The fixed arity lets the microcontroller
//! apply a delta without re-parsing a full state dump.

use crate::envelope::GenPatch;
use crate::{ProtoError, Result};

/// Number of fields in every serial frame.
pub const FRAME_ARITY: usize = 8;

/// Per-field placeholder for "unchanged".
pub const FRAME_SENTINEL: &str = "-";

/// Project a partial update onto the fixed serial field sequence. Absent
/// fields are substituted with the sentinel so the arity never varies.
pub fn project_frame(patch: &GenPatch) -> String {
    let fields: [Option<String>; FRAME_ARITY] = [
        patch.freq.clone(),
        patch.volt.clone(),
        patch.fled.map(|v| v.to_string()),
        patch.vled.map(|v| v.to_string()),
        patch.mled.map(|v| v.to_string()),
        patch.pled.map(|v| v.to_string()),
        patch.smok.map(|v| v.to_string()),
        patch.sirn.map(|v| v.to_string()),
    ];
    fields
        .into_iter()
        .map(|field| field.unwrap_or_else(|| FRAME_SENTINEL.to_owned()))
        .collect::<Vec<_>>()
        .join(":")
}

/// Parse a serial frame back into a partial update. Sentinel fields map to
/// `None`; any other value must lie inside its field domain.
pub fn parse_frame(frame: &str) -> Result<GenPatch> {
    let fields: Vec<&str> = frame.split(':').collect();
    if fields.len() != FRAME_ARITY {
        return Err(ProtoError::Frame(format!(
            "expected {} fields, got {} in '{}'",
            FRAME_ARITY,
            fields.len(),
            frame
        )));
    }
    let value = |idx: usize| -> Option<&str> {
        (fields[idx] != FRAME_SENTINEL).then_some(fields[idx])
    };
    Ok(GenPatch {
        freq: value(0).map(str::to_owned),
        volt: value(1).map(str::to_owned),
        fled: value(2).map(str::parse).transpose()?,
        vled: value(3).map(str::parse).transpose()?,
        mled: value(4).map(str::parse).transpose()?,
        pled: value(5).map(str::parse).transpose()?,
        smok: value(6).map(str::parse).transpose()?,
        sirn: value(7).map(str::parse).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::{LedColor, SmokeLevel, Switch};

    #[test]
    fn full_frame_round_trips() {
        let frame = "52.00:11.00:amber:amber:amber:amber:off:on";
        let patch = parse_frame(frame).unwrap();
        assert_eq!(patch.fled, Some(LedColor::Amber));
        assert_eq!(patch.smok, Some(SmokeLevel::Off));
        assert_eq!(patch.sirn, Some(Switch::On));
        assert_eq!(project_frame(&patch), frame);
    }

    #[test]
    fn projection_has_fixed_arity_with_sentinels() {
        let patch = GenPatch {
            freq: Some("50.80".to_owned()),
            sirn: Some(Switch::Off),
            ..GenPatch::default()
        };
        let frame = project_frame(&patch);
        assert_eq!(frame, "50.80:-:-:-:-:-:-:off");
        assert_eq!(frame.split(':').count(), FRAME_ARITY);
    }

    #[test]
    fn empty_patch_projects_all_sentinels() {
        assert_eq!(project_frame(&GenPatch::default()), "-:-:-:-:-:-:-:-");
    }

    #[test]
    fn wrong_arity_is_rejected() {
        assert!(parse_frame("50.00:11.00:green").is_err());
        assert!(parse_frame("a:b:c:d:e:f:g:h:i").is_err());
    }
}
