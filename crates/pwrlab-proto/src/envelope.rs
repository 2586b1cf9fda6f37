//! ---
//! pwl_section: "02-messaging-ipc-data-model"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Command protocol schema and wire codecs."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Inbound request decoding. Bare control tokens are matched before any JSON
//! parsing; everything else must be a `{"Cmd": ..., "Parm": ...}` envelope
//! that decodes into exactly one [`Command`] variant.

use serde::Deserialize;

use crate::values::{LedColor, SmokeLevel, Speed, Switch};
use crate::{ProtoError, Result};

/// Fixed diagnostic returned for malformed or unrecognized envelopes.
pub const CANNOT_HANDLE: &str = r#"{"Cmd":"Err","Param":"cannot handle"}"#;

/// Default acknowledgement for set-style requests that carry no snapshot.
pub const SET_DONE: &str = r#"{"Cmd":"Set","Param":"Done"}"#;

const TOKEN_ATTACK_STOP: &str = "A;0";
const TOKEN_ATTACK_GEN: &str = "A;1";
const TOKEN_ATTACK_STEALTH: &str = "A;3";

/// Scripted attack sequence selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptId {
    /// Generator distress escalation (token `A;1`).
    GenDistress,
    /// Stealthy flicker-and-recover with falsified telemetry (token `A;3`).
    Stealthy,
}

impl ScriptId {
    /// Wire token selecting this script.
    pub fn token(&self) -> &'static str {
        match self {
            ScriptId::GenDistress => TOKEN_ATTACK_GEN,
            ScriptId::Stealthy => TOKEN_ATTACK_STEALTH,
        }
    }
}

impl std::fmt::Display for ScriptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Target of a `Get` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum GetTarget {
    /// Per-link connectivity booleans.
    Con,
    /// Generator front-panel snapshot.
    Gen,
    /// Power load snapshot.
    Load,
    /// Register-encoded telemetry string (telemetry bus channel).
    MdBs,
}

/// Partial generator front-panel update. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GenPatch {
    #[serde(rename = "Freq")]
    pub freq: Option<String>,
    #[serde(rename = "Volt")]
    pub volt: Option<String>,
    #[serde(rename = "Fled")]
    pub fled: Option<LedColor>,
    #[serde(rename = "Vled")]
    pub vled: Option<LedColor>,
    #[serde(rename = "Mled")]
    pub mled: Option<LedColor>,
    #[serde(rename = "Pled")]
    pub pled: Option<LedColor>,
    #[serde(rename = "Smok")]
    pub smok: Option<SmokeLevel>,
    #[serde(rename = "Sirn")]
    pub sirn: Option<Switch>,
}

impl GenPatch {
    /// True when no field is present.
    pub fn is_empty(&self) -> bool {
        self == &GenPatch::default()
    }
}

/// PLC actuator request. Only these four keys are recognized; anything else
/// in the payload is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlcPatch {
    #[serde(rename = "Mpwr")]
    pub mpwr: Option<Switch>,
    #[serde(rename = "Spwr")]
    pub spwr: Option<Switch>,
    #[serde(rename = "Pspd")]
    pub pspd: Option<Speed>,
    #[serde(rename = "Mspd")]
    pub mspd: Option<Speed>,
}

/// The five recognized command envelopes, decoded once at the boundary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "Cmd", content = "Parm")]
pub enum Command {
    /// State snapshot request.
    Get(GetTarget),
    /// Partial generator update routed through the serial projection.
    SetGen(GenPatch),
    /// PLC actuator request.
    SetPLC(PlcPatch),
    /// Auto load control toggle.
    SetALC(bool),
    /// Substation telemetry request; the payload is ignored.
    GetSub(serde_json::Value),
}

/// A fully classified inbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Empty payload or a `logout`/`end` token: terminate the receive loop
    /// without replying.
    Terminate,
    /// Attack-start token, bypassing the JSON envelope.
    AttackStart(ScriptId),
    /// Attack-stop token, bypassing the JSON envelope.
    AttackStop,
    /// A decoded command envelope.
    Command(Command),
}

impl Request {
    /// Classify a raw datagram/stream payload. Control tokens are matched
    /// before any JSON parsing is attempted.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.is_empty() || payload == b"end" || payload == b"logout" {
            return Ok(Request::Terminate);
        }
        let text = std::str::from_utf8(payload)?;
        match text {
            TOKEN_ATTACK_GEN => return Ok(Request::AttackStart(ScriptId::GenDistress)),
            TOKEN_ATTACK_STEALTH => return Ok(Request::AttackStart(ScriptId::Stealthy)),
            TOKEN_ATTACK_STOP => return Ok(Request::AttackStop),
            _ => {}
        }
        let command = serde_json::from_str::<Command>(text)?;
        Ok(Request::Command(command))
    }
}
