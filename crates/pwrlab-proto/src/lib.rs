//! ---
//! pwl_section: "02-messaging-ipc-data-model"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Command protocol schema and wire codecs."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Wire-level schema for the testbed controller: the JSON command envelope
//! exchanged with the operator console, the bare control tokens that bypass
//! it, the colon-delimited serial frame pushed to the generator
//! microcontroller, and the register codec used on the telemetry bus.

pub mod envelope;
pub mod registers;
pub mod serial;
pub mod values;

/// Shared result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtoError>;

/// Errors raised while decoding inbound payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// The JSON envelope was missing `Cmd`, carried an unknown `Cmd` value,
    /// or had a payload of the wrong shape.
    #[error("malformed command envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The payload bytes were not valid UTF-8.
    #[error("payload is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// A serial frame had the wrong arity or an out-of-domain field value.
    #[error("invalid serial frame: {0}")]
    Frame(String),
}

pub use envelope::{
    Command, GenPatch, GetTarget, PlcPatch, Request, ScriptId, CANNOT_HANDLE, SET_DONE,
};
pub use registers::{decode_register, encode_register, MDBUS_HEADER};
pub use serial::{parse_frame, project_frame, FRAME_ARITY, FRAME_SENTINEL};
pub use values::{LedColor, Mode, SmokeLevel, Speed, Switch};
