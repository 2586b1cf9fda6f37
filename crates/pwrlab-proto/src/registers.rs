//! ---
//! pwl_section: "02-messaging-ipc-data-model"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Command protocol schema and wire codecs."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Real-to-register codec for the telemetry bus channel. Each substation
//! register value travels as the hex spelling of its IEEE-754 single
//! precision bit pattern, e.g. `3.1416` -> `0x40490FF9`.

use crate::{ProtoError, Result};

/// Constant header prepended to the register-encoded telemetry string.
pub const MDBUS_HEADER: &str = "000040010C";

/// Encode a real value as its register string.
pub fn encode_register(value: f32) -> String {
    format!("0x{:08X}", value.to_bits())
}

/// Decode a register string back to a real value.
pub fn decode_register(register: &str) -> Result<f32> {
    let digits = register
        .strip_prefix("0x")
        .or_else(|| register.strip_prefix("0X"))
        .ok_or_else(|| ProtoError::Frame(format!("register missing 0x prefix: {}", register)))?;
    let bits = u32::from_str_radix(digits, 16)
        .map_err(|err| ProtoError::Frame(format!("bad register '{}': {}", register, err)))?;
    Ok(f32::from_bits(bits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_known_patterns() {
        assert_eq!(encode_register(3.1416), "0x40490FF9");
        assert_eq!(encode_register(-1.25), "0xBFA00000");
        assert_eq!(encode_register(0.0), "0x00000000");
    }

    #[test]
    fn decodes_known_patterns() {
        assert!((decode_register("0x40490FF9").unwrap() - 3.1416).abs() < 1e-4);
        assert_eq!(decode_register("0xBFA00000").unwrap(), -1.25);
        assert!(decode_register("40490FF9").is_err());
        assert!(decode_register("0xZZZZ").is_err());
    }
}
