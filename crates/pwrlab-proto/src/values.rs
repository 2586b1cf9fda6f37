//! ---
//! pwl_section: "02-messaging-ipc-data-model"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "Command protocol schema and wire codecs."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Enumerated field domains for the generator front panel. Every value that
//! crosses the protocol boundary decodes into one of these; anything outside
//! the domain is rejected before it can reach the state store.

use serde::{Deserialize, Serialize};

use crate::ProtoError;

/// Indicator lamp colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedColor {
    Green,
    Amber,
    Red,
}

/// Smoke generator output level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmokeLevel {
    Off,
    Slow,
    Fast,
}

/// Two-position switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Switch {
    On,
    Off,
}

/// Three-position speed selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Off,
    Low,
    High,
}

/// Control mode, serialized as the integer the console sends (0 manual, 1 auto).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum Mode {
    #[default]
    Manual,
    Auto,
}

impl From<Mode> for u8 {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Manual => 0,
            Mode::Auto => 1,
        }
    }
}

impl TryFrom<u8> for Mode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Mode::Manual),
            1 => Ok(Mode::Auto),
            other => Err(format!("mode out of domain: {}", other)),
        }
    }
}

macro_rules! wire_str {
    ($ty:ty { $($variant:path => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Lowercase wire spelling of the value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $ty {
            type Err = ProtoError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($variant),)+
                    other => Err(ProtoError::Frame(format!(
                        "value '{}' outside {} domain",
                        other,
                        stringify!($ty)
                    ))),
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_str!(LedColor {
    LedColor::Green => "green",
    LedColor::Amber => "amber",
    LedColor::Red => "red",
});

wire_str!(SmokeLevel {
    SmokeLevel::Off => "off",
    SmokeLevel::Slow => "slow",
    SmokeLevel::Fast => "fast",
});

wire_str!(Switch {
    Switch::On => "on",
    Switch::Off => "off",
});

wire_str!(Speed {
    Speed::Off => "off",
    Speed::Low => "low",
    Speed::High => "high",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_as_integer() {
        let json = serde_json::to_string(&Mode::Auto).unwrap();
        assert_eq!(json, "1");
        let back: Mode = serde_json::from_str("0").unwrap();
        assert_eq!(back, Mode::Manual);
        assert!(serde_json::from_str::<Mode>("2").is_err());
    }

    #[test]
    fn out_of_domain_values_are_rejected() {
        assert!("purple".parse::<LedColor>().is_err());
        assert!(serde_json::from_str::<Speed>("\"warp\"").is_err());
        assert_eq!("amber".parse::<LedColor>().unwrap(), LedColor::Amber);
    }
}
