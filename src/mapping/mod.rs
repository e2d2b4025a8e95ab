//! Mapping entries - which physical control drives which radio function
//!
//! A [`Mapping`] is the raw configuration entry. Its `type` is kept as a
//! string so that a typo in one entry only disables that control instead of
//! failing the whole configuration.

pub mod factory;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::control::{ControlKey, ValueControlKind};
use crate::radio::{Mode, Trx, UnknownMode, UnknownVfo, Vfo};

pub use factory::build_control;

/// Error for a single mapping entry that cannot be turned into a control
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("unknown mapping type '{0}'")]
    UnknownType(String),

    #[error("missing option '{0}'")]
    MissingOption(&'static str),

    #[error("option '{option}' has invalid value '{value}': {reason}")]
    InvalidOption {
        option: &'static str,
        value: String,
        reason: String,
    },

    #[error("channel {0} out of range 0-15")]
    InvalidChannel(u8),

    #[error("key {0} out of range 0-127")]
    InvalidKey(u8),

    #[error("trx{trx} does not exist, the radio has {count} transceiver(s)")]
    InvalidTrx { trx: Trx, count: u8 },

    #[error(transparent)]
    Vfo(#[from] UnknownVfo),

    #[error(transparent)]
    Mode(#[from] UnknownMode),
}

/// Radio function of a mapping entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingType {
    // Value controls
    RxVolume,
    RxBalance,
    Volume,
    Rit,
    Xit,
    CwSpeed,
    RxMixer,
    // Wheel
    Vfo,
    // Toggles
    Mute,
    Mox,
    Tune,
    EnableRit,
    EnableXit,
    EnableSplit,
    EnableRx,
    // Presets
    Mode,
    FilterBand,
    SetRxVolume,
    SetRxBalance,
    SetRxMixer,
    // Actions
    SendCw,
    StopCw,
    SyncVfoFrequency,
}

impl MappingType {
    pub const ALL: [MappingType; 23] = [
        MappingType::RxVolume,
        MappingType::RxBalance,
        MappingType::Volume,
        MappingType::Rit,
        MappingType::Xit,
        MappingType::CwSpeed,
        MappingType::RxMixer,
        MappingType::Vfo,
        MappingType::Mute,
        MappingType::Mox,
        MappingType::Tune,
        MappingType::EnableRit,
        MappingType::EnableXit,
        MappingType::EnableSplit,
        MappingType::EnableRx,
        MappingType::Mode,
        MappingType::FilterBand,
        MappingType::SetRxVolume,
        MappingType::SetRxBalance,
        MappingType::SetRxMixer,
        MappingType::SendCw,
        MappingType::StopCw,
        MappingType::SyncVfoFrequency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MappingType::RxVolume => "rx_volume",
            MappingType::RxBalance => "rx_balance",
            MappingType::Volume => "volume",
            MappingType::Rit => "rit",
            MappingType::Xit => "xit",
            MappingType::CwSpeed => "cw_speed",
            MappingType::RxMixer => "rx_mixer",
            MappingType::Vfo => "vfo",
            MappingType::Mute => "mute",
            MappingType::Mox => "mox",
            MappingType::Tune => "tune",
            MappingType::EnableRit => "enable_rit",
            MappingType::EnableXit => "enable_xit",
            MappingType::EnableSplit => "enable_split",
            MappingType::EnableRx => "enable_rx",
            MappingType::Mode => "mode",
            MappingType::FilterBand => "filter_band",
            MappingType::SetRxVolume => "set_rx_volume",
            MappingType::SetRxBalance => "set_rx_balance",
            MappingType::SetRxMixer => "set_rx_mixer",
            MappingType::SendCw => "send_cw",
            MappingType::StopCw => "stop_cw",
            MappingType::SyncVfoFrequency => "sync_vfo_frequency",
        }
    }
}

impl FromStr for MappingType {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        MappingType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| MappingError::UnknownType(s.to_string()))
    }
}

impl fmt::Display for MappingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured control
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Mapping {
    #[serde(rename = "type")]
    pub kind: String,
    /// MIDI channel, 0-15
    pub channel: u8,
    /// Note or controller number
    pub key: u8,
    #[serde(default)]
    pub trx: Trx,
    /// `A`/`VFOA` or `B`/`VFOB`; VFO A when empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vfo: String,
    #[serde(
        default,
        deserialize_with = "deserialize_options",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub options: HashMap<String, String>,
}

/// Option values may be written as strings, numbers or booleans
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Flag(bool),
}

fn deserialize_options<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<HashMap<String, Scalar>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                Scalar::Text(s) => s,
                Scalar::Int(i) => i.to_string(),
                Scalar::Float(f) => f.to_string(),
                Scalar::Flag(b) => b.to_string(),
            };
            (name, value)
        })
        .collect())
}

impl Mapping {
    pub fn new(kind: impl Into<String>, channel: u8, key: u8) -> Self {
        Self {
            kind: kind.into(),
            channel,
            key,
            trx: 0,
            vfo: String::new(),
            options: HashMap::new(),
        }
    }

    pub fn with_trx(mut self, trx: Trx) -> Self {
        self.trx = trx;
        self
    }

    pub fn with_vfo(mut self, vfo: impl Into<String>) -> Self {
        self.vfo = vfo.into();
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    pub fn mapping_type(&self) -> Result<MappingType, MappingError> {
        self.kind.parse()
    }

    /// Validated control identity
    pub fn control_key(&self) -> Result<ControlKey, MappingError> {
        if self.channel > 15 {
            return Err(MappingError::InvalidChannel(self.channel));
        }
        if self.key > 127 {
            return Err(MappingError::InvalidKey(self.key));
        }
        Ok(ControlKey::new(self.channel, self.key))
    }

    pub fn vfo(&self) -> Result<Vfo, MappingError> {
        if self.vfo.trim().is_empty() {
            return Ok(Vfo::A);
        }
        Ok(self.vfo.parse()?)
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    pub fn required_option(&self, name: &'static str) -> Result<&str, MappingError> {
        self.option(name).ok_or(MappingError::MissingOption(name))
    }

    /// Parsed option, `default` when absent
    pub fn parsed_option<T>(&self, name: &'static str, default: T) -> Result<T, MappingError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.option(name) {
            Some(value) => parse_option(name, value),
            None => Ok(default),
        }
    }

    /// Parsed option that must be present
    pub fn required_parsed_option<T>(&self, name: &'static str) -> Result<T, MappingError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        parse_option(name, self.required_option(name)?)
    }

    pub fn mode_option(&self) -> Result<Mode, MappingError> {
        Ok(self.required_option("mode")?.parse()?)
    }

    /// `direction: reverse`
    pub fn is_reversed(&self) -> bool {
        self.option("direction")
            .is_some_and(|d| d.trim().eq_ignore_ascii_case("reverse"))
    }

    /// Control style of a value mapping: `control`, `step`, `direction`, `mode`
    pub fn value_control_kind(&self, default_step: i32) -> Result<ValueControlKind, MappingError> {
        let control = self.option("control").unwrap_or("poti").trim().to_lowercase();
        match control.as_str() {
            "poti" => Ok(ValueControlKind::Poti),
            "encoder" => {
                let step = match self.parsed_option("step", default_step)? {
                    0 => default_step,
                    step if step < 0 => {
                        return Err(MappingError::InvalidOption {
                            option: "step",
                            value: step.to_string(),
                            reason: "must be positive".to_string(),
                        })
                    }
                    step => step,
                };
                let dynamic = self
                    .option("mode")
                    .is_some_and(|m| m.trim().eq_ignore_ascii_case("dynamic"));
                Ok(ValueControlKind::Encoder {
                    step,
                    reverse: self.is_reversed(),
                    dynamic,
                })
            }
            _ => Err(MappingError::InvalidOption {
                option: "control",
                value: control,
                reason: "use poti or encoder".to_string(),
            }),
        }
    }
}

fn parse_option<T>(name: &'static str, value: &str) -> Result<T, MappingError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| MappingError::InvalidOption {
            option: name,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ch{}/{:#04x}", self.kind, self.channel, self.key)?;
        if self.trx != 0 {
            write!(f, " trx{}", self.trx)?;
        }
        if !self.vfo.is_empty() {
            write!(f, " {}", self.vfo)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_type_parsing() {
        assert_eq!("rx_volume".parse::<MappingType>().unwrap(), MappingType::RxVolume);
        assert_eq!(" VFO ".parse::<MappingType>().unwrap(), MappingType::Vfo);
        for t in MappingType::ALL {
            assert_eq!(t.as_str().parse::<MappingType>().unwrap(), t);
        }
        assert_eq!(
            "fader".parse::<MappingType>().unwrap_err(),
            MappingError::UnknownType("fader".to_string())
        );
    }

    #[test]
    fn test_control_key_validation() {
        assert_eq!(
            Mapping::new("mute", 2, 0x10).control_key().unwrap(),
            ControlKey::new(2, 0x10)
        );
        assert_eq!(
            Mapping::new("mute", 16, 0x10).control_key().unwrap_err(),
            MappingError::InvalidChannel(16)
        );
        assert_eq!(
            Mapping::new("mute", 0, 200).control_key().unwrap_err(),
            MappingError::InvalidKey(200)
        );
    }

    #[test]
    fn test_vfo_defaults_to_a() {
        assert_eq!(Mapping::new("vfo", 0, 1).vfo().unwrap(), Vfo::A);
        assert_eq!(Mapping::new("vfo", 0, 1).with_vfo("vfob").vfo().unwrap(), Vfo::B);
        assert!(matches!(
            Mapping::new("vfo", 0, 1).with_vfo("C").vfo(),
            Err(MappingError::Vfo(_))
        ));
    }

    #[test]
    fn test_value_control_kind_defaults_to_poti() {
        let mapping = Mapping::new("volume", 0, 7);
        assert_eq!(mapping.value_control_kind(1).unwrap(), ValueControlKind::Poti);
    }

    #[test]
    fn test_value_control_kind_encoder_options() {
        let mapping = Mapping::new("rit", 0, 0x10)
            .with_option("control", "Encoder")
            .with_option("step", "10")
            .with_option("direction", "reverse")
            .with_option("mode", "dynamic");

        assert_eq!(
            mapping.value_control_kind(1).unwrap(),
            ValueControlKind::Encoder {
                step: 10,
                reverse: true,
                dynamic: true
            }
        );
    }

    #[test]
    fn test_value_control_kind_zero_step_uses_default() {
        let mapping = Mapping::new("rit", 0, 0x10)
            .with_option("control", "encoder")
            .with_option("step", "0");

        assert_eq!(
            mapping.value_control_kind(5).unwrap(),
            ValueControlKind::Encoder {
                step: 5,
                reverse: false,
                dynamic: false
            }
        );
    }

    #[test]
    fn test_invalid_options() {
        let bad_step = Mapping::new("rit", 0, 0x10)
            .with_option("control", "encoder")
            .with_option("step", "ten");
        assert!(matches!(
            bad_step.value_control_kind(1),
            Err(MappingError::InvalidOption { option: "step", .. })
        ));

        let bad_control = Mapping::new("rit", 0, 0x10).with_option("control", "slider");
        assert!(matches!(
            bad_control.value_control_kind(1),
            Err(MappingError::InvalidOption {
                option: "control",
                ..
            })
        ));

        assert_eq!(
            Mapping::new("mode", 0, 1).mode_option().unwrap_err(),
            MappingError::MissingOption("mode")
        );
    }

    #[test]
    fn test_deserialize_scalar_options() {
        let yaml = r#"
type: sync_vfo_frequency
channel: 0
key: 16
vfo: B
options:
  src_vfo: A
  offset: 1000
  enabled: true
"#;
        let mapping: Mapping = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(mapping.option("offset"), Some("1000"));
        assert_eq!(mapping.option("enabled"), Some("true"));
        assert_eq!(mapping.parsed_option("offset", 0i64).unwrap(), 1000);
        assert_eq!(mapping.trx, 0);
    }

    #[test]
    fn test_deserialize_json_without_options() {
        let json = r#"{"type": "mute", "channel": 1, "key": 42}"#;
        let mapping: Mapping = serde_json::from_str(json).unwrap();

        assert_eq!(mapping, Mapping::new("mute", 1, 42));
    }
}
