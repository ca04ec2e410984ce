//! Sensor schema model.
//!
//! A schema names a sensor and lists its channels in wire order. It is
//! what a sensor advertises on its metadata topic, serialized with
//! [`crate::schema_codec`].

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Wire format version written as the first schema byte.
pub const SCHEMA_VERSION: u8 = 0x01;

/// Name of the channel that carries the packet timestamp.
pub const TIMESTAMP_CHANNEL: &str = "timestamp";

/// How a channel value is laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EncodingKind {
    /// Microseconds since the Unix epoch, 64-bit signed
    Timestamp = 0x00,
    /// IEEE754 float, 16/32/64-bit
    Float = 0x01,
    /// Integer scaled by `lsb_value` and offset by `zero_value`
    ScaledInteger = 0x02,
    /// NUL-terminated UTF-8
    String = 0x03,
}

impl EncodingKind {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for EncodingKind {
    type Error = CodecError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x00 => Ok(Self::Timestamp),
            0x01 => Ok(Self::Float),
            0x02 => Ok(Self::ScaledInteger),
            0x03 => Ok(Self::String),
            other => Err(CodecError::UnsupportedEncoding(format!(
                "unknown encoding code 0x{other:02x}"
            ))),
        }
    }
}

impl std::fmt::Display for EncodingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timestamp => write!(f, "timestamp"),
            Self::Float => write!(f, "float"),
            Self::ScaledInteger => write!(f, "scaled_integer"),
            Self::String => write!(f, "string"),
        }
    }
}

/// One named, typed field of a data packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    /// Channel name, unique within a schema
    pub name: String,

    /// Display unit
    #[serde(default)]
    pub unit: String,

    /// Wire encoding
    pub encoding: EncodingKind,

    /// Width in bits (multiple of 8, 0 for strings)
    #[serde(default)]
    pub bits: u8,

    /// Signedness of scaled integers
    #[serde(default = "default_signed")]
    pub signed: bool,

    /// Value of one raw integer step
    #[serde(default = "default_lsb_value")]
    pub lsb_value: f64,

    /// Value of raw integer zero
    #[serde(default)]
    pub zero_value: f64,
}

fn default_signed() -> bool {
    true
}
fn default_lsb_value() -> f64 {
    1.0
}

impl ChannelDescriptor {
    /// Create a channel with default unit, width and scaling.
    pub fn new(name: impl Into<String>, encoding: EncodingKind) -> Self {
        Self {
            name: name.into(),
            unit: String::new(),
            encoding,
            bits: 0,
            signed: true,
            lsb_value: 1.0,
            zero_value: 0.0,
        }
    }

    /// The standard leading timestamp channel.
    pub fn timestamp() -> Self {
        Self::new(TIMESTAMP_CHANNEL, EncodingKind::Timestamp).with_bits(64)
    }

    pub fn float(name: impl Into<String>, bits: u8) -> Self {
        Self::new(name, EncodingKind::Float).with_bits(bits)
    }

    pub fn scaled(name: impl Into<String>, bits: u8) -> Self {
        Self::new(name, EncodingKind::ScaledInteger).with_bits(bits)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, EncodingKind::String)
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_bits(mut self, bits: u8) -> Self {
        self.bits = bits;
        self
    }

    pub fn with_signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    pub fn with_lsb(mut self, lsb_value: f64) -> Self {
        self.lsb_value = lsb_value;
        self
    }

    pub fn with_zero(mut self, zero_value: f64) -> Self {
        self.zero_value = zero_value;
        self
    }

    /// Copy of this channel under another name.
    ///
    /// Handy for sensors with several identical axes.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Whether this is exactly the standard timestamp channel.
    pub fn is_standard_timestamp(&self) -> bool {
        self.name == TIMESTAMP_CHANNEL
            && self.unit.is_empty()
            && self.encoding == EncodingKind::Timestamp
    }
}

/// A sensor's self-description: its name and ordered channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSchema {
    /// Human-readable sensor name
    pub name: String,

    /// Channels in wire order
    #[serde(default)]
    pub channels: Vec<ChannelDescriptor>,
}

impl SensorSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channels: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel: ChannelDescriptor) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn with_channels(mut self, channels: impl IntoIterator<Item = ChannelDescriptor>) -> Self {
        self.channels.extend(channels);
        self
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelDescriptor> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Whether packets may be built with `encode_raw`.
    ///
    /// Requires the first channel to be the standard timestamp channel.
    pub fn is_raw_eligible(&self) -> bool {
        self.channels
            .first()
            .is_some_and(ChannelDescriptor::is_standard_timestamp)
    }
}
