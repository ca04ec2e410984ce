//! Data packet codec.
//!
//! A [`PacketCodec`] is built once per schema from the per-channel
//! [`ReadingCodec`]s and is immutable afterwards, so it can be shared
//! behind an `Arc` and used from any number of callers.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::{CodecError, CodecResult};
use crate::reading_codec::{encode_timestamp, ReadingCodec, TIMESTAMP_LEN};
use crate::schema::{EncodingKind, SensorSchema, TIMESTAMP_CHANNEL};
use crate::schema_codec::{decode_schema, encode_schema, SchemaBlob};
use crate::value::{DataPacket, Readings};
use crate::wire::ByteReader;

/// Encoded size of a data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketLength {
    /// Every packet has exactly this many bytes
    Fixed(usize),
    /// At least one channel is variable-length
    Dynamic,
}

impl PacketLength {
    pub fn fixed(self) -> Option<usize> {
        match self {
            Self::Fixed(n) => Some(n),
            Self::Dynamic => None,
        }
    }
}

impl std::fmt::Display for PacketLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n} byte"),
            Self::Dynamic => write!(f, "dynamic"),
        }
    }
}

#[derive(Debug)]
struct ChannelCodec {
    name: String,
    codec: ReadingCodec,
}

/// Encoder/decoder for the data packets of one sensor schema.
#[derive(Debug)]
pub struct PacketCodec {
    schema: SensorSchema,
    blob: SchemaBlob,
    channels: Vec<ChannelCodec>,
    length: PacketLength,
    raw_eligible: bool,
}

impl PacketCodec {
    /// Build a codec from a schema model.
    pub fn from_schema(schema: SensorSchema) -> CodecResult<Self> {
        let blob = encode_schema(&schema)?;
        Self::build(schema, blob)
    }

    /// Build a codec from a schema blob received on the wire.
    ///
    /// The bytes are kept verbatim: they are what [`PacketCodec::blob`]
    /// returns and what later metadata messages are compared against.
    pub fn from_blob(blob: &[u8]) -> CodecResult<Self> {
        let schema = decode_schema(blob)?;
        Self::build(schema, SchemaBlob::from_wire(blob))
    }

    fn build(schema: SensorSchema, blob: SchemaBlob) -> CodecResult<Self> {
        let mut seen = HashSet::with_capacity(schema.channels.len());
        let mut channels = Vec::with_capacity(schema.channels.len());
        let mut fixed_len = Some(0usize);

        for channel in &schema.channels {
            if !seen.insert(channel.name.as_str()) {
                return Err(CodecError::validation(&channel.name, "duplicate channel name"));
            }
            let codec = ReadingCodec::for_channel(channel)?;
            fixed_len = fixed_len.zip(codec.fixed_len()).map(|(a, b)| a + b);
            channels.push(ChannelCodec {
                name: channel.name.clone(),
                codec,
            });
        }

        let length = fixed_len.map_or(PacketLength::Dynamic, PacketLength::Fixed);
        let raw_eligible = schema.is_raw_eligible();
        tracing::debug!(
            sensor = %schema.name,
            channels = channels.len(),
            length = %length,
            raw_eligible,
            "Built packet codec"
        );

        Ok(Self {
            schema,
            blob,
            channels,
            length,
            raw_eligible,
        })
    }

    pub fn schema(&self) -> &SensorSchema {
        &self.schema
    }

    pub fn blob(&self) -> &SchemaBlob {
        &self.blob
    }

    pub fn length(&self) -> PacketLength {
        self.length
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Whether [`PacketCodec::encode_raw`] may be used.
    pub fn supports_raw(&self) -> bool {
        self.raw_eligible
    }

    /// Encode one packet.
    ///
    /// Channels are written in schema order regardless of the order of
    /// `readings`. Timestamp channels that are missing from `readings`
    /// default to the current time; the `timestamp` channel takes
    /// `timestamp` when given. Any other missing channel is an error, and
    /// so is a reading whose name is not a channel of this schema.
    pub fn encode(&self, readings: &Readings, timestamp: Option<DateTime<Utc>>) -> CodecResult<Vec<u8>> {
        if let Some(unknown) = readings
            .keys()
            .find(|name| !self.channels.iter().any(|c| &c.name == *name))
        {
            return Err(CodecError::encode(unknown, "not a channel of this schema"));
        }

        let now = Utc::now();
        let mut out = Vec::with_capacity(self.length.fixed().unwrap_or(64));
        for ch in &self.channels {
            let is_timestamp = matches!(ch.codec, ReadingCodec::Timestamp);
            let override_ts = timestamp.filter(|_| is_timestamp && ch.name == TIMESTAMP_CHANNEL);
            match (override_ts, readings.get(&ch.name)) {
                (Some(ts), _) => out.extend_from_slice(&encode_timestamp(ts)),
                (None, Some(value)) => ch.codec.encode(&ch.name, value, &mut out)?,
                (None, None) if is_timestamp => out.extend_from_slice(&encode_timestamp(now)),
                (None, None) => return Err(CodecError::encode(&ch.name, "missing value")),
            }
        }
        Ok(out)
    }

    /// Prepend a timestamp to bytes that already match the wire layout of
    /// every channel after the leading timestamp.
    ///
    /// No scaling or validation of the payload takes place. The length is
    /// checked only when the packet length is fixed.
    pub fn encode_raw(&self, raw: &[u8], timestamp: Option<DateTime<Utc>>) -> CodecResult<Vec<u8>> {
        if !self.raw_eligible {
            return Err(CodecError::Precondition(format!(
                "schema '{}' does not support encode_raw: its first channel must be the standard timestamp channel",
                self.schema.name
            )));
        }

        if let PacketLength::Fixed(total) = self.length {
            let expected = total - TIMESTAMP_LEN;
            if raw.len() != expected {
                return Err(CodecError::RawLengthMismatch {
                    expected,
                    actual: raw.len(),
                });
            }
        }

        let mut out = Vec::with_capacity(TIMESTAMP_LEN + raw.len());
        out.extend_from_slice(&encode_timestamp(timestamp.unwrap_or_else(Utc::now)));
        out.extend_from_slice(raw);
        Ok(out)
    }

    /// Decode one packet. The bytes must be consumed exactly.
    pub fn decode(&self, data: &[u8]) -> CodecResult<DataPacket> {
        if let PacketLength::Fixed(n) = self.length {
            if data.len() != n {
                return Err(CodecError::PacketDecode(format!(
                    "packet is {} bytes, expected {}",
                    data.len(),
                    n
                )));
            }
        }

        let mut reader = ByteReader::new(data);
        let mut packet = DataPacket::with_capacity(self.channels.len());
        for ch in &self.channels {
            let value = ch.codec.decode(&ch.name, &mut reader)?;
            packet.push(&ch.name, value);
        }

        if !reader.is_empty() {
            return Err(CodecError::PacketDecode(format!(
                "{} trailing bytes after last channel",
                reader.remaining()
            )));
        }
        Ok(packet)
    }

    /// Names of the channels with the given encoding, in schema order.
    pub fn channels_of(&self, kind: EncodingKind) -> impl Iterator<Item = &str> {
        self.schema
            .channels
            .iter()
            .filter(move |c| c.encoding == kind)
            .map(|c| c.name.as_str())
    }
}
