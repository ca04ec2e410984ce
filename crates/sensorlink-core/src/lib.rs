//! Sensor Encoding Core Crate
//!
//! Binary codecs for self-describing sensor data. A sensor advertises a
//! schema (its channels and their encodings); data packets are encoded and
//! decoded against that schema.
//!
//! ## Architecture
//!
//! - **SensorSchema**: named channel list, serialized by `schema_codec`
//! - **ReadingCodec**: validated per-channel codec (float, scaled integer,
//!   timestamp, string)
//! - **PacketCodec**: composes reading codecs into a whole-packet codec,
//!   including the raw fast path
//! - **RecordWriter / RecordReader**: length-prefixed record files
//!
//! This crate does no I/O beyond the record file helpers and never blocks.

pub mod error;
pub mod packet_codec;
pub mod reading_codec;
pub mod record;
pub mod schema;
pub mod schema_codec;
pub mod value;

mod wire;

pub use error::{CodecError, CodecResult};
pub use packet_codec::{PacketCodec, PacketLength};
pub use reading_codec::{encode_timestamp, FloatWidth, ReadingCodec, TIMESTAMP_LEN};
pub use record::{RecordReader, RecordWriter, MAX_ENTRY_LEN};
pub use schema::{ChannelDescriptor, EncodingKind, SensorSchema, SCHEMA_VERSION, TIMESTAMP_CHANNEL};
pub use schema_codec::{decode_schema, encode_schema, SchemaBlob};
pub use value::{DataPacket, ReadingValue, Readings};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
