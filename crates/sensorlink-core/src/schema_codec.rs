//! Binary schema codec.
//!
//! ```text
//! version:u8 (=1) | name:cstr | channel_count:u8 | channel*
//! channel = len:u8 | name:cstr | unit:cstr | encoding:u8 | bits:u8
//!           | signed:u8 | lsb_value:f64be | zero_value:f64be
//! ```
//!
//! Decoding is strict: every channel record and the blob itself must be
//! consumed exactly. Two schemas are the same schema iff their blobs are
//! byte-identical, which is why [`SchemaBlob`] is the unit of comparison.

use crate::error::{CodecError, CodecResult};
use crate::schema::{ChannelDescriptor, EncodingKind, SensorSchema, SCHEMA_VERSION};
use crate::wire::{write_cstr, ByteReader, ReadError};

/// Canonical serialized bytes of a [`SensorSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaBlob(Vec<u8>);

impl SchemaBlob {
    /// Wrap bytes that are known to decode as a schema.
    pub(crate) fn from_wire(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for SchemaBlob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq<[u8]> for SchemaBlob {
    fn eq(&self, other: &[u8]) -> bool {
        self.0 == other
    }
}

impl From<SchemaBlob> for Vec<u8> {
    fn from(blob: SchemaBlob) -> Self {
        blob.0
    }
}

/// Serialize a schema. Deterministic: equal schemas give equal blobs.
pub fn encode_schema(schema: &SensorSchema) -> CodecResult<SchemaBlob> {
    let count = u8::try_from(schema.channels.len()).map_err(|_| {
        CodecError::SchemaEncode(format!(
            "{} channels, at most 255 are supported",
            schema.channels.len()
        ))
    })?;

    let mut out = vec![SCHEMA_VERSION];
    if !write_cstr(&mut out, &schema.name) {
        return Err(CodecError::SchemaEncode(format!(
            "sensor name {:?} contains NUL",
            schema.name
        )));
    }
    out.push(count);

    let mut record = Vec::with_capacity(64);
    for channel in &schema.channels {
        record.clear();
        encode_channel(channel, &mut record)?;
        let len = u8::try_from(record.len()).map_err(|_| {
            CodecError::SchemaEncode(format!(
                "channel '{}' record is {} bytes, at most 255 are supported",
                channel.name,
                record.len()
            ))
        })?;
        out.push(len);
        out.extend_from_slice(&record);
    }

    Ok(SchemaBlob(out))
}

fn encode_channel(channel: &ChannelDescriptor, out: &mut Vec<u8>) -> CodecResult<()> {
    for (field, value) in [("name", &channel.name), ("unit", &channel.unit)] {
        if !write_cstr(out, value) {
            return Err(CodecError::SchemaEncode(format!(
                "channel {} {:?} contains NUL",
                field, value
            )));
        }
    }
    out.push(channel.encoding.code());
    out.push(channel.bits);
    out.push(u8::from(channel.signed));
    out.extend_from_slice(&channel.lsb_value.to_be_bytes());
    out.extend_from_slice(&channel.zero_value.to_be_bytes());
    Ok(())
}

/// Parse a schema blob.
///
/// Fails on a wrong version byte, unterminated or non-UTF-8 strings, an
/// unknown encoding code, short reads, and trailing bytes either inside a
/// channel record or after the last channel.
pub fn decode_schema(blob: &[u8]) -> CodecResult<SensorSchema> {
    let mut reader = ByteReader::new(blob);

    let version = reader.read_u8().map_err(|e| decode_err("version", e))?;
    if version != SCHEMA_VERSION {
        return Err(CodecError::SchemaDecode(format!(
            "unsupported schema version {version}, expected {SCHEMA_VERSION}"
        )));
    }

    let name = reader.read_cstr().map_err(|e| decode_err("sensor name", e))?;
    let count = reader.read_u8().map_err(|e| decode_err("channel count", e))?;

    let mut channels = Vec::with_capacity(count as usize);
    for index in 0..count {
        let len = reader
            .read_u8()
            .map_err(|e| decode_err(&format!("channel {index} length"), e))?;
        let record = reader
            .take(len as usize)
            .map_err(|e| decode_err(&format!("channel {index}"), e))?;
        channels.push(decode_channel(index, record)?);
    }

    if !reader.is_empty() {
        return Err(CodecError::SchemaDecode(format!(
            "{} trailing bytes after last channel",
            reader.remaining()
        )));
    }

    Ok(SensorSchema {
        name: name.to_string(),
        channels,
    })
}

fn decode_channel(index: u8, record: &[u8]) -> CodecResult<ChannelDescriptor> {
    let mut r = ByteReader::new(record);
    let ctx = |field: &str| format!("channel {index} {field}");

    let name = r.read_cstr().map_err(|e| decode_err(&ctx("name"), e))?;
    let unit = r.read_cstr().map_err(|e| decode_err(&ctx("unit"), e))?;
    let code = r.read_u8().map_err(|e| decode_err(&ctx("encoding"), e))?;
    let encoding = EncodingKind::try_from(code)
        .map_err(|e| CodecError::SchemaDecode(format!("{}: {}", ctx("encoding"), e)))?;
    let bits = r.read_u8().map_err(|e| decode_err(&ctx("bits"), e))?;
    let signed = r.read_u8().map_err(|e| decode_err(&ctx("signed"), e))? != 0;
    let lsb_value = r.read_f64_be().map_err(|e| decode_err(&ctx("lsb_value"), e))?;
    let zero_value = r.read_f64_be().map_err(|e| decode_err(&ctx("zero_value"), e))?;

    if !r.is_empty() {
        return Err(CodecError::SchemaDecode(format!(
            "{} trailing bytes in channel {index} record",
            r.remaining()
        )));
    }

    Ok(ChannelDescriptor {
        name: name.to_string(),
        unit: unit.to_string(),
        encoding,
        bits,
        signed,
        lsb_value,
        zero_value,
    })
}

fn decode_err(what: &str, e: ReadError) -> CodecError {
    CodecError::SchemaDecode(format!("{what}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_schema() -> SensorSchema {
        SensorSchema::new("CPU Temperature")
            .with_channel(ChannelDescriptor::timestamp())
            .with_channel(ChannelDescriptor::float("cpu_temp", 32).with_unit("°C"))
            .with_channel(ChannelDescriptor::scaled("open_files", 32).with_signed(false))
            .with_channel(ChannelDescriptor::string("status"))
    }

    #[test]
    fn test_encode_layout() {
        let schema = SensorSchema::new("t").with_channel(ChannelDescriptor::timestamp());
        let blob = encode_schema(&schema).unwrap();

        let mut expected = vec![0x01, b't', 0x00, 0x01];
        let mut record = b"timestamp\0\0".to_vec();
        record.extend_from_slice(&[0x00, 64, 0x01]);
        record.extend_from_slice(&1.0f64.to_be_bytes());
        record.extend_from_slice(&0.0f64.to_be_bytes());
        expected.push(record.len() as u8);
        expected.extend_from_slice(&record);

        assert_eq!(blob.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_roundtrip() {
        let schema = cpu_schema();
        let blob = encode_schema(&schema).unwrap();
        let decoded = decode_schema(blob.as_bytes()).unwrap();
        assert_eq!(decoded, schema);
        assert_eq!(encode_schema(&decoded).unwrap(), blob);
    }

    #[test]
    fn test_zero_channels() {
        let schema = SensorSchema::new("");
        let blob = encode_schema(&schema).unwrap();
        assert_eq!(blob.as_bytes(), &[0x01, 0x00, 0x00]);
        assert_eq!(decode_schema(blob.as_bytes()).unwrap(), schema);
    }

    #[test]
    fn test_bad_version() {
        let mut blob = encode_schema(&cpu_schema()).unwrap().into_vec();
        blob[0] = 0x02;
        let err = decode_schema(&blob).unwrap_err();
        assert!(matches!(err, CodecError::SchemaDecode(_)));
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut blob = encode_schema(&cpu_schema()).unwrap().into_vec();
        blob.push(0x00);
        assert!(matches!(
            decode_schema(&blob),
            Err(CodecError::SchemaDecode(_))
        ));
    }

    #[test]
    fn test_trailing_bytes_in_record() {
        let schema = SensorSchema::new("s").with_channel(ChannelDescriptor::string("x"));
        let mut blob = encode_schema(&schema).unwrap().into_vec();
        // Grow the record length prefix and append a stray byte inside it
        blob[4] += 1;
        blob.push(0xAA);
        let err = decode_schema(&blob).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn test_truncated() {
        let blob = encode_schema(&cpu_schema()).unwrap().into_vec();
        for cut in [0, 1, 5, blob.len() - 1] {
            assert!(
                matches!(decode_schema(&blob[..cut]), Err(CodecError::SchemaDecode(_))),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn test_unknown_encoding() {
        let schema = SensorSchema::new("s").with_channel(ChannelDescriptor::string("x"));
        let mut blob = encode_schema(&schema).unwrap().into_vec();
        // version, "s\0", count, len, "x\0", "\0" -> encoding byte
        blob[8] = 0x09;
        let err = decode_schema(&blob).unwrap_err();
        assert!(matches!(err, CodecError::SchemaDecode(_)));
        assert!(err.to_string().contains("0x09"));
    }

    #[test]
    fn test_invalid_utf8_name() {
        let blob = [0x01, 0xff, 0xfe, 0x00, 0x00];
        assert!(matches!(
            decode_schema(&blob),
            Err(CodecError::SchemaDecode(_))
        ));
    }

    #[test]
    fn test_unterminated_name() {
        let blob = [0x01, b'a', b'b'];
        let err = decode_schema(&blob).unwrap_err();
        assert!(err.to_string().contains("NUL"));
    }

    #[test]
    fn test_nul_in_name_rejected() {
        let schema = SensorSchema::new("bad\0name");
        assert!(matches!(
            encode_schema(&schema),
            Err(CodecError::SchemaEncode(_))
        ));
    }

    #[test]
    fn test_oversized_record_rejected() {
        let schema = SensorSchema::new("s").with_channel(ChannelDescriptor::string("x".repeat(250)));
        assert!(matches!(
            encode_schema(&schema),
            Err(CodecError::SchemaEncode(_))
        ));
    }
}
