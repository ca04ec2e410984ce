//! Record files.
//!
//! A record file holds one sensor schema and the data packets recorded
//! against it, as a flat sequence of length-prefixed entries:
//!
//! ```text
//! entry = len:u16be | bytes[len]
//! file  = entry(schema blob) | entry(data packet)*
//! ```

use std::io::{ErrorKind, Read, Write};

use crate::error::{CodecError, CodecResult};
use crate::packet_codec::PacketCodec;

/// Largest entry a record file can hold.
pub const MAX_ENTRY_LEN: usize = u16::MAX as usize;

fn write_entry<W: Write>(out: &mut W, data: &[u8]) -> CodecResult<()> {
    let len = u16::try_from(data.len()).map_err(|_| {
        CodecError::PacketEncode {
            channel: String::new(),
            reason: format!("entry too large: {} bytes (max {MAX_ENTRY_LEN})", data.len()),
        }
    })?;
    out.write_all(&len.to_be_bytes())?;
    out.write_all(data)?;
    Ok(())
}

/// Read one entry. `Ok(None)` at a clean end of input.
fn read_entry<R: Read>(input: &mut R) -> CodecResult<Option<Vec<u8>>> {
    let mut header = [0u8; 2];
    let mut filled = 0;
    while filled < header.len() {
        match input.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(CodecError::PacketDecode(
                    "record entry header is truncated".into(),
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let len = u16::from_be_bytes(header) as usize;
    let mut data = vec![0u8; len];
    input.read_exact(&mut data).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => {
            CodecError::PacketDecode(format!("record entry of {len} bytes is truncated"))
        }
        _ => e.into(),
    })?;
    Ok(Some(data))
}

/// Appends packets for one schema to a record file.
pub struct RecordWriter<W: Write> {
    out: W,
    schema_blob: Vec<u8>,
    packets: u64,
}

impl<W: Write> RecordWriter<W> {
    /// Start a recording by writing the schema entry.
    pub fn create(mut out: W, schema_blob: &[u8]) -> CodecResult<Self> {
        write_entry(&mut out, schema_blob)?;
        Ok(Self {
            out,
            schema_blob: schema_blob.to_vec(),
            packets: 0,
        })
    }

    pub fn write_packet(&mut self, packet: &[u8]) -> CodecResult<()> {
        write_entry(&mut self.out, packet)?;
        self.packets += 1;
        Ok(())
    }

    /// Schema blob this recording was started with.
    pub fn schema_blob(&self) -> &[u8] {
        &self.schema_blob
    }

    /// Number of data packets written so far.
    pub fn packet_count(&self) -> u64 {
        self.packets
    }

    pub fn flush(&mut self) -> CodecResult<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Reads a record file back.
pub struct RecordReader<R: Read> {
    input: R,
    codec: PacketCodec,
}

impl<R: Read> RecordReader<R> {
    /// Read the schema entry and build its codec.
    pub fn open(mut input: R) -> CodecResult<Self> {
        let blob = read_entry(&mut input)?
            .ok_or_else(|| CodecError::SchemaDecode("record file is empty".into()))?;
        let codec = PacketCodec::from_blob(&blob)?;
        Ok(Self { input, codec })
    }

    pub fn codec(&self) -> &PacketCodec {
        &self.codec
    }

    /// Next raw packet, `None` at the end of the file.
    pub fn next_packet(&mut self) -> CodecResult<Option<Vec<u8>>> {
        read_entry(&mut self.input)
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = CodecResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet().transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::schema::{ChannelDescriptor, SensorSchema};

    fn codec() -> PacketCodec {
        PacketCodec::from_schema(
            SensorSchema::new("rec")
                .with_channel(ChannelDescriptor::timestamp())
                .with_channel(ChannelDescriptor::scaled("x", 16)),
        )
        .unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let codec = codec();
        let mut writer = RecordWriter::create(Vec::new(), codec.blob().as_bytes()).unwrap();
        let p1 = codec.encode_raw(&[0x00, 0x01], None).unwrap();
        let p2 = codec.encode_raw(&[0x00, 0x02], None).unwrap();
        writer.write_packet(&p1).unwrap();
        writer.write_packet(&p2).unwrap();
        assert_eq!(writer.packet_count(), 2);

        let bytes = writer.into_inner();
        assert_eq!(&bytes[..2], &(codec.blob().len() as u16).to_be_bytes());

        let mut reader = RecordReader::open(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.codec().blob(), codec.blob());
        assert_eq!(reader.next_packet().unwrap(), Some(p1));
        assert_eq!(reader.next_packet().unwrap(), Some(p2));
        assert_eq!(reader.next_packet().unwrap(), None);
    }

    #[test]
    fn test_truncated_entry() {
        let codec = codec();
        let mut writer = RecordWriter::create(Vec::new(), codec.blob().as_bytes()).unwrap();
        writer.write_packet(&[1, 2, 3, 4]).unwrap();
        let mut bytes = writer.into_inner();
        bytes.pop();

        let mut reader = RecordReader::open(Cursor::new(bytes.clone())).unwrap();
        assert!(matches!(reader.next_packet(), Err(CodecError::PacketDecode(_))));

        // Half a length header
        bytes.truncate(codec.blob().len() + 3);
        let mut reader = RecordReader::open(Cursor::new(bytes)).unwrap();
        assert!(matches!(reader.next_packet(), Err(CodecError::PacketDecode(_))));
    }

    #[test]
    fn test_empty_file() {
        assert!(matches!(
            RecordReader::open(Cursor::new(Vec::new())),
            Err(CodecError::SchemaDecode(_))
        ));
    }

    #[test]
    fn test_oversized_packet() {
        let codec = codec();
        let mut writer = RecordWriter::create(Vec::new(), codec.blob().as_bytes()).unwrap();
        let big = vec![0u8; MAX_ENTRY_LEN + 1];
        assert!(writer.write_packet(&big).is_err());
        assert_eq!(writer.packet_count(), 0);
    }

    #[test]
    fn test_iterator() {
        let codec = codec();
        let mut writer = RecordWriter::create(Vec::new(), codec.blob().as_bytes()).unwrap();
        for i in 0..3u8 {
            writer.write_packet(&codec.encode_raw(&[0, i], None).unwrap()).unwrap();
        }
        let reader = RecordReader::open(Cursor::new(writer.into_inner())).unwrap();
        let packets: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(packets.len(), 3);
    }
}
