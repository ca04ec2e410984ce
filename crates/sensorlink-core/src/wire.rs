//! Byte-level helpers shared by the schema and packet codecs.

use thiserror::Error;

/// Low-level read failure, mapped by callers onto their own error kind.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ReadError {
    #[error("expected {needed} bytes, {remaining} remaining")]
    Short { needed: usize, remaining: usize },

    #[error("string is not NUL-terminated")]
    Unterminated,

    #[error("string is not valid UTF-8")]
    InvalidUtf8,
}

/// Forward-only cursor over a byte slice.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ReadError> {
        if self.remaining() < n {
            return Err(ReadError::Short {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ReadError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_f64_be(&mut self) -> Result<f64, ReadError> {
        Ok(f64::from_be_bytes(self.take_array()?))
    }

    /// Read a NUL-terminated UTF-8 string, consuming the terminator.
    pub fn read_cstr(&mut self) -> Result<&'a str, ReadError> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(ReadError::Unterminated)?;
        let s = std::str::from_utf8(&rest[..end]).map_err(|_| ReadError::InvalidUtf8)?;
        self.pos += end + 1;
        Ok(s)
    }
}

/// Append `s` followed by a NUL terminator.
///
/// Returns `false` without writing when `s` itself contains a NUL.
pub(crate) fn write_cstr(out: &mut Vec<u8>, s: &str) -> bool {
    if s.as_bytes().contains(&0) {
        return false;
    }
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_cstr() {
        let mut r = ByteReader::new(b"abc\0de\0");
        assert_eq!(r.read_cstr().unwrap(), "abc");
        assert_eq!(r.read_cstr().unwrap(), "de");
        assert!(r.is_empty());
    }

    #[test]
    fn test_read_cstr_errors() {
        let mut r = ByteReader::new(b"abc");
        assert_eq!(r.read_cstr(), Err(ReadError::Unterminated));
        // Failed reads leave the cursor untouched
        assert_eq!(r.remaining(), 3);

        let mut r = ByteReader::new(&[0xff, 0xfe, 0x00]);
        assert_eq!(r.read_cstr(), Err(ReadError::InvalidUtf8));
    }

    #[test]
    fn test_short_read() {
        let mut r = ByteReader::new(&[1, 2]);
        assert_eq!(
            r.take(3),
            Err(ReadError::Short {
                needed: 3,
                remaining: 2
            })
        );
        assert_eq!(r.read_u8().unwrap(), 1);
    }

    #[test]
    fn test_write_cstr_rejects_nul() {
        let mut out = Vec::new();
        assert!(write_cstr(&mut out, "ok"));
        assert!(!write_cstr(&mut out, "a\0b"));
        assert_eq!(out, b"ok\0");
    }
}
