//! Per-channel value codecs.
//!
//! [`ReadingCodec::for_channel`] checks a channel descriptor once and
//! yields an immutable codec, so encode and decode never re-validate.
//!
//! | Kind          | Wire                                 | Constraints                                     |
//! |---------------|--------------------------------------|-------------------------------------------------|
//! | Float         | IEEE754 big-endian, 16/32/64 bit     | signed, lsb 1.0, zero 0.0                       |
//! | ScaledInteger | big-endian integer, `bits / 8` bytes | multiple of 8 bits, up to 248                   |
//! | Timestamp     | i64 big-endian microseconds          | no unit, signed, lsb 1.0, zero 0.0, 64 bits     |
//! | String        | UTF-8 + NUL                          | no unit, 0 bits, signed, lsb 1.0, zero 0.0      |

use chrono::{DateTime, Utc};
use half::f16;

use crate::error::{CodecError, CodecResult};
use crate::schema::{ChannelDescriptor, EncodingKind};
use crate::value::ReadingValue;
use crate::wire::{ByteReader, ReadError};

/// Size in bytes of an encoded timestamp.
pub const TIMESTAMP_LEN: usize = 8;

const MICROS_PER_SECOND: i64 = 1_000_000;

/// IEEE754 width of a float channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatWidth {
    Half,
    Single,
    Double,
}

impl FloatWidth {
    pub fn len(self) -> usize {
        match self {
            Self::Half => 2,
            Self::Single => 4,
            Self::Double => 8,
        }
    }
}

/// A validated value codec for one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingCodec {
    Float(FloatWidth),
    ScaledInteger {
        bytes: usize,
        signed: bool,
        lsb_value: f64,
        zero_value: f64,
    },
    Timestamp,
    String,
}

impl ReadingCodec {
    /// Build the codec for a channel, enforcing the rules of its kind.
    pub fn for_channel(channel: &ChannelDescriptor) -> CodecResult<Self> {
        let name = channel.name.as_str();

        if channel.bits % 8 != 0 {
            return Err(CodecError::UnsupportedEncoding(format!(
                "channel '{}': bits must be a multiple of 8, was {} (unaligned values are not implemented)",
                name, channel.bits
            )));
        }

        match channel.encoding {
            EncodingKind::Float => {
                require_unscaled(channel)?;
                let width = match channel.bits {
                    16 => FloatWidth::Half,
                    32 => FloatWidth::Single,
                    64 => FloatWidth::Double,
                    other => {
                        return Err(CodecError::validation(
                            name,
                            format!("unsupported bit length {other} for float, must be 16, 32, or 64"),
                        ))
                    }
                };
                Ok(Self::Float(width))
            }
            EncodingKind::ScaledInteger => {
                if channel.bits == 0 {
                    return Err(CodecError::validation(
                        name,
                        "scaled integer needs a non-zero bit length",
                    ));
                }
                Ok(Self::ScaledInteger {
                    bytes: channel.bits as usize / 8,
                    signed: channel.signed,
                    lsb_value: channel.lsb_value,
                    zero_value: channel.zero_value,
                })
            }
            EncodingKind::Timestamp => {
                require_no_unit(channel)?;
                require_unscaled(channel)?;
                if channel.bits != 64 {
                    return Err(CodecError::validation(
                        name,
                        format!("timestamp encoding must be 64 bits, was {}", channel.bits),
                    ));
                }
                Ok(Self::Timestamp)
            }
            EncodingKind::String => {
                require_no_unit(channel)?;
                if channel.bits != 0 {
                    return Err(CodecError::validation(
                        name,
                        "do not set bits for string encoding",
                    ));
                }
                require_unscaled(channel)?;
                Ok(Self::String)
            }
        }
    }

    /// Encoded size, or `None` for variable-length channels.
    pub fn fixed_len(&self) -> Option<usize> {
        match self {
            Self::Float(width) => Some(width.len()),
            Self::ScaledInteger { bytes, .. } => Some(*bytes),
            Self::Timestamp => Some(TIMESTAMP_LEN),
            Self::String => None,
        }
    }

    /// Append the encoded value for `channel` to `out`.
    pub fn encode(&self, channel: &str, value: &ReadingValue, out: &mut Vec<u8>) -> CodecResult<()> {
        match self {
            Self::Float(width) => {
                let v = expect_number(channel, value)?;
                encode_float(channel, *width, v, out)
            }
            Self::ScaledInteger {
                bytes,
                signed,
                lsb_value,
                zero_value,
            } => {
                let v = expect_number(channel, value)?;
                let scaled = (v - zero_value) / lsb_value;
                if !scaled.is_finite() {
                    return Err(CodecError::encode(
                        channel,
                        format!(
                            "{v} does not scale to a finite integer (lsb_value {lsb_value}, zero_value {zero_value})"
                        ),
                    ));
                }
                write_int(channel, scaled.round_ties_even(), *bytes, *signed, out)
            }
            Self::Timestamp => {
                let ts = value.as_timestamp().ok_or_else(|| mismatch(channel, "timestamp", value))?;
                out.extend_from_slice(&encode_timestamp(ts));
                Ok(())
            }
            Self::String => {
                let s = value.as_str().ok_or_else(|| mismatch(channel, "string", value))?;
                if s.as_bytes().contains(&0) {
                    return Err(CodecError::encode(channel, "string contains NUL"));
                }
                out.extend_from_slice(s.as_bytes());
                out.push(0);
                Ok(())
            }
        }
    }

    pub(crate) fn decode(&self, channel: &str, reader: &mut ByteReader<'_>) -> CodecResult<ReadingValue> {
        let fail = |e: ReadError| CodecError::PacketDecode(format!("channel '{channel}': {e}"));
        match self {
            Self::Float(FloatWidth::Half) => {
                let v = f16::from_be_bytes(reader.take_array().map_err(fail)?);
                Ok(ReadingValue::Number(v.to_f64()))
            }
            Self::Float(FloatWidth::Single) => {
                let v = f32::from_be_bytes(reader.take_array().map_err(fail)?);
                Ok(ReadingValue::Number(v as f64))
            }
            Self::Float(FloatWidth::Double) => {
                Ok(ReadingValue::Number(reader.read_f64_be().map_err(fail)?))
            }
            Self::ScaledInteger {
                bytes,
                signed,
                lsb_value,
                zero_value,
            } => {
                let raw = read_int(reader.take(*bytes).map_err(fail)?, *signed);
                Ok(ReadingValue::Number(raw * lsb_value + zero_value))
            }
            Self::Timestamp => {
                let micros = i64::from_be_bytes(reader.take_array().map_err(fail)?);
                let ts = decode_timestamp(micros).ok_or_else(|| {
                    CodecError::PacketDecode(format!(
                        "channel '{channel}': timestamp {micros}us is out of range"
                    ))
                })?;
                Ok(ReadingValue::Timestamp(ts))
            }
            Self::String => {
                let s = reader.read_cstr().map_err(fail)?;
                Ok(ReadingValue::Text(s.to_string()))
            }
        }
    }
}

/// Encode a timestamp as big-endian microseconds since the Unix epoch.
///
/// Sub-microsecond precision is truncated.
pub fn encode_timestamp(ts: DateTime<Utc>) -> [u8; TIMESTAMP_LEN] {
    ts.timestamp_micros().to_be_bytes()
}

fn decode_timestamp(micros: i64) -> Option<DateTime<Utc>> {
    let secs = micros.div_euclid(MICROS_PER_SECOND);
    let nanos = micros.rem_euclid(MICROS_PER_SECOND) as u32 * 1_000;
    DateTime::from_timestamp(secs, nanos)
}

fn require_no_unit(channel: &ChannelDescriptor) -> CodecResult<()> {
    if !channel.unit.is_empty() {
        return Err(CodecError::validation(
            &channel.name,
            format!("do not set unit for {} encoding", channel.encoding),
        ));
    }
    Ok(())
}

fn require_unscaled(channel: &ChannelDescriptor) -> CodecResult<()> {
    let kind = channel.encoding;
    if !channel.signed {
        return Err(CodecError::validation(
            &channel.name,
            format!("do not set signed for {kind} encoding"),
        ));
    }
    if channel.lsb_value != 1.0 {
        return Err(CodecError::validation(
            &channel.name,
            format!("do not set lsb_value for {kind} encoding"),
        ));
    }
    if channel.zero_value != 0.0 {
        return Err(CodecError::validation(
            &channel.name,
            format!("do not set zero_value for {kind} encoding"),
        ));
    }
    Ok(())
}

fn expect_number(channel: &str, value: &ReadingValue) -> CodecResult<f64> {
    value.as_f64().ok_or_else(|| mismatch(channel, "number", value))
}

fn mismatch(channel: &str, expected: &str, value: &ReadingValue) -> CodecError {
    CodecError::encode(
        channel,
        format!("expected a {expected} value, got a {}", value.kind_name()),
    )
}

fn encode_float(channel: &str, width: FloatWidth, v: f64, out: &mut Vec<u8>) -> CodecResult<()> {
    let overflow = |narrowed_inf: bool| narrowed_inf && v.is_finite();
    match width {
        FloatWidth::Half => {
            let h = f16::from_f64(v);
            if overflow(h.is_infinite()) {
                return Err(CodecError::encode(channel, format!("{v} overflows float16")));
            }
            out.extend_from_slice(&h.to_be_bytes());
        }
        FloatWidth::Single => {
            let s = v as f32;
            if overflow(s.is_infinite()) {
                return Err(CodecError::encode(channel, format!("{v} overflows float32")));
            }
            out.extend_from_slice(&s.to_be_bytes());
        }
        FloatWidth::Double => out.extend_from_slice(&v.to_be_bytes()),
    }
    Ok(())
}

/// Exact `2^n` for `n` below 1024.
fn pow2(n: u32) -> f64 {
    f64::from_bits((1023 + n as u64) << 52)
}

/// Range-check an integral value and append it as a `bytes`-wide
/// big-endian two's-complement integer.
fn write_int(channel: &str, raw: f64, bytes: usize, signed: bool, out: &mut Vec<u8>) -> CodecResult<()> {
    let bits = bytes as u32 * 8;
    let (min, limit) = if signed {
        (-pow2(bits - 1), pow2(bits - 1))
    } else {
        (0.0, pow2(bits))
    };
    if !raw.is_finite() || raw < min || raw >= limit {
        return Err(CodecError::encode(
            channel,
            format!(
                "raw value {raw} does not fit a {} {bits}-bit integer",
                if signed { "signed" } else { "unsigned" }
            ),
        ));
    }

    let mut buf = magnitude_bytes(raw.abs(), bytes);
    if raw < 0.0 {
        negate(&mut buf);
    }
    out.extend_from_slice(&buf);
    Ok(())
}

/// Big-endian bytes of a non-negative integral `mag` that fits in `len` bytes.
fn magnitude_bytes(mag: f64, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    if mag == 0.0 {
        return buf;
    }
    // mag >= 1, so it is a normal float
    let repr = mag.to_bits();
    let exponent = ((repr >> 52) & 0x7ff) as i32 - 1075;
    let mut mantissa = (repr & ((1u64 << 52) - 1)) | (1u64 << 52);
    let shift = if exponent < 0 {
        mantissa >>= exponent.unsigned_abs();
        0
    } else {
        exponent as usize
    };

    let wide = (mantissa as u128) << (shift % 8);
    for k in 0..9 {
        let idx = shift / 8 + k;
        if idx < len {
            buf[len - 1 - idx] = (wide >> (8 * k)) as u8;
        }
    }
    buf
}

/// Two's-complement negation in place.
fn negate(buf: &mut [u8]) {
    let mut carry = true;
    for b in buf.iter_mut().rev() {
        let (v, c) = (!*b).overflowing_add(carry as u8);
        *b = v;
        carry = c;
    }
}

/// Value of a big-endian integer of any width, correctly rounded to f64.
fn read_int(bytes: &[u8], signed: bool) -> f64 {
    let negative = signed && bytes.first().is_some_and(|b| b & 0x80 != 0);
    if negative {
        let mut mag = bytes.to_vec();
        negate(&mut mag);
        -magnitude_to_f64(&mag)
    } else {
        magnitude_to_f64(bytes)
    }
}

fn magnitude_to_f64(bytes: &[u8]) -> f64 {
    let be_u128 = |b: &[u8]| b.iter().fold(0u128, |acc, x| (acc << 8) | *x as u128);
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    let digits = &bytes[start..];
    if digits.len() <= 16 {
        return be_u128(digits) as f64;
    }
    // Keep 128 leading bits plus a sticky bit for the rest
    let (head, tail) = digits.split_at(16);
    let mut top = be_u128(head);
    if tail.iter().any(|&b| b != 0) {
        top |= 1;
    }
    top as f64 * pow2(8 * tail.len() as u32)
}
