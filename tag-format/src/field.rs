//! Fixed-width field primitives shared by chunk codecs.
//!
//! Every writer in this module emits exactly the number of bytes its slot
//! declares, whatever the input. Read paths fail only when the stream runs out
//! of bytes; write paths never fail on bad input, they substitute the field's
//! default and report a [`Warning`](crate::Warning) instead.

use std::fmt;
use std::io::{Read, Result, Write};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::warning::{emit, WarningSink};

/// Byte order of multi-byte integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    pub(crate) fn read_u32<R: Read>(self, reader: &mut R) -> Result<u32> {
        match self {
            Endian::Little => reader.read_u32::<LittleEndian>(),
            Endian::Big => reader.read_u32::<BigEndian>(),
        }
    }

    pub(crate) fn write_u32<W: Write>(self, writer: &mut W, value: u32) -> Result<()> {
        match self {
            Endian::Little => writer.write_u32::<LittleEndian>(value),
            Endian::Big => writer.write_u32::<BigEndian>(value),
        }
    }
}

/// Decode single-byte-per-character text.
pub fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode text one byte per character; anything outside Latin-1 becomes `?`.
pub fn latin1_encode(value: &str) -> Vec<u8> {
    value
        .chars()
        .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
        .collect()
}

/// Strip NUL fill and surrounding whitespace from decoded fixed-slot text.
pub fn clean_text(bytes: &[u8]) -> String {
    let text = latin1_decode(bytes);
    text.trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .trim_start()
        .to_string()
}

/// Read exactly `len` bytes of text. Returns `""` when only fill remains.
pub fn read_fixed_text<R: Read>(reader: &mut R, len: usize) -> Result<String> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(clean_text(&buf))
}

/// `value` truncated or right-padded with `padding` to exactly `len` bytes.
pub fn fixed_text_bytes(value: &str, len: usize, padding: u8) -> Vec<u8> {
    let mut bytes = latin1_encode(value);
    bytes.truncate(len);
    bytes.resize(len, padding);
    bytes
}

pub fn write_fixed_text<W: Write>(writer: &mut W, value: &str, len: usize, padding: u8) -> Result<()> {
    writer.write_all(&fixed_text_bytes(value, len, padding))
}

/// Width and signedness of an integer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    I16,
    U16,
    U64,
}

impl IntWidth {
    pub fn size(self) -> usize {
        match self {
            IntWidth::I16 | IntWidth::U16 => 2,
            IntWidth::U64 => 8,
        }
    }
}

/// An integer value tagged with the width of the slot it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntField {
    I16(i16),
    U16(u16),
    U64(u64),
}

impl IntField {
    pub fn width(self) -> IntWidth {
        match self {
            IntField::I16(_) => IntWidth::I16,
            IntField::U16(_) => IntWidth::U16,
            IntField::U64(_) => IntWidth::U64,
        }
    }

    /// Parse `raw` in the given width. `None` when it is not an integer or
    /// does not fit.
    pub fn parse(width: IntWidth, raw: &str) -> Option<IntField> {
        let raw = raw.trim();
        match width {
            IntWidth::I16 => raw.parse().ok().map(IntField::I16),
            IntWidth::U16 => raw.parse().ok().map(IntField::U16),
            IntWidth::U64 => raw.parse().ok().map(IntField::U64),
        }
    }
}

impl fmt::Display for IntField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntField::I16(v) => write!(f, "{}", v),
            IntField::U16(v) => write!(f, "{}", v),
            IntField::U64(v) => write!(f, "{}", v),
        }
    }
}

pub fn read_int_field<R: Read>(reader: &mut R, width: IntWidth, endian: Endian) -> Result<IntField> {
    Ok(match (width, endian) {
        (IntWidth::I16, Endian::Little) => IntField::I16(reader.read_i16::<LittleEndian>()?),
        (IntWidth::I16, Endian::Big) => IntField::I16(reader.read_i16::<BigEndian>()?),
        (IntWidth::U16, Endian::Little) => IntField::U16(reader.read_u16::<LittleEndian>()?),
        (IntWidth::U16, Endian::Big) => IntField::U16(reader.read_u16::<BigEndian>()?),
        (IntWidth::U64, Endian::Little) => IntField::U64(reader.read_u64::<LittleEndian>()?),
        (IntWidth::U64, Endian::Big) => IntField::U64(reader.read_u64::<BigEndian>()?),
    })
}

fn write_int<W: Write>(writer: &mut W, value: IntField, endian: Endian) -> Result<()> {
    match (value, endian) {
        (IntField::I16(v), Endian::Little) => writer.write_i16::<LittleEndian>(v),
        (IntField::I16(v), Endian::Big) => writer.write_i16::<BigEndian>(v),
        (IntField::U16(v), Endian::Little) => writer.write_u16::<LittleEndian>(v),
        (IntField::U16(v), Endian::Big) => writer.write_u16::<BigEndian>(v),
        (IntField::U64(v), Endian::Little) => writer.write_u64::<LittleEndian>(v),
        (IntField::U64(v), Endian::Big) => writer.write_u64::<BigEndian>(v),
    }
}

/// Write the integer held in `raw` using the width of `default`. A missing
/// value writes `default`; an unparseable one writes `default` and warns.
pub fn write_int_field<W: Write>(
    writer: &mut W,
    field: &str,
    raw: Option<&str>,
    default: IntField,
    endian: Endian,
    sink: &dyn WarningSink,
) -> Result<()> {
    let value = match raw {
        None => default,
        Some(raw) => match IntField::parse(default.width(), raw) {
            Some(value) => value,
            None => {
                emit(sink, field, raw, "error writing field - integer required");
                default
            }
        },
    };
    write_int(writer, value, endian)
}

/// Read a signed 16-bit value holding a decimal scaled by 100.
pub fn read_scaled_decimal<R: Read>(reader: &mut R, endian: Endian) -> Result<f64> {
    let raw = match endian {
        Endian::Little => reader.read_i16::<LittleEndian>()?,
        Endian::Big => reader.read_i16::<BigEndian>()?,
    };
    Ok(f64::from(raw) / 100.0)
}

/// Parse a decimal, accepting `,` as the separator.
pub(crate) fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Scale `raw` by 100 and round half away from zero. `None` when `raw` is not
/// a decimal or the result does not fit in an `i16`.
pub fn scale_decimal(raw: &str) -> Option<i16> {
    let scaled = (parse_decimal(raw)? * 100.0).round();
    if scaled < f64::from(i16::MIN) || scaled > f64::from(i16::MAX) {
        return None;
    }
    Some(scaled as i16)
}

pub fn write_scaled_decimal<W: Write>(
    writer: &mut W,
    field: &str,
    raw: Option<&str>,
    default: i16,
    endian: Endian,
    sink: &dyn WarningSink,
) -> Result<()> {
    let value = match raw {
        None => default,
        Some(raw) => match scale_decimal(raw) {
            Some(value) => value,
            None => {
                emit(
                    sink,
                    field,
                    raw,
                    "error writing field - integer or decimal required",
                );
                default
            }
        },
    };
    match endian {
        Endian::Little => writer.write_i16::<LittleEndian>(value),
        Endian::Big => writer.write_i16::<BigEndian>(value),
    }
}

pub const UMID_SIZE: usize = 64;
const UMID_LENGTH_OFFSET: usize = 12;
const UMID_EXTENDED_THRESHOLD: u8 = 19;
const UMID_BASIC_SIZE: usize = 32;

/// Read a 64-byte SMPTE UMID block as upper-case hex. Byte 12 carries the
/// remaining length: above 19 the extended 64-byte form is in use, otherwise
/// only the basic 32 bytes are meaningful.
pub fn read_umid<R: Read>(reader: &mut R) -> Result<String> {
    let mut block = [0u8; UMID_SIZE];
    reader.read_exact(&mut block)?;
    let useful = if block[UMID_LENGTH_OFFSET] > UMID_EXTENDED_THRESHOLD {
        UMID_SIZE
    } else {
        UMID_BASIC_SIZE
    };
    Ok(hex::encode_upper(&block[..useful]))
}

/// Build the 64-byte block for a hex UMID, zero-filling the unused tail.
pub fn umid_bytes(field: &str, raw: Option<&str>, sink: &dyn WarningSink) -> [u8; UMID_SIZE] {
    let mut block = [0u8; UMID_SIZE];
    let raw = match raw {
        Some(raw) => raw,
        None => return block,
    };

    match hex::decode(raw.trim()) {
        Ok(bytes) => {
            if bytes.len() > UMID_SIZE {
                emit(sink, field, raw, "error writing field - value truncated to 64 bytes");
            }
            let len = bytes.len().min(UMID_SIZE);
            block[..len].copy_from_slice(&bytes[..len]);
        }
        Err(_) => emit(
            sink,
            field,
            raw,
            "error writing field - hexadecimal notation required",
        ),
    }
    block
}

pub fn write_umid<W: Write>(writer: &mut W, field: &str, raw: Option<&str>, sink: &dyn WarningSink) -> Result<()> {
    writer.write_all(&umid_bytes(field, raw, sink))
}
