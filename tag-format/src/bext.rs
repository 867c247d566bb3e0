//! Broadcast Wave `bext` chunk.
//!
//! The body is a fixed 602-byte block followed by a free-text coding history:
//!
//! | size | content                         |
//! |------|---------------------------------|
//! | 256  | description                     |
//! | 32   | originator                      |
//! | 32   | originator reference            |
//! | 10   | origination date                |
//! | 8    | origination time                |
//! | 8    | time reference (samples)        |
//! | 2    | version                         |
//! | 64   | UMID                            |
//! | 10   | five loudness values, x100      |
//! | 180  | reserved                        |
//! | *    | coding history, CRLF terminated |
//!
//! Numbers inside the body are little-endian. The chunk size follows the
//! container's byte order.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use crate::codec::TagCodec;
use crate::error::{Error, Result};
use crate::field::{self, Endian, IntField, IntWidth};
use crate::meta::TagData;
use crate::warning::WarningSink;

pub const CHUNK_ID: &[u8; 4] = b"bext";
pub const PREFIX: &str = "bext.";

pub const DESCRIPTION: &str = "bext.description";
pub const ORIGINATOR: &str = "bext.originator";
pub const ORIGINATOR_REFERENCE: &str = "bext.originatorReference";
pub const ORIGINATION_DATE: &str = "bext.originationDate";
pub const ORIGINATION_TIME: &str = "bext.originationTime";
pub const TIME_REFERENCE: &str = "bext.timeReference";
pub const VERSION: &str = "bext.version";
pub const UMID: &str = "bext.UMID";
pub const LOUDNESS_VALUE: &str = "bext.loudnessValue";
pub const LOUDNESS_RANGE: &str = "bext.loudnessRange";
pub const MAX_TRUE_PEAK_LEVEL: &str = "bext.maxTruePeakLevel";
pub const MAX_MOMENTARY_LOUDNESS: &str = "bext.maxMomentaryLoudness";
pub const MAX_SHORT_TERM_LOUDNESS: &str = "bext.maxShortTermLoudness";
pub const CODING_HISTORY: &str = "bext.codingHistory";

/// Number of logical fields a chunk carries.
pub const FIELD_COUNT: usize = 14;

const DESCRIPTION_SIZE: usize = 256;
const TEXT_FIELDS: [(&str, usize); 4] = [
    (ORIGINATOR, 32),
    (ORIGINATOR_REFERENCE, 32),
    (ORIGINATION_DATE, 10),
    (ORIGINATION_TIME, 8),
];
const LOUDNESS_FIELDS: [&str; 5] = [
    LOUDNESS_VALUE,
    LOUDNESS_RANGE,
    MAX_TRUE_PEAK_LEVEL,
    MAX_MOMENTARY_LOUDNESS,
    MAX_SHORT_TERM_LOUDNESS,
];
const RESERVED_SIZE: usize = 180;
const HISTORY_TERMINATOR: &[u8; 2] = b"\r\n";
const PADDING_BLOCK: usize = 256;

/// Whether a tag has anything worth a `bext` chunk.
pub fn is_eligible(tag: &TagData) -> bool {
    !tag.scalars.description.is_empty() || tag.fields.keys().any(|k| k.starts_with(PREFIX))
}

/// Typed views over the `bext.*` fields. Missing or unreadable values read
/// as zero.
impl TagData {
    fn bext_decimal(&self, key: &str) -> f64 {
        self.field(key)
            .and_then(field::parse_decimal)
            .unwrap_or_default()
    }

    /// Offset of the first sample, in samples since midnight.
    pub fn time_reference(&self) -> u64 {
        self.field(TIME_REFERENCE)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default()
    }

    pub fn bext_version(&self) -> u16 {
        self.field(VERSION)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default()
    }

    pub fn umid(&self) -> &str {
        self.field(UMID).unwrap_or_default()
    }

    /// Integrated loudness, LUFS.
    pub fn loudness_value(&self) -> f64 {
        self.bext_decimal(LOUDNESS_VALUE)
    }

    pub fn loudness_range(&self) -> f64 {
        self.bext_decimal(LOUDNESS_RANGE)
    }

    pub fn max_true_peak_level(&self) -> f64 {
        self.bext_decimal(MAX_TRUE_PEAK_LEVEL)
    }

    pub fn max_momentary_loudness(&self) -> f64 {
        self.bext_decimal(MAX_MOMENTARY_LOUDNESS)
    }

    pub fn max_short_term_loudness(&self) -> f64 {
        self.bext_decimal(MAX_SHORT_TERM_LOUDNESS)
    }

    pub fn coding_history(&self) -> &str {
        self.field(CODING_HISTORY).unwrap_or_default()
    }
}

/// Find `needle` from the reader's position. Returns its absolute offset and
/// leaves the reader somewhere after the search start.
fn find_sequence<R: Read + Seek>(reader: &mut R, needle: &[u8]) -> Result<Option<u64>> {
    let mut window_start = reader.stream_position()?;
    let mut window: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        window.extend_from_slice(&buf[..n]);
        if let Some(i) = window.windows(needle.len()).position(|w| w == needle) {
            return Ok(Some(window_start + i as u64));
        }
        let keep = needle.len() - 1;
        let drop = window.len().saturating_sub(keep);
        window.drain(..drop);
        window_start += drop as u64;
    }
}

fn insert_text(tag: &mut TagData, key: &str, value: String) {
    if !value.is_empty() {
        tag.fields.insert(key.to_string(), value);
    }
}

/// Decode a chunk body positioned at its first byte.
pub fn read_body<R: Read + Seek>(reader: &mut R, tag: &mut TagData) -> Result<()> {
    let description =
        field::read_fixed_text(reader, DESCRIPTION_SIZE).map_err(Error::truncated(DESCRIPTION))?;
    if !description.is_empty() {
        tag.scalars.description = description.clone();
    }
    insert_text(tag, DESCRIPTION, description);

    for (key, len) in TEXT_FIELDS {
        let value = field::read_fixed_text(reader, len).map_err(Error::truncated(key))?;
        insert_text(tag, key, value);
    }

    let time_reference = field::read_int_field(reader, IntWidth::U64, Endian::Little)
        .map_err(Error::truncated(TIME_REFERENCE))?;
    tag.fields
        .insert(TIME_REFERENCE.to_string(), time_reference.to_string());

    let version = field::read_int_field(reader, IntWidth::U16, Endian::Little)
        .map_err(Error::truncated(VERSION))?;
    tag.fields.insert(VERSION.to_string(), version.to_string());

    let umid = field::read_umid(reader).map_err(Error::truncated(UMID))?;
    tag.fields.insert(UMID.to_string(), umid);

    for key in LOUDNESS_FIELDS {
        let value =
            field::read_scaled_decimal(reader, Endian::Little).map_err(Error::truncated(key))?;
        tag.fields.insert(key.to_string(), value.to_string());
    }

    let mut reserved = [0u8; RESERVED_SIZE];
    reader
        .read_exact(&mut reserved)
        .map_err(Error::truncated("bext.reserved"))?;

    let start = reader.stream_position()?;
    if let Some(end) = find_sequence(reader, HISTORY_TERMINATOR)? {
        reader.seek(SeekFrom::Start(start))?;
        let mut history = vec![0u8; (end - start) as usize];
        reader
            .read_exact(&mut history)
            .map_err(Error::truncated(CODING_HISTORY))?;
        insert_text(tag, CODING_HISTORY, field::clean_text(&history));
        reader.seek(SeekFrom::Start(end + HISTORY_TERMINATOR.len() as u64))?;
    }

    Ok(())
}

/// Write a complete chunk, header included, and return the number of fields
/// written. The size slot is patched once the body length is known.
pub fn write_chunk<W: Write + Seek>(
    writer: &mut W,
    tag: &TagData,
    endian: Endian,
    sink: &dyn WarningSink,
) -> Result<usize> {
    let start = writer.stream_position()?;
    writer.write_all(CHUNK_ID)?;
    let size_pos = writer.stream_position()?;
    endian.write_u32(writer, 0)?;

    let description = if tag.scalars.description.is_empty() {
        tag.field(DESCRIPTION).unwrap_or_default()
    } else {
        tag.scalars.description.as_str()
    };
    field::write_fixed_text(writer, description, DESCRIPTION_SIZE, 0)?;

    for (key, len) in TEXT_FIELDS {
        field::write_fixed_text(writer, tag.field(key).unwrap_or_default(), len, 0)?;
    }

    field::write_int_field(
        writer,
        TIME_REFERENCE,
        tag.field(TIME_REFERENCE),
        IntField::U64(0),
        Endian::Little,
        sink,
    )?;
    field::write_int_field(
        writer,
        VERSION,
        tag.field(VERSION),
        IntField::U16(0),
        Endian::Little,
        sink,
    )?;
    field::write_umid(writer, UMID, tag.field(UMID), sink)?;

    for key in LOUDNESS_FIELDS {
        field::write_scaled_decimal(writer, key, tag.field(key), 0, Endian::Little, sink)?;
    }

    writer.write_all(&[0u8; RESERVED_SIZE])?;

    let history = field::latin1_encode(tag.field(CODING_HISTORY).unwrap_or_default());
    writer.write_all(&history)?;
    writer.write_all(HISTORY_TERMINATOR)?;
    // Always pads, even when already aligned.
    let padding = PADDING_BLOCK - (history.len() + HISTORY_TERMINATOR.len()) % PADDING_BLOCK;
    writer.write_all(&vec![0u8; padding])?;

    let end = writer.stream_position()?;
    let size = u32::try_from(end - size_pos - 4)
        .map_err(|_| Error::InvalidContainer("bext chunk exceeds 4 GiB"))?;
    writer.seek(SeekFrom::Start(size_pos))?;
    endian.write_u32(writer, size)?;
    writer.seek(SeekFrom::Start(end))?;

    tracing::debug!(
        start = format_args!("{:#x}", start),
        end = format_args!("{:#x}", end),
        bytes = end - start,
        "serialized bext chunk"
    );

    Ok(FIELD_COUNT)
}

/// `bext` as a [`TagCodec`]. The endianness is that of the chunk size slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct BextCodec {
    pub endian: Endian,
}

impl TagCodec for BextCodec {
    fn try_decode<R: Read + Seek>(
        &self,
        reader: &mut R,
        tag: &mut TagData,
        _sink: &dyn WarningSink,
    ) -> Result<bool> {
        let start = reader.stream_position()?;
        let mut id = [0u8; 4];
        match reader.read_exact(&mut id) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        if &id != CHUNK_ID {
            return Ok(false);
        }

        let size = self
            .endian
            .read_u32(reader)
            .map_err(Error::truncated("bext.size"))?;
        // A short body surfaces as a truncated field in `read_body`.
        let mut body = Vec::new();
        (&mut *reader).take(u64::from(size)).read_to_end(&mut body)?;
        read_body(&mut Cursor::new(body), tag)?;

        let end = reader.stream_position()?;
        tracing::debug!(
            start = format_args!("{:#x}", start),
            end = format_args!("{:#x}", end),
            bytes = end - start,
            "deserialized bext chunk"
        );
        Ok(true)
    }

    fn encode<W: Write + Seek>(
        &self,
        writer: &mut W,
        tag: &TagData,
        sink: &dyn WarningSink,
    ) -> Result<u64> {
        let start = writer.stream_position()?;
        write_chunk(writer, tag, self.endian, sink)?;
        Ok(writer.stream_position()? - start)
    }
}
