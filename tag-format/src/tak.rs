//! TAK stream header.
//!
//! A TAK file may start with an ID3v2 tag, then carries the `tBaK` magic and a
//! sequence of metadata blocks. Every block starts with a little-endian word:
//! the low 7 bits are the block type, the upper 24 bits the block size.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

pub const MAGIC: &[u8; 4] = b"tBaK";

const BLOCK_END: u32 = 0;
const BLOCK_STREAM_INFO: u32 = 1;
const BLOCK_ENCODER_INFO: u32 = 4;

const SAMPLE_RATE_BASE: u32 = 6000;

const ID3V2_HEADER_SIZE: u64 = 10;
const ID3V2_FOOTER_FLAG: u8 = 0x10;

/// Decoded stream information block.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StreamInfo {
    pub frame_size_type: u8,
    pub sample_count: u64,
    pub sample_rate: u32,
    pub channels: u32,
    /// Milliseconds; 0 when the sample count is unknown.
    pub duration_ms: f64,
    /// kbit/s over the bytes following the stream info word.
    pub bitrate: f64,
}

impl StreamInfo {
    /// Unpack the three packed words that follow a stream info block word.
    pub fn unpack(w1: u16, w2: u32, w3: u32) -> StreamInfo {
        let sample_count =
            u64::from(w1 >> 14) + (u64::from(w2) << 2) + (u64::from(w3 & 0x80) << 34);
        StreamInfo {
            frame_size_type: ((w1 >> 2) & 0x0F) as u8,
            sample_count,
            sample_rate: ((w3 >> 4) & 0x3FFFF) + SAMPLE_RATE_BASE,
            channels: ((w3 >> 27) & 0x0F) + 1,
            duration_ms: 0.0,
            bitrate: 0.0,
        }
    }

    /// Fill in duration and bitrate given the number of audio bytes.
    fn with_payload(mut self, payload_bytes: u64) -> StreamInfo {
        if self.sample_count > 0 {
            self.duration_ms = self.sample_count as f64 * 1000.0 / f64::from(self.sample_rate);
            self.bitrate = (payload_bytes as f64 * 8.0 / self.duration_ms).round();
        }
        self
    }
}

/// `100 * major + 10 * minor + revision` of an encoder info word.
pub fn encoder_version(word: u32) -> u32 {
    100 * ((word >> 16) & 0xFF) + 10 * ((word >> 8) & 0xFF) + (word & 0xFF)
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TakHeader {
    pub stream_info: Option<StreamInfo>,
    pub format_version: u32,
}

/// Size of the ID3v2 tag at the start of the stream, 0 if there is none.
/// The reader is left at the start.
pub(crate) fn id3v2_size<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    reader.seek(SeekFrom::Start(0))?;
    let mut header = [0u8; ID3V2_HEADER_SIZE as usize];
    let size = match reader.read_exact(&mut header) {
        Ok(()) if &header[..3] == b"ID3" => {
            let body = header[6..10]
                .iter()
                .fold(0u64, |acc, &b| (acc << 7) | u64::from(b & 0x7F));
            let footer = if header[5] & ID3V2_FOOTER_FLAG != 0 {
                ID3V2_HEADER_SIZE
            } else {
                0
            };
            ID3V2_HEADER_SIZE + body + footer
        }
        Ok(()) => 0,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => 0,
        Err(e) => return Err(e.into()),
    };
    reader.seek(SeekFrom::Start(0))?;
    Ok(size)
}

/// Read the header of a TAK stream. `Ok(None)` when the magic is missing.
pub fn read_header<R: Read + Seek>(reader: &mut R, file_size: u64) -> Result<Option<TakHeader>> {
    let offset = id3v2_size(reader)?;
    reader.seek(SeekFrom::Start(offset))?;

    let mut magic = [0u8; 4];
    match reader.read_exact(&mut magic) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    if &magic != MAGIC {
        return Ok(None);
    }

    let mut header = TakHeader::default();
    loop {
        let word = reader
            .read_u32::<LittleEndian>()
            .map_err(Error::truncated("tak.metadata"))?;
        let block_type = word & 0x7F;
        let block_size = u64::from(word >> 8);
        if block_type == BLOCK_END {
            break;
        }
        let position = reader.stream_position()?;

        match block_type {
            BLOCK_STREAM_INFO => {
                let w1 = reader
                    .read_u16::<LittleEndian>()
                    .map_err(Error::truncated("tak.streamInfo"))?;
                let w2 = reader
                    .read_u32::<LittleEndian>()
                    .map_err(Error::truncated("tak.streamInfo"))?;
                let w3 = reader
                    .read_u32::<LittleEndian>()
                    .map_err(Error::truncated("tak.streamInfo"))?;
                let after = reader.stream_position()?;
                let info = StreamInfo::unpack(w1, w2, w3)
                    .with_payload(file_size.saturating_sub(after));
                tracing::debug!(
                    offset = format_args!("{:#x}", position),
                    sample_rate = info.sample_rate,
                    channels = info.channels,
                    samples = info.sample_count,
                    "deserialized tak stream info"
                );
                header.stream_info = Some(info);
            }
            BLOCK_ENCODER_INFO => {
                let word = reader
                    .read_u32::<LittleEndian>()
                    .map_err(Error::truncated("tak.encoderInfo"))?;
                header.format_version = encoder_version(word);
            }
            _ => {}
        }

        reader.seek(SeekFrom::Start(position + block_size))?;
    }

    Ok(Some(header))
}
