//! RIFF/RIFX WAVE container.
//!
//! Reading walks the chunk list once. Writing streams the source into a
//! sibling file, rebuilding only the `bext` and `id3 ` chunks, then replaces
//! the source with it.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use id3::Tag;

use crate::bext::{self, BextCodec};
use crate::codec::TagCodec;
use crate::diff::TagDelta;
use crate::error::{Error, Result};
use crate::field::Endian;
use crate::format::{AudioProperties, CodecFamily, LoadedFile};
use crate::id3tag::{self, Id3Mapping};
use crate::meta::TagData;
use crate::settings::{ReadOptions, Settings};
use crate::warning::WarningSink;

const RIFF: &[u8; 4] = b"RIFF";
const RIFX: &[u8; 4] = b"RIFX";
const WAVE: &[u8; 4] = b"WAVE";
const FMT: &[u8; 4] = b"fmt ";
const DATA: &[u8; 4] = b"data";
const ID3_CHUNK: &[u8; 4] = b"id3 ";
const ID3_CHUNK_UPPER: &[u8; 4] = b"ID3 ";

const HEADER_SIZE: u64 = 12;
const CHUNK_HEADER_SIZE: u64 = 8;
const MIN_FMT_SIZE: u32 = 16;

const FORMAT_PCM: u16 = 0x0001;
const FORMAT_IEEE_FLOAT: u16 = 0x0003;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Chunk {
    pub id: [u8; 4],
    /// Body size, clamped to the bytes actually present.
    pub size: u32,
    /// Absolute offset of the body.
    pub offset: u64,
}

impl Chunk {
    fn is_id3(&self) -> bool {
        &self.id == ID3_CHUNK || &self.id == ID3_CHUNK_UPPER
    }

    fn padded_end(&self) -> u64 {
        self.offset + u64::from(self.size) + u64::from(self.size & 1)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Layout {
    pub endian: Endian,
    pub chunks: Vec<Chunk>,
}

/// `fmt ` chunk contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaveFormat {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl WaveFormat {
    fn read<R: Read>(reader: &mut R, endian: Endian) -> io::Result<WaveFormat> {
        fn u16_of<R: Read>(r: &mut R, endian: Endian) -> io::Result<u16> {
            match endian {
                Endian::Little => r.read_u16::<LittleEndian>(),
                Endian::Big => r.read_u16::<BigEndian>(),
            }
        }
        Ok(WaveFormat {
            format_tag: u16_of(reader, endian)?,
            channels: u16_of(reader, endian)?,
            sample_rate: endian.read_u32(reader)?,
            byte_rate: endian.read_u32(reader)?,
            block_align: u16_of(reader, endian)?,
            bits_per_sample: u16_of(reader, endian)?,
        })
    }

    fn codec_family(&self) -> CodecFamily {
        match self.format_tag {
            FORMAT_PCM | FORMAT_IEEE_FLOAT | FORMAT_EXTENSIBLE => CodecFamily::Lossless,
            _ => CodecFamily::Lossy,
        }
    }
}

/// Walk the chunk list. `Ok(None)` when the stream is not a WAVE file.
pub(crate) fn read_layout<R: Read + Seek>(reader: &mut R) -> Result<Option<Layout>> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let mut header = [0u8; HEADER_SIZE as usize];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let endian = match &header[..4] {
        id if id == RIFF => Endian::Little,
        id if id == RIFX => Endian::Big,
        _ => return Ok(None),
    };
    if &header[8..12] != WAVE {
        return Ok(None);
    }

    let mut chunks = Vec::new();
    let mut pos = HEADER_SIZE;
    while pos + CHUNK_HEADER_SIZE <= file_len {
        reader.seek(SeekFrom::Start(pos))?;
        let mut id = [0u8; 4];
        reader.read_exact(&mut id)?;
        let declared = endian.read_u32(reader)?;
        let offset = pos + CHUNK_HEADER_SIZE;
        let available = file_len - offset;
        let size = if u64::from(declared) > available {
            tracing::debug!(
                chunk = %String::from_utf8_lossy(&id),
                declared,
                available,
                "chunk runs past end of file"
            );
            available as u32
        } else {
            declared
        };
        let chunk = Chunk { id, size, offset };
        chunks.push(chunk);
        pos = chunk.padded_end();
    }

    Ok(Some(Layout { endian, chunks }))
}

fn read_chunk_body<R: Read + Seek>(reader: &mut R, chunk: &Chunk) -> Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(chunk.offset))?;
    let mut body = vec![0u8; chunk.size as usize];
    reader
        .read_exact(&mut body)
        .map_err(Error::truncated("riff.chunk"))?;
    Ok(body)
}

pub(crate) fn id3_mapping(settings: &Settings) -> Id3Mapping {
    Id3Mapping {
        description: false,
        reserved_prefix: Some(bext::PREFIX),
        read_all_meta_frames: settings.read_all_meta_frames,
        version: settings.id3_version,
    }
}

/// Decode a WAVE stream. `Ok(None)` when it is not one.
pub(crate) fn read<R: Read + Seek>(
    reader: &mut R,
    settings: &Settings,
    options: ReadOptions,
    sink: &dyn WarningSink,
) -> Result<Option<LoadedFile>> {
    let layout = match read_layout(reader)? {
        Some(layout) => layout,
        None => return Ok(None),
    };
    let mapping = id3_mapping(settings);

    let mut format = None;
    let mut data_size = 0u64;
    let mut id3_tags = TagData::default();
    let mut bext_tags = TagData::default();
    let mut has_bext = false;

    for chunk in &layout.chunks {
        match &chunk.id {
            FMT => {
                if chunk.size < MIN_FMT_SIZE {
                    return Err(Error::InvalidContainer("fmt chunk shorter than 16 bytes"));
                }
                reader.seek(SeekFrom::Start(chunk.offset))?;
                let fmt = WaveFormat::read(reader, layout.endian)
                    .map_err(Error::truncated("riff.fmt"))?;
                format = Some(fmt);
            }
            DATA => data_size = u64::from(chunk.size),
            id if id == bext::CHUNK_ID && !has_bext => {
                reader.seek(SeekFrom::Start(chunk.offset - CHUNK_HEADER_SIZE))?;
                has_bext = BextCodec {
                    endian: layout.endian,
                }
                .try_decode(reader, &mut bext_tags, sink)?;
            }
            _ if chunk.is_id3() => {
                let body = read_chunk_body(reader, chunk)?;
                if let Some(tag) = id3tag::read_from(Cursor::new(body), sink)? {
                    id3tag::read_tag(&tag, &mut id3_tags, &mapping, options.read_pictures);
                }
            }
            _ => {}
        }
    }

    let format = format.ok_or(Error::InvalidContainer("missing fmt chunk"))?;

    // bext wins over anything the ID3 chunk says about the same keys.
    let mut tags = id3_tags;
    if !bext_tags.scalars.description.is_empty() {
        tags.scalars.description = bext_tags.scalars.description;
    }
    tags.fields.extend(bext_tags.fields);

    let duration_ms = if format.byte_rate > 0 {
        data_size as f64 * 1000.0 / f64::from(format.byte_rate)
    } else {
        0.0
    };
    let properties = AudioProperties {
        codec_family: format.codec_family(),
        sample_rate: format.sample_rate,
        channels: u32::from(format.channels),
        bits_per_sample: u32::from(format.bits_per_sample),
        duration_ms,
        bitrate: (f64::from(format.byte_rate) * 8.0 / 1000.0).round(),
        is_vbr: false,
        format_version: u32::from(format.format_tag),
    };

    tracing::debug!(
        chunks = layout.chunks.len(),
        bext = has_bext,
        data_size,
        "deserialized WAVE container"
    );

    Ok(Some(LoadedFile { tags, properties }))
}

fn write_chunk_header<W: Write>(writer: &mut W, id: &[u8; 4], size: u32, endian: Endian) -> io::Result<()> {
    writer.write_all(id)?;
    endian.write_u32(writer, size)
}

fn write_id3_chunk<W: Write>(writer: &mut W, body: &[u8], endian: Endian) -> Result<()> {
    let size = u32::try_from(body.len()).map_err(|_| Error::InvalidContainer("id3 chunk exceeds 4 GiB"))?;
    write_chunk_header(writer, ID3_CHUNK, size, endian)?;
    writer.write_all(body)?;
    if size & 1 == 1 {
        writer.write_all(&[0])?;
    }
    Ok(())
}

fn copy_chunk<R: Read + Seek, W: Write>(reader: &mut R, writer: &mut W, chunk: &Chunk, endian: Endian) -> Result<()> {
    write_chunk_header(writer, &chunk.id, chunk.size, endian)?;
    reader.seek(SeekFrom::Start(chunk.offset))?;
    let copied = io::copy(&mut (&mut *reader).take(u64::from(chunk.size)), writer)?;
    if copied != u64::from(chunk.size) {
        return Err(Error::Truncated {
            field: "riff.chunk",
            source: io::ErrorKind::UnexpectedEof.into(),
        });
    }
    if chunk.size & 1 == 1 {
        writer.write_all(&[0])?;
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tagtmp", name))
}

/// Rebuild `reader`'s WAVE stream into `writer` with `delta` applied.
pub(crate) fn rewrite<R: Read + Seek, W: Write + Seek>(
    reader: &mut R,
    writer: &mut W,
    delta: &TagDelta,
    settings: &Settings,
    sink: &dyn WarningSink,
) -> Result<()> {
    let layout = read_layout(reader)?.ok_or(Error::InvalidContainer("not a WAVE stream"))?;
    let endian = layout.endian;
    let mapping = id3_mapping(settings);

    let mut bext_tags = TagData::default();
    let mut bext_seen = false;
    let mut id3_tag = None;
    for chunk in &layout.chunks {
        if &chunk.id == bext::CHUNK_ID && !bext_seen {
            reader.seek(SeekFrom::Start(chunk.offset - CHUNK_HEADER_SIZE))?;
            bext_seen = BextCodec { endian }.try_decode(reader, &mut bext_tags, sink)?;
        } else if chunk.is_id3() && id3_tag.is_none() {
            id3_tag = id3tag::read_from(Cursor::new(read_chunk_body(reader, chunk)?), sink)?;
        }
    }

    bext_tags.apply(delta);
    let write_bext = bext::is_eligible(&bext_tags);

    let mut id3_tag = id3_tag.unwrap_or_else(Tag::new);
    id3tag::apply_delta(&mut id3_tag, delta, &mapping);
    let id3_body = if id3tag::is_empty(&id3_tag) {
        None
    } else {
        let mut body = Vec::new();
        id3_tag.write_to(&mut body, settings.id3_version.to_id3())?;
        Some(body)
    };

    let header_id = match endian {
        Endian::Little => RIFF,
        Endian::Big => RIFX,
    };
    let start = writer.stream_position()?;
    write_chunk_header(writer, header_id, 0, endian)?;
    writer.write_all(WAVE)?;

    let has_bext_chunk = layout.chunks.iter().any(|c| &c.id == bext::CHUNK_ID);
    let mut bext_done = false;
    let mut id3_done = false;
    for chunk in &layout.chunks {
        if &chunk.id == bext::CHUNK_ID {
            if write_bext && !bext_done {
                BextCodec { endian }.encode(writer, &bext_tags, sink)?;
            }
            bext_done = true;
        } else if chunk.is_id3() {
            if let (Some(body), false) = (&id3_body, id3_done) {
                write_id3_chunk(writer, body, endian)?;
            }
            id3_done = true;
        } else {
            if &chunk.id == FMT && write_bext && !has_bext_chunk && !bext_done {
                BextCodec { endian }.encode(writer, &bext_tags, sink)?;
                bext_done = true;
            }
            copy_chunk(reader, writer, chunk, endian)?;
        }
    }
    if write_bext && !bext_done {
        BextCodec { endian }.encode(writer, &bext_tags, sink)?;
    }
    if let (Some(body), false) = (&id3_body, id3_done) {
        write_id3_chunk(writer, body, endian)?;
    }

    let end = writer.stream_position()?;
    let riff_size = u32::try_from(end - start - CHUNK_HEADER_SIZE)
        .map_err(|_| Error::InvalidContainer("RIFF stream exceeds 4 GiB"))?;
    writer.seek(SeekFrom::Start(start + 4))?;
    endian.write_u32(writer, riff_size)?;
    writer.seek(SeekFrom::Start(end))?;

    tracing::debug!(
        bytes = end - start,
        bext = write_bext,
        id3 = id3_body.is_some(),
        "serialized WAVE container"
    );
    Ok(())
}

/// Apply `delta` to the file at `path`, replacing it atomically.
pub(crate) fn write(path: &Path, delta: &TagDelta, settings: &Settings, sink: &dyn WarningSink) -> Result<()> {
    let source = File::open(path).map_err(|e| Error::OpenFailed(e, path.to_path_buf()))?;
    let mut reader = BufReader::new(source);

    let tmp = temp_path(path);
    let result = (|| -> Result<()> {
        let file = File::create(&tmp).map_err(|e| Error::WriteFailed(e, tmp.clone()))?;
        let mut writer = BufWriter::new(file);
        rewrite(&mut reader, &mut writer, delta, settings, sink)?;
        let file = writer.into_inner().map_err(|e| Error::WriteFailed(e.into_error(), tmp.clone()))?;
        file.sync_all().map_err(|e| Error::WriteFailed(e, tmp.clone()))?;
        Ok(())
    })();

    drop(reader);
    match result {
        Ok(()) => fs::rename(&tmp, path).map_err(|e| Error::WriteFailed(e, path.to_path_buf())),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}
