use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use id3::Tag;

use crate::diff::TagDelta;
use crate::error::{Error, Result};
use crate::id3tag::{self, Id3Mapping};
use crate::meta::TagData;
use crate::riff;
use crate::settings::{ReadOptions, Settings};
use crate::tak;
use crate::warning::WarningSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecFamily {
    #[default]
    Unknown,
    Lossy,
    Lossless,
}

/// Technical properties of the audio stream. Read-only.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioProperties {
    pub codec_family: CodecFamily,
    pub sample_rate: u32,
    pub channels: u32,
    /// 0 when the container does not say.
    pub bits_per_sample: u32,
    pub duration_ms: f64,
    /// kbit/s.
    pub bitrate: f64,
    pub is_vbr: bool,
    /// Container-specific revision: the WAVE format tag, or the TAK encoder
    /// version.
    pub format_version: u32,
}

/// Tags and stream properties decoded from one file.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub tags: TagData,
    pub properties: AudioProperties,
}

/// Supported containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// RIFF or RIFX WAVE, tags in `bext` and `id3 ` chunks.
    Wav,
    /// TAK, tags in a leading ID3v2 tag.
    Tak,
}

impl Format {
    pub const ALL: [Format; 2] = [Format::Wav, Format::Tak];

    pub fn name(self) -> &'static str {
        match self {
            Format::Wav => "WAV",
            Format::Tak => "TAK",
        }
    }

    /// Identify the container of a stream from its header.
    pub fn detect<R: Read + Seek>(reader: &mut R) -> Result<Option<Format>> {
        if riff::read_layout(reader)?.is_some() {
            return Ok(Some(Format::Wav));
        }
        let len = reader.seek(SeekFrom::End(0))?;
        if tak::read_header(reader, len)?.is_some() {
            return Ok(Some(Format::Tak));
        }
        Ok(None)
    }

    fn id3_mapping(self, settings: &Settings) -> Id3Mapping {
        match self {
            Format::Wav => riff::id3_mapping(settings),
            Format::Tak => Id3Mapping {
                description: true,
                reserved_prefix: None,
                read_all_meta_frames: settings.read_all_meta_frames,
                version: settings.id3_version,
            },
        }
    }

    /// Decode a stream as this format. `Ok(None)` when the stream belongs to
    /// another format; the reader position is then unspecified.
    pub(crate) fn read<R: Read + Seek>(
        self,
        reader: &mut R,
        settings: &Settings,
        options: ReadOptions,
        sink: &dyn WarningSink,
    ) -> Result<Option<LoadedFile>> {
        match self {
            Format::Wav => riff::read(reader, settings, options, sink),
            Format::Tak => {
                let len = reader.seek(SeekFrom::End(0))?;
                let header = match tak::read_header(reader, len)? {
                    Some(header) => header,
                    None => return Ok(None),
                };

                let mut tags = TagData::default();
                reader.seek(SeekFrom::Start(0))?;
                if let Some(tag) = id3tag::read_from(&mut *reader, sink)? {
                    id3tag::read_tag(&tag, &mut tags, &self.id3_mapping(settings), options.read_pictures);
                }

                let info = header.stream_info.unwrap_or_default();
                let properties = AudioProperties {
                    codec_family: CodecFamily::Lossless,
                    sample_rate: info.sample_rate,
                    channels: info.channels,
                    bits_per_sample: 0,
                    duration_ms: info.duration_ms,
                    bitrate: info.bitrate,
                    is_vbr: false,
                    format_version: header.format_version,
                };
                tracing::debug!(
                    format_version = header.format_version,
                    samples = info.sample_count,
                    "deserialized TAK stream"
                );
                Ok(Some(LoadedFile { tags, properties }))
            }
        }
    }

    /// Apply `delta` to the file at `path`.
    pub(crate) fn write(
        self,
        path: &Path,
        delta: &TagDelta,
        settings: &Settings,
        sink: &dyn WarningSink,
    ) -> Result<()> {
        match self {
            Format::Wav => riff::write(path, delta, settings, sink),
            Format::Tak => {
                let file = File::open(path).map_err(|e| Error::OpenFailed(e, path.to_path_buf()))?;
                let mut tag =
                    id3tag::read_from(BufReader::new(file), sink)?.unwrap_or_else(Tag::new);
                id3tag::apply_delta(&mut tag, delta, &self.id3_mapping(settings));

                if id3tag::is_empty(&tag) {
                    Tag::remove_from_path(path)?;
                } else {
                    tag.write_to_path(path, settings.id3_version.to_id3())?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn dispatch<R: Read + Seek>(
    reader: &mut R,
    settings: &Settings,
    options: ReadOptions,
    sink: &dyn WarningSink,
) -> Result<Option<(Format, LoadedFile)>> {
    for format in Format::ALL {
        reader.seek(SeekFrom::Start(0))?;
        if let Some(loaded) = format.read(reader, settings, options, sink)? {
            return Ok(Some((format, loaded)));
        }
    }
    Ok(None)
}

/// Open `path` and decode it with the first format that claims it.
pub(crate) fn load(
    path: &Path,
    settings: &Settings,
    options: ReadOptions,
    sink: &dyn WarningSink,
) -> Result<(Format, LoadedFile)> {
    let file = File::open(path).map_err(|e| Error::OpenFailed(e, path.to_path_buf()))?;
    let mut reader = BufReader::new(file);
    dispatch(&mut reader, settings, options, sink)?
        .ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))
}

/// Decode an in-memory or otherwise already opened stream, picture payloads
/// included. The stream is read from its start.
pub fn read_stream<R: Read + Seek>(
    reader: &mut R,
    settings: &Settings,
    sink: &dyn WarningSink,
) -> Result<(Format, LoadedFile)> {
    let (format, loaded) = dispatch(reader, settings, ReadOptions { read_pictures: true }, sink)?
        .ok_or(Error::UnrecognisedStream)?;
    tracing::debug!(
        format = %format,
        fields = loaded.tags.fields.len(),
        pictures = loaded.tags.pictures.len(),
        "loaded stream"
    );
    Ok((format, loaded))
}
