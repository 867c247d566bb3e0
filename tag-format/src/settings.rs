/// ID3v2 revision used when a tag has to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Id3Version {
    V23,
    #[default]
    V24,
}

impl Id3Version {
    pub(crate) fn to_id3(self) -> id3::Version {
        match self {
            Id3Version::V23 => id3::Version::Id3v23,
            Id3Version::V24 => id3::Version::Id3v24,
        }
    }

    /// Frame that carries the recording year in this revision.
    pub(crate) fn year_frame(self) -> &'static str {
        match self {
            Id3Version::V23 => "TYER",
            Id3Version::V24 => "TDRC",
        }
    }
}

/// Behaviour switches for loading and saving tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Expose ID3v2 text frames that have no scalar as fields keyed by
    /// frame id, and write such keys back as text frames.
    pub read_all_meta_frames: bool,
    /// Use the file stem as the title when the tags carry none.
    pub use_file_name_when_no_title: bool,
    pub id3_version: Id3Version,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            read_all_meta_frames: true,
            use_file_name_when_no_title: false,
            id3_version: Id3Version::default(),
        }
    }
}

/// Per-load options.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ReadOptions {
    pub read_pictures: bool,
}
