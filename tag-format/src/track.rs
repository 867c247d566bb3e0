//! Editable view of one audio file's tags.
//!
//! A [`Track`] keeps each editable collection twice: as loaded and as edited.
//! Saving computes the difference, hands it to the container writer and
//! reloads the file, so the in-memory state always mirrors what is on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::chapter::ChapterInfo;
use crate::diff::{self, FieldOp, PictureOp, ScalarChange, TagDelta};
use crate::error::Result;
use crate::format::{self, AudioProperties, Format};
use crate::meta::{FieldMap, Scalar, Scalars};
use crate::picture::PictureInfo;
use crate::settings::{ReadOptions, Settings};
use crate::snapshot::Snapshot;
use crate::warning::{TracingSink, WarningSink};

pub struct Track {
    path: PathBuf,
    format: Format,
    settings: Settings,
    sink: Arc<dyn WarningSink>,
    properties: AudioProperties,
    scalars: Snapshot<Scalars>,
    fields: Snapshot<FieldMap>,
    picture_tokens: Vec<PictureInfo>,
    /// Loaded on first access.
    pictures: Option<Snapshot<Vec<PictureInfo>>>,
    chapters: Snapshot<Vec<ChapterInfo>>,
}

impl std::fmt::Debug for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Track")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("properties", &self.properties)
            .field("scalars", self.scalars.current())
            .field("fields", self.fields.current())
            .field("pictures", &self.picture_tokens.len())
            .field("chapters", &self.chapters.current().len())
            .finish()
    }
}

/// Load a file's tags into a new [`Track`]. Picture payloads are not read
/// until [`Track::embedded_pictures_mut`] is first called.
pub fn load_snapshot<P: AsRef<Path>>(
    path: P,
    settings: &Settings,
    sink: Arc<dyn WarningSink>,
) -> Result<Track> {
    let path = path.as_ref();
    let (format, loaded) = format::load(path, settings, ReadOptions::default(), sink.as_ref())?;

    let mut scalars = loaded.tags.scalars;
    if settings.use_file_name_when_no_title && scalars.title.is_empty() {
        if let Some(stem) = path.file_stem() {
            scalars.title = stem.to_string_lossy().into_owned();
        }
    }

    tracing::debug!(
        path = %path.display(),
        format = %format,
        fields = loaded.tags.fields.len(),
        pictures = loaded.tags.picture_tokens.len(),
        chapters = loaded.tags.chapters.len(),
        "loaded track"
    );

    Ok(Track {
        path: path.to_path_buf(),
        format,
        settings: settings.clone(),
        sink,
        properties: loaded.properties,
        scalars: Snapshot::new(scalars),
        fields: Snapshot::new(loaded.tags.fields),
        picture_tokens: loaded.tags.picture_tokens,
        pictures: None,
        chapters: Snapshot::new(loaded.tags.chapters),
    })
}

/// Write `delta` to the track's file and return a freshly loaded track.
pub fn apply_and_persist(track: Track, delta: &TagDelta) -> Result<Track> {
    track.persist(delta)
}

impl Track {
    /// Load with default settings, sending warnings to `tracing`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Track> {
        load_snapshot(path, &Settings::default(), Arc::new(TracingSink))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn properties(&self) -> &AudioProperties {
        &self.properties
    }

    pub fn scalars(&self) -> &Scalars {
        self.scalars.current()
    }

    pub fn scalars_mut(&mut self) -> &mut Scalars {
        self.scalars.current_mut()
    }

    pub fn fields(&self) -> &FieldMap {
        self.fields.current()
    }

    pub fn fields_mut(&mut self) -> &mut FieldMap {
        self.fields.current_mut()
    }

    /// Type information for every embedded picture, available without
    /// loading payloads.
    pub fn picture_tokens(&self) -> &[PictureInfo] {
        &self.picture_tokens
    }

    fn pictures_snapshot(&mut self) -> Result<&mut Snapshot<Vec<PictureInfo>>> {
        let snapshot = match self.pictures.take() {
            Some(snapshot) => snapshot,
            None => {
                let (_, loaded) = format::load(
                    &self.path,
                    &self.settings,
                    ReadOptions { read_pictures: true },
                    self.sink.as_ref(),
                )?;
                for picture in &loaded.tags.pictures {
                    picture.hash();
                }
                tracing::debug!(
                    path = %self.path.display(),
                    count = loaded.tags.pictures.len(),
                    "loaded embedded pictures"
                );
                Snapshot::new(loaded.tags.pictures)
            }
        };
        Ok(self.pictures.insert(snapshot))
    }

    pub fn embedded_pictures(&mut self) -> Result<&[PictureInfo]> {
        Ok(self.pictures_snapshot()?.current().as_slice())
    }

    /// Editable picture list. The first call reads the payloads from disk;
    /// later calls return the same list, edits included.
    pub fn embedded_pictures_mut(&mut self) -> Result<&mut Vec<PictureInfo>> {
        Ok(self.pictures_snapshot()?.current_mut())
    }

    pub fn chapters(&self) -> &[ChapterInfo] {
        self.chapters.current().as_slice()
    }

    pub fn chapters_mut(&mut self) -> &mut Vec<ChapterInfo> {
        self.chapters.current_mut()
    }

    pub fn is_dirty(&self) -> bool {
        self.scalars.is_dirty()
            || self.fields.is_dirty()
            || self.chapters.is_dirty()
            || self.pictures.as_ref().map_or(false, Snapshot::is_dirty)
    }

    /// Operations needed to bring the file in line with the current state.
    pub fn pending_changes(&self) -> TagDelta {
        TagDelta {
            scalars: diff::diff_scalars(self.scalars.initial(), self.scalars.current()),
            fields: diff::diff_fields(self.fields.initial(), self.fields.current()),
            pictures: match &self.pictures {
                Some(pictures) => diff::diff_pictures(pictures.initial(), pictures.current()),
                None => Vec::new(),
            },
            chapters: diff::diff_chapters(self.chapters.initial(), self.chapters.current()),
        }
    }

    fn persist(&self, delta: &TagDelta) -> Result<Track> {
        if !delta.is_empty() {
            self.format
                .write(&self.path, delta, &self.settings, self.sink.as_ref())?;
            tracing::debug!(
                path = %self.path.display(),
                scalars = delta.scalars.len(),
                fields = delta.fields.len(),
                pictures = delta.pictures.len(),
                chapters = delta.chapters.is_some(),
                "saved track"
            );
        }
        load_snapshot(&self.path, &self.settings, Arc::clone(&self.sink))
    }

    /// Write pending changes and reload. On failure the track keeps its
    /// edits.
    pub fn save(&mut self) -> Result<()> {
        let delta = self.pending_changes();
        *self = self.persist(&delta)?;
        Ok(())
    }

    /// Remove every tag the track carries, then reload.
    pub fn remove_tags(&mut self) -> Result<()> {
        let scalars = self.scalars.initial();
        let mut delta = TagDelta {
            scalars: Scalar::ALL
                .iter()
                .filter(|&&scalar| !scalars.get(scalar).is_empty())
                .map(|&scalar| ScalarChange {
                    scalar,
                    value: String::new(),
                })
                .collect(),
            fields: self
                .fields
                .initial()
                .keys()
                .map(|key| FieldOp::Delete { key: key.clone() })
                .collect(),
            pictures: Vec::new(),
            chapters: if self.chapters.initial().is_empty() {
                None
            } else {
                Some(Vec::new())
            },
        };
        delta.pictures = self
            .pictures_snapshot()?
            .initial()
            .iter()
            .map(|picture| PictureOp::Delete(picture.clone()))
            .collect();

        *self = self.persist(&delta)?;
        Ok(())
    }
}
