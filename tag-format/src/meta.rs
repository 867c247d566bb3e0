use std::collections::BTreeMap;
use std::fmt;

use crate::bext;
use crate::chapter::ChapterInfo;
use crate::diff::{FieldOp, PictureOp, TagDelta};
use crate::picture::PictureInfo;
use crate::utils;

/// Free-form metadata keyed by a namespaced field name (`bext.originator`).
pub type FieldMap = BTreeMap<String, String>;

/// The well-known scalar properties promoted out of the field map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scalars {
    pub title: String,
    pub artist: String,
    pub composer: String,
    pub comment: String,
    pub genre: String,
    pub album: String,
    pub original_album: String,
    pub original_artist: String,
    pub copyright: String,
    pub description: String,
    pub publisher: String,
    pub album_artist: String,
    pub conductor: String,
    /// Recording year; 0 when unknown.
    pub year: i32,
    /// 0 when unknown.
    pub track_number: u16,
    /// 0 when unknown.
    pub disc_number: u16,
    /// 0.0 (no stars) to 1.0 (five stars).
    pub popularity: f32,
}

/// Names one member of [`Scalars`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scalar {
    Title,
    Artist,
    Composer,
    Comment,
    Genre,
    Album,
    OriginalAlbum,
    OriginalArtist,
    Copyright,
    Description,
    Publisher,
    AlbumArtist,
    Conductor,
    Year,
    TrackNumber,
    DiscNumber,
    Popularity,
}

impl Scalar {
    pub const ALL: [Scalar; 17] = [
        Scalar::Title,
        Scalar::Artist,
        Scalar::Composer,
        Scalar::Comment,
        Scalar::Genre,
        Scalar::Album,
        Scalar::OriginalAlbum,
        Scalar::OriginalArtist,
        Scalar::Copyright,
        Scalar::Description,
        Scalar::Publisher,
        Scalar::AlbumArtist,
        Scalar::Conductor,
        Scalar::Year,
        Scalar::TrackNumber,
        Scalar::DiscNumber,
        Scalar::Popularity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scalar::Title => "title",
            Scalar::Artist => "artist",
            Scalar::Composer => "composer",
            Scalar::Comment => "comment",
            Scalar::Genre => "genre",
            Scalar::Album => "album",
            Scalar::OriginalAlbum => "originalAlbum",
            Scalar::OriginalArtist => "originalArtist",
            Scalar::Copyright => "copyright",
            Scalar::Description => "description",
            Scalar::Publisher => "publisher",
            Scalar::AlbumArtist => "albumArtist",
            Scalar::Conductor => "conductor",
            Scalar::Year => "year",
            Scalar::TrackNumber => "trackNumber",
            Scalar::DiscNumber => "discNumber",
            Scalar::Popularity => "popularity",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn number_or_empty<T: PartialEq + Default + ToString>(value: T) -> String {
    if value == T::default() {
        String::new()
    } else {
        value.to_string()
    }
}

impl Scalars {
    /// String form of one scalar. Unset numeric values are `""`.
    pub fn get(&self, scalar: Scalar) -> String {
        match scalar {
            Scalar::Title => self.title.clone(),
            Scalar::Artist => self.artist.clone(),
            Scalar::Composer => self.composer.clone(),
            Scalar::Comment => self.comment.clone(),
            Scalar::Genre => self.genre.clone(),
            Scalar::Album => self.album.clone(),
            Scalar::OriginalAlbum => self.original_album.clone(),
            Scalar::OriginalArtist => self.original_artist.clone(),
            Scalar::Copyright => self.copyright.clone(),
            Scalar::Description => self.description.clone(),
            Scalar::Publisher => self.publisher.clone(),
            Scalar::AlbumArtist => self.album_artist.clone(),
            Scalar::Conductor => self.conductor.clone(),
            Scalar::Year => number_or_empty(self.year),
            Scalar::TrackNumber => number_or_empty(self.track_number),
            Scalar::DiscNumber => number_or_empty(self.disc_number),
            Scalar::Popularity => number_or_empty(self.popularity),
        }
    }

    /// Set one scalar from its string form. Numeric scalars are parsed
    /// leniently; anything unreadable clears them.
    pub fn set(&mut self, scalar: Scalar, value: &str) {
        let text = value.to_string();
        match scalar {
            Scalar::Title => self.title = text,
            Scalar::Artist => self.artist = text,
            Scalar::Composer => self.composer = text,
            Scalar::Comment => self.comment = text,
            Scalar::Genre => self.genre = text,
            Scalar::Album => self.album = text,
            Scalar::OriginalAlbum => self.original_album = text,
            Scalar::OriginalArtist => self.original_artist = text,
            Scalar::Copyright => self.copyright = text,
            Scalar::Description => self.description = text,
            Scalar::Publisher => self.publisher = text,
            Scalar::AlbumArtist => self.album_artist = text,
            Scalar::Conductor => self.conductor = text,
            Scalar::Year => self.year = utils::extract_year(value),
            Scalar::TrackNumber => self.track_number = utils::extract_track_number(value),
            Scalar::DiscNumber => self.disc_number = utils::extract_track_number(value),
            Scalar::Popularity => {
                self.popularity = value
                    .trim()
                    .parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(|v| v.clamp(0.0, 1.0))
                    .unwrap_or_default()
            }
        }
    }
}

/// Decoded tag state of one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagData {
    pub scalars: Scalars,
    pub fields: FieldMap,
    /// Pictures with their payload. Only filled when pictures were requested.
    pub pictures: Vec<PictureInfo>,
    /// Type information of every picture, without payload.
    pub picture_tokens: Vec<PictureInfo>,
    pub chapters: Vec<ChapterInfo>,
}

impl TagData {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Merge an operation list into this state. Deletes are applied before
    /// upserts so a replaced picture slot ends up holding only the new payload.
    pub fn apply(&mut self, delta: &TagDelta) {
        for change in &delta.scalars {
            self.scalars.set(change.scalar, &change.value);
        }

        for op in &delta.fields {
            if let FieldOp::Delete { key } = op {
                self.fields.remove(key);
            }
        }
        for op in &delta.fields {
            if let FieldOp::Upsert { key, value } = op {
                self.fields.insert(key.clone(), value.clone());
            }
        }

        // Keep the namespaced copy of the description in step with the scalar.
        // A scalar change wins; otherwise an edit to the copy moves the scalar.
        if delta.changes_scalar(Scalar::Description) {
            let description = self.scalars.description.clone();
            if description.is_empty() {
                self.fields.remove(bext::DESCRIPTION);
            } else if self.fields.contains_key(bext::DESCRIPTION) {
                self.fields.insert(bext::DESCRIPTION.to_string(), description);
            }
        } else if delta.fields.iter().any(|op| op.key() == bext::DESCRIPTION) {
            self.scalars.description = self.field(bext::DESCRIPTION).unwrap_or_default().to_string();
        }

        for op in &delta.pictures {
            if let PictureOp::Delete(old) = op {
                if let Some(i) = find_picture(&self.pictures, old) {
                    self.pictures.remove(i);
                }
                if let Some(i) = self.picture_tokens.iter().position(|p| p.same_slot(old)) {
                    self.picture_tokens.remove(i);
                }
            }
        }
        for op in &delta.pictures {
            if let PictureOp::Upsert(new) = op {
                self.picture_tokens.push(new.to_token());
                self.pictures.push(new.clone());
            }
        }

        if let Some(chapters) = &delta.chapters {
            self.chapters = chapters.clone();
        }
    }
}

/// Index of the picture a delete refers to: same slot and payload, or the
/// first in the slot when the delete carries no payload.
fn find_picture(pictures: &[PictureInfo], old: &PictureInfo) -> Option<usize> {
    pictures
        .iter()
        .position(|p| p.same_slot(old) && p.data() == old.data())
        .or_else(|| {
            if old.data().is_empty() {
                pictures.iter().position(|p| p.same_slot(old))
            } else {
                None
            }
        })
}
