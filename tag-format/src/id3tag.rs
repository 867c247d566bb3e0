//! Mapping between ID3v2 frames and [`TagData`].

use std::io::{Read, Seek};

use id3::frame::{Comment, Content, ExtendedText, Picture, PictureType as Id3PictureType, Popularimeter};
use id3::{Tag, TagLike};

use crate::chapter;
use crate::diff::{FieldOp, PictureOp, TagDelta};
use crate::error::Result;
use crate::meta::{Scalar, TagData};
use crate::picture::PictureInfo;
use crate::settings::Id3Version;
use crate::utils::{decode_popularity, encode_popularity, RatingConvention};
use crate::warning::{self, WarningSink};

const TEXT_SCALARS: [(Scalar, &str); 13] = [
    (Scalar::Title, "TIT2"),
    (Scalar::Artist, "TPE1"),
    (Scalar::Album, "TALB"),
    (Scalar::AlbumArtist, "TPE2"),
    (Scalar::Composer, "TCOM"),
    (Scalar::Genre, "TCON"),
    (Scalar::Copyright, "TCOP"),
    (Scalar::Publisher, "TPUB"),
    (Scalar::Conductor, "TPE3"),
    (Scalar::OriginalArtist, "TOPE"),
    (Scalar::OriginalAlbum, "TOAL"),
    (Scalar::TrackNumber, "TRCK"),
    (Scalar::DiscNumber, "TPOS"),
];
const DESCRIPTION_FRAME: &str = "TIT3";
const YEAR_FRAMES: [&str; 2] = ["TDRC", "TYER"];

/// How a container uses its ID3v2 tag.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Id3Mapping {
    /// Whether the description scalar lives in `TIT3`.
    pub description: bool,
    /// Fields with this prefix belong to another block and are never
    /// written to, or read from, the ID3 tag.
    pub reserved_prefix: Option<&'static str>,
    pub read_all_meta_frames: bool,
    pub version: Id3Version,
}

impl Id3Mapping {
    fn scalar_for(&self, id: &str) -> Option<Scalar> {
        if self.description && id == DESCRIPTION_FRAME {
            return Some(Scalar::Description);
        }
        TEXT_SCALARS
            .iter()
            .find(|(_, frame)| *frame == id)
            .map(|(scalar, _)| *scalar)
    }

    fn frame_for(&self, scalar: Scalar) -> Option<&'static str> {
        if scalar == Scalar::Description {
            return self.description.then_some(DESCRIPTION_FRAME);
        }
        TEXT_SCALARS
            .iter()
            .find(|(s, _)| *s == scalar)
            .map(|(_, frame)| *frame)
    }

    fn is_reserved(&self, key: &str) -> bool {
        self.reserved_prefix
            .map_or(false, |prefix| key.starts_with(prefix))
    }

    fn is_generic_text_frame(&self, key: &str) -> bool {
        self.read_all_meta_frames && is_text_frame_id(key) && self.scalar_for(key).is_none()
    }
}

/// `T` followed by three upper-case letters or digits, other than `TXXX`.
pub(crate) fn is_text_frame_id(key: &str) -> bool {
    key.len() == 4
        && key.starts_with('T')
        && key != "TXXX"
        && key
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

pub(crate) fn native_picture_code(picture_type: Id3PictureType) -> u8 {
    match picture_type {
        Id3PictureType::Other => 0,
        Id3PictureType::Icon => 1,
        Id3PictureType::OtherIcon => 2,
        Id3PictureType::CoverFront => 3,
        Id3PictureType::CoverBack => 4,
        Id3PictureType::Leaflet => 5,
        Id3PictureType::Media => 6,
        Id3PictureType::LeadArtist => 7,
        Id3PictureType::Artist => 8,
        Id3PictureType::Conductor => 9,
        Id3PictureType::Band => 10,
        Id3PictureType::Composer => 11,
        Id3PictureType::Lyricist => 12,
        Id3PictureType::RecordingLocation => 13,
        Id3PictureType::DuringRecording => 14,
        Id3PictureType::DuringPerformance => 15,
        Id3PictureType::ScreenCapture => 16,
        Id3PictureType::BrightFish => 17,
        Id3PictureType::Illustration => 18,
        Id3PictureType::BandLogo => 19,
        Id3PictureType::PublisherLogo => 20,
        Id3PictureType::Undefined(code) => code,
    }
}

pub(crate) fn id3_picture_type(code: u8) -> Id3PictureType {
    match code {
        0 => Id3PictureType::Other,
        1 => Id3PictureType::Icon,
        2 => Id3PictureType::OtherIcon,
        3 => Id3PictureType::CoverFront,
        4 => Id3PictureType::CoverBack,
        5 => Id3PictureType::Leaflet,
        6 => Id3PictureType::Media,
        7 => Id3PictureType::LeadArtist,
        8 => Id3PictureType::Artist,
        9 => Id3PictureType::Conductor,
        10 => Id3PictureType::Band,
        11 => Id3PictureType::Composer,
        12 => Id3PictureType::Lyricist,
        13 => Id3PictureType::RecordingLocation,
        14 => Id3PictureType::DuringRecording,
        15 => Id3PictureType::DuringPerformance,
        16 => Id3PictureType::ScreenCapture,
        17 => Id3PictureType::BrightFish,
        18 => Id3PictureType::Illustration,
        19 => Id3PictureType::BandLogo,
        20 => Id3PictureType::PublisherLogo,
        other => Id3PictureType::Undefined(other),
    }
}

fn recover(mut err: id3::Error, sink: &dyn WarningSink) -> Result<Option<Tag>> {
    if matches!(err.kind, id3::ErrorKind::NoTag) {
        return Ok(None);
    }
    match err.partial_tag.take() {
        Some(tag) => {
            warning::emit(sink, "id3", &err.description, "using partially read ID3v2 tag");
            Ok(Some(tag))
        }
        None => Err(err.into()),
    }
}

/// Read an ID3v2 tag at the reader's position. `Ok(None)` when there is none.
/// A tag that is only partly readable is kept and reported to `sink`.
pub(crate) fn read_from<R: Read + Seek>(reader: R, sink: &dyn WarningSink) -> Result<Option<Tag>> {
    match Tag::read_from2(reader) {
        Ok(tag) => Ok(Some(tag)),
        Err(err) => recover(err, sink),
    }
}

pub(crate) fn is_empty(tag: &Tag) -> bool {
    tag.frames().next().is_none()
}

/// Merge the frames of `tag` into `data`.
pub(crate) fn read_tag(tag: &Tag, data: &mut TagData, mapping: &Id3Mapping, read_pictures: bool) {
    for frame in tag.frames() {
        let id = frame.id();
        match frame.content() {
            Content::Text(text) => {
                if let Some(scalar) = mapping.scalar_for(id) {
                    data.scalars.set(scalar, text);
                } else if YEAR_FRAMES.contains(&id) {
                    if data.scalars.year == 0 {
                        data.scalars.set(Scalar::Year, text);
                    }
                } else if mapping.is_generic_text_frame(id) {
                    data.fields.insert(id.to_string(), text.clone());
                }
            }
            Content::ExtendedText(et) => {
                if !mapping.is_reserved(&et.description) {
                    data.fields.insert(et.description.clone(), et.value.clone());
                }
            }
            Content::Comment(c) => {
                if data.scalars.comment.is_empty() {
                    data.scalars.comment = c.text.clone();
                }
            }
            Content::Popularimeter(p) => {
                data.scalars.popularity =
                    decode_popularity(f64::from(p.rating), RatingConvention::Id3v2);
            }
            Content::Picture(p) => {
                let picture = PictureInfo::from_native(
                    native_picture_code(p.picture_type),
                    &p.mime_type,
                    if read_pictures { p.data.clone() } else { Vec::new() },
                )
                .with_description(&p.description);
                data.picture_tokens.push(picture.to_token());
                if read_pictures {
                    data.pictures.push(picture);
                }
            }
            _ => {}
        }
    }
    data.chapters.extend(chapter::read_chapters(tag.frames()));
}

fn set_or_remove(tag: &mut Tag, id: &str, value: &str) {
    if value.is_empty() {
        tag.remove(id);
    } else {
        tag.set_text(id, value);
    }
}

/// Modify `tag` in place so it reflects `delta`. Frames the delta does not
/// mention are left alone.
pub(crate) fn apply_delta(tag: &mut Tag, delta: &TagDelta, mapping: &Id3Mapping) {
    for change in &delta.scalars {
        let value = change.value.as_str();
        match change.scalar {
            Scalar::Year => {
                for id in YEAR_FRAMES {
                    tag.remove(id);
                }
                if !value.is_empty() {
                    tag.set_text(mapping.version.year_frame(), value);
                }
            }
            Scalar::Comment => {
                tag.remove("COMM");
                if !value.is_empty() {
                    tag.add_frame(Comment {
                        lang: "eng".to_string(),
                        description: String::new(),
                        text: value.to_string(),
                    });
                }
            }
            Scalar::Popularity => {
                tag.remove("POPM");
                let fraction = value.parse::<f64>().unwrap_or_default();
                if fraction > 0.0 {
                    let stars = (fraction * 500.0).round() / 100.0;
                    tag.add_frame(Popularimeter {
                        user: String::new(),
                        rating: encode_popularity(stars, RatingConvention::Id3v2),
                        counter: 0,
                    });
                }
            }
            scalar => {
                if let Some(id) = mapping.frame_for(scalar) {
                    set_or_remove(tag, id, value);
                }
            }
        }
    }

    let field_ops = delta
        .fields
        .iter()
        .filter(|op| !mapping.is_reserved(op.key()));
    for op in field_ops.clone() {
        if let FieldOp::Delete { key } = op {
            if mapping.is_generic_text_frame(key) {
                tag.remove(key);
            } else {
                tag.remove_extended_text(Some(key.as_str()), None);
            }
        }
    }
    for op in field_ops {
        if let FieldOp::Upsert { key, value } = op {
            if mapping.is_generic_text_frame(key) {
                set_or_remove(tag, key, value);
            } else {
                tag.remove_extended_text(Some(key.as_str()), None);
                tag.add_frame(ExtendedText {
                    description: key.clone(),
                    value: value.clone(),
                });
            }
        }
    }

    let deletes: Vec<&PictureInfo> = delta
        .pictures
        .iter()
        .filter_map(|op| match op {
            PictureOp::Delete(old) => Some(old),
            PictureOp::Upsert(_) => None,
        })
        .collect();
    if !deletes.is_empty() {
        let mut pictures: Vec<Picture> = tag.pictures().cloned().collect();
        for old in deletes {
            if let Some(i) = find_picture(&pictures, old) {
                pictures.remove(i);
            }
        }
        tag.remove_all_pictures();
        for picture in pictures {
            tag.add_frame(picture);
        }
    }
    for op in &delta.pictures {
        if let PictureOp::Upsert(new) = op {
            tag.add_frame(Picture {
                mime_type: new.mime_type().to_string(),
                picture_type: id3_picture_type(new.native_code()),
                description: new.description().to_string(),
                data: new.data().to_vec(),
            });
        }
    }

    if let Some(chapters) = &delta.chapters {
        tag.remove("CHAP");
        tag.remove("CTOC");
        for (index, chapter) in chapters.iter().enumerate() {
            tag.add_frame(chapter.to_id3(index));
        }
    }
}

/// The frame a picture delete refers to: same type and payload, or the first
/// of its type when the delete carries no payload.
fn find_picture(pictures: &[Picture], old: &PictureInfo) -> Option<usize> {
    let code = old.native_code();
    let same_slot = |p: &Picture| native_picture_code(p.picture_type) == code;
    pictures
        .iter()
        .position(|p| same_slot(p) && p.data.as_slice() == old.data())
        .or_else(|| {
            if old.data().is_empty() {
                pictures.iter().position(|p| same_slot(p))
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapter::ChapterInfo;
    use crate::diff::ScalarChange;
    use crate::picture::PictureType;
    use crate::warning::CollectingSink;

    fn mapping() -> Id3Mapping {
        Id3Mapping {
            description: true,
            reserved_prefix: None,
            read_all_meta_frames: true,
            version: Id3Version::V24,
        }
    }

    fn read(tag: &Tag, mapping: &Id3Mapping) -> TagData {
        let mut data = TagData::default();
        read_tag(tag, &mut data, mapping, true);
        data
    }

    #[test]
    fn text_frames_map_to_scalars() {
        let mut tag = Tag::new();
        tag.set_text("TIT2", "Song");
        tag.set_text("TPE1", "Singer");
        tag.set_text("TIT3", "Subtitle");
        tag.set_text("TRCK", "4/10");
        tag.set_text("TDRC", "2003-05-01");
        tag.set_text("TMOO", "calm");

        let data = read(&tag, &mapping());
        assert_eq!(data.scalars.title, "Song");
        assert_eq!(data.scalars.artist, "Singer");
        assert_eq!(data.scalars.description, "Subtitle");
        assert_eq!(data.scalars.track_number, 4);
        assert_eq!(data.scalars.year, 2003);
        assert_eq!(data.field("TMOO"), Some("calm"));

        let narrow = Id3Mapping {
            description: false,
            read_all_meta_frames: false,
            ..mapping()
        };
        let data = read(&tag, &narrow);
        assert!(data.scalars.description.is_empty());
        assert!(data.fields.is_empty());
    }

    #[test]
    fn apply_writes_scalars_fields_and_pictures() {
        let mut tag = Tag::new();
        tag.set_text("TALB", "Old album");
        tag.add_frame(ExtendedText {
            description: "CATALOG".into(),
            value: "X-1".into(),
        });

        let picture = PictureInfo::new(PictureType::Front, "image/png", vec![0x89, b'P', b'N', b'G']);
        let delta = TagDelta {
            scalars: vec![
                ScalarChange {
                    scalar: Scalar::Album,
                    value: String::new(),
                },
                ScalarChange {
                    scalar: Scalar::Comment,
                    value: "nice".into(),
                },
                ScalarChange {
                    scalar: Scalar::Popularity,
                    value: "0.6".into(),
                },
                ScalarChange {
                    scalar: Scalar::Year,
                    value: "1977".into(),
                },
            ],
            fields: vec![
                FieldOp::Delete {
                    key: "CATALOG".into(),
                },
                FieldOp::Upsert {
                    key: "MOOD".into(),
                    value: "upbeat".into(),
                },
                FieldOp::Upsert {
                    key: "TMOO".into(),
                    value: "calm".into(),
                },
            ],
            pictures: vec![PictureOp::Upsert(picture.clone())],
            chapters: None,
        };
        apply_delta(&mut tag, &delta, &mapping());

        assert!(tag.get("TALB").is_none());
        assert!(tag.get("TMOO").is_some());
        assert!(tag.get("TDRC").is_some());

        let data = read(&tag, &mapping());
        assert_eq!(data.scalars.comment, "nice");
        assert_eq!(data.scalars.popularity, 0.6);
        assert_eq!(data.scalars.year, 1977);
        assert_eq!(data.field("MOOD"), Some("upbeat"));
        assert_eq!(data.field("TMOO"), Some("calm"));
        assert_eq!(data.field("CATALOG"), None);
        assert_eq!(data.pictures, vec![picture]);
    }

    #[test]
    fn reserved_prefix_stays_out_of_the_tag() {
        let wav = Id3Mapping {
            description: false,
            reserved_prefix: Some("bext."),
            ..mapping()
        };
        let mut tag = Tag::new();
        apply_delta(
            &mut tag,
            &TagDelta {
                scalars: vec![ScalarChange {
                    scalar: Scalar::Description,
                    value: "bext only".into(),
                }],
                fields: vec![FieldOp::Upsert {
                    key: "bext.originator".into(),
                    value: "me".into(),
                }],
                ..Default::default()
            },
            &wav,
        );
        assert!(is_empty(&tag));
    }

    #[test]
    fn unsupported_picture_codes_survive() {
        assert_eq!(native_picture_code(id3_picture_type(0x0A)), 0x0A);
        assert_eq!(native_picture_code(id3_picture_type(0x30)), 0x30);

        let mut tag = Tag::new();
        tag.add_frame(Picture {
            mime_type: "image/jpeg".into(),
            picture_type: Id3PictureType::Band,
            description: String::new(),
            data: vec![1, 2, 3],
        });
        let data = read(&tag, &mapping());
        assert_eq!(data.pictures[0].picture_type(), PictureType::Unsupported);
        assert_eq!(data.pictures[0].native_code(), 10);

        apply_delta(
            &mut tag,
            &TagDelta {
                pictures: vec![PictureOp::Delete(data.pictures[0].clone())],
                ..Default::default()
            },
            &mapping(),
        );
        assert!(is_empty(&tag));
    }

    #[test]
    fn tokens_without_payload() {
        let mut tag = Tag::new();
        tag.add_frame(Picture {
            mime_type: "image/jpeg".into(),
            picture_type: Id3PictureType::CoverBack,
            description: String::new(),
            data: vec![1, 2, 3],
        });
        let mut data = TagData::default();
        read_tag(&tag, &mut data, &mapping(), false);
        assert!(data.pictures.is_empty());
        assert_eq!(data.picture_tokens.len(), 1);
        assert_eq!(data.picture_tokens[0].picture_type(), PictureType::Back);
    }

    #[test]
    fn text_frame_ids() {
        assert!(is_text_frame_id("TMOO"));
        assert!(is_text_frame_id("TSO2"));
        assert!(!is_text_frame_id("TXXX"));
        assert!(!is_text_frame_id("COMM"));
        assert!(!is_text_frame_id("Tmoo"));
        assert!(!is_text_frame_id("bext.version"));
    }

    #[test]
    fn missing_tag_is_none() {
        let sink = CollectingSink::new();
        let bytes = std::io::Cursor::new(b"tBaK\0\0\0\0".to_vec());
        assert!(read_from(bytes, &sink).unwrap().is_none());
        assert!(sink.is_empty());
    }

    #[test]
    fn partial_tag_is_reported_to_the_sink() {
        let sink = CollectingSink::new();
        let err = id3::Error {
            kind: id3::ErrorKind::Parsing,
            description: "bad frame".into(),
            partial_tag: Some(Tag::new()),
        };
        assert!(recover(err, &sink).unwrap().is_some());

        let warnings = sink.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "id3");
        assert_eq!(warnings[0].value, "bad frame");
    }

    #[test]
    fn unreadable_tag_without_partial_is_an_error() {
        let sink = CollectingSink::new();
        let err = id3::Error::new(id3::ErrorKind::Parsing, "bad header");
        assert!(recover(err, &sink).is_err());
        assert!(sink.is_empty());
    }

    #[test]
    fn chapters_replace_chap_frames() {
        let mut tag = Tag::new();
        tag.add_frame(ChapterInfo::new(0, 1000, "Old").to_id3(0));

        let chapters = vec![
            ChapterInfo::new(0, 5000, "Intro"),
            ChapterInfo::new(5000, 9000, "Verse"),
        ];
        apply_delta(
            &mut tag,
            &TagDelta {
                chapters: Some(chapters.clone()),
                ..Default::default()
            },
            &mapping(),
        );

        let data = read(&tag, &mapping());
        assert_eq!(data.chapters.len(), 2);
        assert_eq!(data.chapters[0].unique_id, "ch0");
        assert_eq!(data.chapters[1].title, "Verse");
        assert_eq!(data.chapters[1].start_time, 5000);

        apply_delta(
            &mut tag,
            &TagDelta {
                chapters: Some(Vec::new()),
                ..Default::default()
            },
            &mapping(),
        );
        assert!(is_empty(&tag));
    }

    #[test]
    fn delete_removes_only_the_matching_payload() {
        let mut tag = Tag::new();
        tag.add_frame(Picture {
            mime_type: "image/png".into(),
            picture_type: Id3PictureType::CoverFront,
            description: String::new(),
            data: vec![1, 2, 3],
        });
        tag.add_frame(Picture {
            mime_type: "image/png".into(),
            picture_type: Id3PictureType::CoverBack,
            description: String::new(),
            data: vec![4, 5, 6],
        });

        let back = PictureInfo::new(PictureType::Back, "image/png", vec![9, 9]);
        apply_delta(
            &mut tag,
            &TagDelta {
                pictures: vec![PictureOp::Delete(back)],
                ..Default::default()
            },
            &mapping(),
        );
        assert_eq!(tag.pictures().count(), 2);

        let front = PictureInfo::new(PictureType::Front, "image/png", vec![1, 2, 3]);
        apply_delta(
            &mut tag,
            &TagDelta {
                pictures: vec![PictureOp::Delete(front)],
                ..Default::default()
            },
            &mapping(),
        );
        let data = read(&tag, &mapping());
        assert_eq!(data.pictures.len(), 1);
        assert_eq!(data.pictures[0].picture_type(), PictureType::Back);
    }
}
