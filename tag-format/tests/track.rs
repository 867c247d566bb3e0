//! End-to-end load, edit and save cycles against real files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tag_format::{
    apply_and_persist, bext, load_snapshot, read_stream, ChapterInfo, CodecFamily, CollectingSink,
    Error, FieldOp, Format, PictureInfo, PictureOp, PictureType, Settings, TagDelta, Track,
};
use tempfile::TempDir;

const AUDIO_BYTES: usize = 96_000;

fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    if body.len() % 2 == 1 {
        out.push(0);
    }
    out
}

fn wav_bytes() -> Vec<u8> {
    let mut fmt = Vec::new();
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&48000u32.to_le_bytes());
    fmt.extend_from_slice(&96000u32.to_le_bytes());
    fmt.extend_from_slice(&2u16.to_le_bytes());
    fmt.extend_from_slice(&16u16.to_le_bytes());

    let audio: Vec<u8> = (0..AUDIO_BYTES).map(|i| (i % 251) as u8).collect();

    let mut body = b"WAVE".to_vec();
    body.extend(chunk(b"fmt ", &fmt));
    body.extend(chunk(b"LIST", b"INFOx"));
    body.extend(chunk(b"data", &audio));

    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend(body);
    out
}

fn tak_bytes() -> Vec<u8> {
    let w1: u16 = 0;
    let w2: u32 = 110_250;
    let w3: u32 = ((44100 - 6000) << 4) | (1 << 27);
    let mut info = w1.to_le_bytes().to_vec();
    info.extend_from_slice(&w2.to_le_bytes());
    info.extend_from_slice(&w3.to_le_bytes());

    let mut out = b"tBaK".to_vec();
    out.extend_from_slice(&(1u32 | ((info.len() as u32) << 8)).to_le_bytes());
    out.extend(info);
    out.extend_from_slice(&(4u32 | (4 << 8)).to_le_bytes());
    out.extend_from_slice(&0x0002_0200u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend(std::iter::repeat(0xA5).take(20_000));
    out
}

fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn data_chunk(path: &Path) -> Vec<u8> {
    let bytes = std::fs::read(path).unwrap();
    let pos = bytes.windows(4).position(|w| w == b"data").unwrap();
    let size = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().unwrap()) as usize;
    bytes[pos + 8..pos + 8 + size].to_vec()
}

fn png(seed: u8) -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.extend(std::iter::repeat(seed).take(64));
    data
}

#[test]
fn wav_properties() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "tone.wav", &wav_bytes());

    let track = Track::open(&path).unwrap();
    assert_eq!(track.format(), Format::Wav);
    let props = track.properties();
    assert_eq!(props.sample_rate, 48000);
    assert_eq!(props.channels, 1);
    assert_eq!(props.bits_per_sample, 16);
    assert_eq!(props.duration_ms, 1000.0);
    assert_eq!(props.codec_family, CodecFamily::Lossless);
    assert!(track.scalars().title.is_empty());
    assert!(track.fields().is_empty());
}

#[test]
fn wav_save_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "take.wav", &wav_bytes());
    let audio = data_chunk(&path);

    let mut track = Track::open(&path).unwrap();
    track.scalars_mut().title = "Take 5".into();
    track.scalars_mut().artist = "Ensemble".into();
    track.scalars_mut().description = "Room tone".into();
    track.scalars_mut().year = 2019;
    track.scalars_mut().track_number = 5;
    track.scalars_mut().popularity = 0.8;
    track
        .fields_mut()
        .insert(bext::ORIGINATOR.into(), "Recorder X".into());
    track
        .fields_mut()
        .insert(bext::LOUDNESS_VALUE.into(), "-23,5".into());
    track.fields_mut().insert("MOOD".into(), "quiet".into());
    assert!(track.is_dirty());
    track.save().unwrap();
    assert!(!track.is_dirty());

    let track = Track::open(&path).unwrap();
    let scalars = track.scalars();
    assert_eq!(scalars.title, "Take 5");
    assert_eq!(scalars.artist, "Ensemble");
    assert_eq!(scalars.description, "Room tone");
    assert_eq!(scalars.year, 2019);
    assert_eq!(scalars.track_number, 5);
    assert_eq!(scalars.popularity, 0.8);
    assert_eq!(
        track.fields().get(bext::ORIGINATOR).map(String::as_str),
        Some("Recorder X")
    );
    assert_eq!(
        track.fields().get(bext::LOUDNESS_VALUE).map(String::as_str),
        Some("-23.5")
    );
    assert_eq!(track.fields().get("MOOD").map(String::as_str), Some("quiet"));
    assert_eq!(track.properties().sample_rate, 48000);
    assert_eq!(data_chunk(&path), audio);
}

#[test]
fn saving_without_changes_leaves_file_alone() {
    let dir = TempDir::new().unwrap();
    let original = wav_bytes();
    let path = write_file(&dir, "quiet.wav", &original);

    let mut track = Track::open(&path).unwrap();
    assert!(track.pending_changes().is_empty());
    track.save().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), original);
}

#[test]
fn edits_to_one_field_keep_the_others() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "edit.wav", &wav_bytes());

    let mut track = Track::open(&path).unwrap();
    track
        .fields_mut()
        .insert(bext::ORIGINATOR.into(), "A".into());
    track
        .fields_mut()
        .insert(bext::CODING_HISTORY.into(), "A=PCM,F=48000".into());
    track.scalars_mut().title = "Title".into();
    track.save().unwrap();

    track
        .fields_mut()
        .insert(bext::ORIGINATOR.into(), "B".into());
    let delta = track.pending_changes();
    assert_eq!(
        delta.fields,
        vec![FieldOp::Upsert {
            key: bext::ORIGINATOR.into(),
            value: "B".into()
        }]
    );
    track.save().unwrap();

    assert_eq!(track.fields().get(bext::ORIGINATOR).unwrap(), "B");
    assert_eq!(
        track.fields().get(bext::CODING_HISTORY).unwrap(),
        "A=PCM,F=48000"
    );
    assert_eq!(track.scalars().title, "Title");
}

#[test]
fn editing_description_field_moves_the_scalar() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "desc.wav", &wav_bytes());

    let mut track = Track::open(&path).unwrap();
    track.scalars_mut().description = "A".into();
    track.save().unwrap();
    assert_eq!(track.fields().get(bext::DESCRIPTION).unwrap(), "A");

    track
        .fields_mut()
        .insert(bext::DESCRIPTION.into(), "B".into());
    track.save().unwrap();
    assert_eq!(track.scalars().description, "B");
    assert_eq!(track.fields().get(bext::DESCRIPTION).unwrap(), "B");

    track.fields_mut().remove(bext::DESCRIPTION);
    track.save().unwrap();
    assert!(track.scalars().description.is_empty());
    assert!(!track.fields().contains_key(bext::DESCRIPTION));
}

#[test]
fn malformed_values_are_reported_and_defaulted() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "bad.wav", &wav_bytes());
    let sink = Arc::new(CollectingSink::new());

    let mut track = load_snapshot(&path, &Settings::default(), sink.clone()).unwrap();
    track
        .fields_mut()
        .insert(bext::TIME_REFERENCE.into(), "noon".into());
    track
        .fields_mut()
        .insert(bext::MAX_TRUE_PEAK_LEVEL.into(), "400".into());
    track.save().unwrap();

    let warnings = sink.warnings();
    let fields: Vec<_> = warnings.iter().map(|w| w.field.as_str()).collect();
    assert_eq!(fields, vec![bext::TIME_REFERENCE, bext::MAX_TRUE_PEAK_LEVEL]);
    assert_eq!(warnings[0].value, "noon");

    assert_eq!(track.fields().get(bext::TIME_REFERENCE).unwrap(), "0");
    assert_eq!(track.fields().get(bext::MAX_TRUE_PEAK_LEVEL).unwrap(), "0");
}

#[test]
fn pictures_load_lazily_and_diff_by_slot() {
    let dir = TempDir::new().unwrap();
    let original = wav_bytes();
    let path = write_file(&dir, "art.wav", &original);

    let mut track = Track::open(&path).unwrap();
    assert!(track.picture_tokens().is_empty());
    {
        let pictures = track.embedded_pictures_mut().unwrap();
        pictures.push(PictureInfo::new(PictureType::Front, "image/png", png(1)));
        pictures.push(PictureInfo::from_native(0x0A, "image/png", png(2)));
    }
    track.save().unwrap();

    let tokens: Vec<_> = track
        .picture_tokens()
        .iter()
        .map(|p| (p.picture_type(), p.native_code()))
        .collect();
    assert_eq!(tokens.len(), 2);
    assert!(tokens.contains(&(PictureType::Front, 3)));
    assert!(tokens.contains(&(PictureType::Unsupported, 0x0A)));

    // Replace the front cover only.
    {
        let pictures = track.embedded_pictures_mut().unwrap();
        let front = pictures
            .iter_mut()
            .find(|p| p.picture_type() == PictureType::Front)
            .unwrap();
        *front = PictureInfo::new(PictureType::Front, "image/png", png(3));
    }
    let delta = track.pending_changes();
    assert_eq!(delta.pictures.len(), 2);
    assert!(matches!(&delta.pictures[0], PictureOp::Upsert(p) if p.data() == png(3).as_slice()));
    assert!(matches!(&delta.pictures[1], PictureOp::Delete(p) if p.data() == png(1).as_slice()));
    track.save().unwrap();

    let pictures = track.embedded_pictures().unwrap();
    assert_eq!(pictures.len(), 2);
    let front = pictures
        .iter()
        .find(|p| p.picture_type() == PictureType::Front)
        .unwrap();
    assert_eq!(front.data(), png(3).as_slice());
    let band = pictures
        .iter()
        .find(|p| p.native_code() == 0x0A)
        .unwrap();
    assert_eq!(band.data(), png(2).as_slice());

    track.embedded_pictures_mut().unwrap().clear();
    track.save().unwrap();
    assert!(track.picture_tokens().is_empty());
    assert_eq!(std::fs::read(&path).unwrap(), original);
}

#[test]
fn remove_tags_restores_untagged_file() {
    let dir = TempDir::new().unwrap();
    let original = wav_bytes();
    let path = write_file(&dir, "strip.wav", &original);

    let mut track = Track::open(&path).unwrap();
    track.scalars_mut().title = "Gone soon".into();
    track.scalars_mut().description = "bext too".into();
    track
        .fields_mut()
        .insert(bext::UMID.into(), "060A2B34".into());
    track
        .embedded_pictures_mut()
        .unwrap()
        .push(PictureInfo::new(PictureType::Back, "image/png", png(9)));
    track.save().unwrap();
    assert_ne!(std::fs::read(&path).unwrap(), original);

    track.remove_tags().unwrap();
    assert!(track.scalars().title.is_empty());
    assert!(track.fields().is_empty());
    assert_eq!(std::fs::read(&path).unwrap(), original);
}

#[test]
fn explicit_delta_through_facade() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "delta.wav", &wav_bytes());
    let track = Track::open(&path).unwrap();

    let delta = TagDelta {
        fields: vec![FieldOp::Upsert {
            key: bext::ORIGINATION_DATE.into(),
            value: "2024-02-29".into(),
        }],
        ..Default::default()
    };
    let track = apply_and_persist(track, &delta).unwrap();
    assert_eq!(
        track.fields().get(bext::ORIGINATION_DATE).unwrap(),
        "2024-02-29"
    );
}

#[test]
fn tak_tags_live_in_leading_id3v2() {
    let dir = TempDir::new().unwrap();
    let original = tak_bytes();
    let path = write_file(&dir, "song.tak", &original);

    let mut track = Track::open(&path).unwrap();
    assert_eq!(track.format(), Format::Tak);
    assert_eq!(track.properties().sample_rate, 44100);
    assert_eq!(track.properties().channels, 2);
    assert_eq!(track.properties().codec_family, CodecFamily::Lossless);
    assert_eq!(track.properties().duration_ms, 10_000.0);

    track.scalars_mut().title = "Song".into();
    track.scalars_mut().description = "Live".into();
    track.fields_mut().insert("TMOO".into(), "bright".into());
    track.fields_mut().insert("CATALOG".into(), "T-1".into());
    track.save().unwrap();

    assert_eq!(&std::fs::read(&path).unwrap()[..3], b"ID3");
    let track = Track::open(&path).unwrap();
    assert_eq!(track.format(), Format::Tak);
    assert_eq!(track.properties().sample_rate, 44100);
    assert_eq!(track.scalars().title, "Song");
    assert_eq!(track.scalars().description, "Live");
    assert_eq!(track.fields().get("TMOO").unwrap(), "bright");
    assert_eq!(track.fields().get("CATALOG").unwrap(), "T-1");

    let mut track = track;
    track.remove_tags().unwrap();
    assert_eq!(&std::fs::read(&path).unwrap()[..4], b"tBaK");
}

#[test]
fn chapters_round_trip_in_wav_and_tak() {
    let dir = TempDir::new().unwrap();
    for (name, bytes) in [("chapters.wav", wav_bytes()), ("chapters.tak", tak_bytes())] {
        let path = write_file(&dir, name, &bytes);

        let mut track = Track::open(&path).unwrap();
        assert!(track.chapters().is_empty());
        track.chapters_mut().push(ChapterInfo::new(0, 400, "Count-in"));
        track.chapters_mut().push(ChapterInfo {
            unique_id: "body".into(),
            subtitle: "main part".into(),
            ..ChapterInfo::new(400, 1000, "Body")
        });
        assert!(track.is_dirty());
        assert_eq!(track.pending_changes().chapters.as_ref().map(Vec::len), Some(2));
        track.save().unwrap();

        let track = Track::open(&path).unwrap();
        let chapters = track.chapters();
        assert_eq!(chapters.len(), 2, "{}", name);
        assert_eq!(chapters[0].unique_id, "ch0");
        assert_eq!(chapters[0].title, "Count-in");
        assert_eq!(chapters[1].unique_id, "body");
        assert_eq!(chapters[1].subtitle, "main part");
        assert_eq!((chapters[1].start_time, chapters[1].end_time), (400, 1000));

        let mut track = track;
        track.chapters_mut().clear();
        track.save().unwrap();
        assert!(track.chapters().is_empty());
        let after = std::fs::read(&path).unwrap();
        if track.format() == Format::Wav {
            assert_eq!(after, bytes);
        } else {
            assert_eq!(&after[..4], b"tBaK");
        }
    }
}

#[test]
fn tagged_bytes_load_from_memory() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "memory.wav", &wav_bytes());
    let mut track = Track::open(&path).unwrap();
    track.scalars_mut().title = "Buffered".into();
    track
        .fields_mut()
        .insert(bext::ORIGINATOR.into(), "Desk".into());
    track
        .embedded_pictures_mut()
        .unwrap()
        .push(PictureInfo::new(PictureType::Front, "image/png", png(4)));
    track.save().unwrap();

    let mut cursor = std::io::Cursor::new(std::fs::read(&path).unwrap());
    let sink = CollectingSink::new();
    let (format, loaded) = read_stream(&mut cursor, &Settings::default(), &sink).unwrap();
    assert_eq!(format, Format::Wav);
    assert_eq!(loaded.tags.scalars.title, "Buffered");
    assert_eq!(loaded.tags.field(bext::ORIGINATOR), Some("Desk"));
    assert_eq!(loaded.tags.pictures.len(), 1);
    assert_eq!(loaded.tags.pictures[0].data(), png(4).as_slice());
    assert_eq!(loaded.properties.sample_rate, 48000);
    assert!(sink.is_empty());

    let mut cursor = std::io::Cursor::new(b"just some text".to_vec());
    assert!(matches!(
        read_stream(&mut cursor, &Settings::default(), &sink),
        Err(Error::UnrecognisedStream)
    ));
}

#[test]
fn file_name_stands_in_for_missing_title() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "Field Notes 3.wav", &wav_bytes());
    let settings = Settings {
        use_file_name_when_no_title: true,
        ..Default::default()
    };

    let track = load_snapshot(&path, &settings, Arc::new(CollectingSink::new())).unwrap();
    assert_eq!(track.scalars().title, "Field Notes 3");
    assert!(!track.is_dirty());
}

#[test]
fn unknown_files_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "notes.txt", b"just some text, nothing audio");
    match Track::open(&path) {
        Err(Error::UnsupportedFormat(p)) => assert_eq!(p, path),
        other => panic!("unexpected result: {:?}", other),
    }

    match Track::open(dir.path().join("missing.wav")) {
        Err(Error::OpenFailed(_, _)) => {}
        other => panic!("unexpected result: {:?}", other),
    }
}
