//! Read and rewrite audio metadata in WAV (`bext`, `id3 ` chunks) and TAK
//! (leading ID3v2) files.

pub mod bext;
mod chapter;
mod codec;
mod diff;
mod error;
pub mod field;
mod format;
mod id3tag;
mod meta;
mod picture;
mod riff;
mod settings;
mod snapshot;
pub mod tak;
mod track;
pub mod utils;
mod warning;

pub use bext::BextCodec;
pub use chapter::{ChapterInfo, NO_OFFSET};
pub use codec::TagCodec;
pub use diff::{
    diff_chapters, diff_fields, diff_pictures, diff_scalars, FieldOp, PictureDiff, PictureOp,
    ScalarChange, TagDelta,
};
pub use error::{Error, Result};
pub use field::Endian;
pub use format::{read_stream, AudioProperties, CodecFamily, Format, LoadedFile};
pub use meta::{FieldMap, Scalar, Scalars, TagData};
pub use picture::{PictureInfo, PictureType};
pub use riff::WaveFormat;
pub use settings::{Id3Version, Settings};
pub use snapshot::Snapshot;
pub use track::{apply_and_persist, load_snapshot, Track};
pub use warning::{CollectingSink, TracingSink, Warning, WarningSink};
