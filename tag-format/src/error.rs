use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Stream ended while reading field `{field}`.")]
    Truncated {
        field: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported or unrecognised audio format. Path: '{}'", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Unsupported or unrecognised audio stream.")]
    UnrecognisedStream,

    #[error("Invalid container structure: {0}")]
    InvalidContainer(&'static str),

    #[error("Could not process ID3 tag.")]
    Id3(#[source] id3::Error),

    #[error("Failed to open audio file. Path: '{}'", .1.display())]
    OpenFailed(#[source] std::io::Error, PathBuf),

    #[error("Failed to write audio file. Path: '{}'", .1.display())]
    WriteFailed(#[source] std::io::Error, PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map a read failure on a fixed-size field. Running out of bytes is a
    /// truncated stream; anything else stays an I/O error.
    pub(crate) fn truncated(field: &'static str) -> impl FnOnce(std::io::Error) -> Error {
        move |source| match source.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::Truncated { field, source },
            _ => Error::Io(source),
        }
    }
}

impl From<id3::Error> for Error {
    fn from(e: id3::Error) -> Self {
        Error::Id3(e)
    }
}
