use std::cell::OnceCell;
use std::fmt;

/// Normalised picture category. Anything that is not one of the common slots
/// is `Unsupported` and identified by its native code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PictureType {
    Generic,
    Front,
    Back,
    Cd,
    Unsupported,
}

impl PictureType {
    /// Map an ID3v2 APIC picture type byte.
    pub fn from_native(code: u8) -> PictureType {
        match code {
            0 => PictureType::Generic,
            3 => PictureType::Front,
            4 => PictureType::Back,
            6 => PictureType::Cd,
            _ => PictureType::Unsupported,
        }
    }

    pub fn native_code(self) -> Option<u8> {
        match self {
            PictureType::Generic => Some(0),
            PictureType::Front => Some(3),
            PictureType::Back => Some(4),
            PictureType::Cd => Some(6),
            PictureType::Unsupported => None,
        }
    }
}

impl fmt::Display for PictureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PictureType::Generic => "generic",
            PictureType::Front => "front",
            PictureType::Back => "back",
            PictureType::Cd => "cd",
            PictureType::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// An embedded picture.
///
/// Two pictures occupy the same slot when their type matches and, for
/// `Unsupported`, their native code matches too. The content hash is computed
/// once on first use and reused by every later comparison.
#[derive(Clone)]
pub struct PictureInfo {
    picture_type: PictureType,
    native_code: u8,
    mime_type: String,
    description: String,
    data: Vec<u8>,
    hash: OnceCell<blake3::Hash>,
}

impl PictureInfo {
    pub fn new(picture_type: PictureType, mime_type: &str, data: Vec<u8>) -> PictureInfo {
        PictureInfo {
            picture_type,
            native_code: picture_type.native_code().unwrap_or_default(),
            mime_type: mime_type.to_string(),
            description: String::new(),
            data,
            hash: OnceCell::new(),
        }
    }

    /// Build from a native code, classifying it on the way.
    pub fn from_native(native_code: u8, mime_type: &str, data: Vec<u8>) -> PictureInfo {
        PictureInfo {
            picture_type: PictureType::from_native(native_code),
            native_code,
            mime_type: mime_type.to_string(),
            description: String::new(),
            data,
            hash: OnceCell::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> PictureInfo {
        self.description = description.to_string();
        self
    }

    /// Copy of the type information with no payload.
    pub fn to_token(&self) -> PictureInfo {
        PictureInfo {
            picture_type: self.picture_type,
            native_code: self.native_code,
            mime_type: self.mime_type.clone(),
            description: self.description.clone(),
            data: Vec::new(),
            hash: OnceCell::new(),
        }
    }

    pub fn picture_type(&self) -> PictureType {
        self.picture_type
    }

    pub fn native_code(&self) -> u8 {
        self.native_code
    }

    pub fn mime_type(&self) -> &str {
        if self.mime_type.is_empty() {
            detect_mime(&self.data)
        } else {
            &self.mime_type
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn hash(&self) -> &blake3::Hash {
        self.hash.get_or_init(|| blake3::hash(&self.data))
    }

    pub fn same_slot(&self, other: &PictureInfo) -> bool {
        if self.picture_type != other.picture_type {
            return false;
        }
        self.picture_type != PictureType::Unsupported || self.native_code == other.native_code
    }
}

impl PartialEq for PictureInfo {
    fn eq(&self, other: &PictureInfo) -> bool {
        self.same_slot(other)
            && self.description == other.description
            && self.mime_type == other.mime_type
            && self.data == other.data
    }
}

impl fmt::Debug for PictureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PictureInfo")
            .field("picture_type", &self.picture_type)
            .field("native_code", &self.native_code)
            .field("mime_type", &self.mime_type)
            .field("description", &self.description)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Guess the MIME type of image data from its leading bytes.
pub fn detect_mime(data: &[u8]) -> &'static str {
    match data {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'B', b'M', ..] => "image/bmp",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "application/octet-stream",
    }
}
