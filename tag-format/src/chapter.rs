use id3::frame::{Chapter, Content, Frame};

/// Offsets set to this value are unused; the chapter is located by time.
pub const NO_OFFSET: u32 = u32::MAX;

/// One chapter of a track, stored as an ID3v2 `CHAP` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterInfo {
    /// Element id. Generated on save when empty.
    pub unique_id: String,
    /// Milliseconds from the start of the track.
    pub start_time: u32,
    pub end_time: u32,
    /// Byte offsets, or [`NO_OFFSET`].
    pub start_offset: u32,
    pub end_offset: u32,
    pub title: String,
    pub subtitle: String,
}

impl Default for ChapterInfo {
    fn default() -> Self {
        ChapterInfo {
            unique_id: String::new(),
            start_time: 0,
            end_time: 0,
            start_offset: NO_OFFSET,
            end_offset: NO_OFFSET,
            title: String::new(),
            subtitle: String::new(),
        }
    }
}

impl ChapterInfo {
    pub fn new(start_time: u32, end_time: u32, title: &str) -> ChapterInfo {
        ChapterInfo {
            start_time,
            end_time,
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn from_id3(chapter: &Chapter) -> ChapterInfo {
        let text_of = |id: &str| {
            chapter
                .frames
                .iter()
                .find(|frame| frame.id() == id)
                .and_then(|frame| frame.content().text())
                .unwrap_or_default()
                .to_string()
        };
        ChapterInfo {
            unique_id: chapter.element_id.clone(),
            start_time: chapter.start_time,
            end_time: chapter.end_time,
            start_offset: chapter.start_offset,
            end_offset: chapter.end_offset,
            title: text_of("TIT2"),
            subtitle: text_of("TIT3"),
        }
    }

    /// `index` names the chapter when it has no id of its own.
    pub(crate) fn to_id3(&self, index: usize) -> Chapter {
        let mut frames = Vec::new();
        if !self.title.is_empty() {
            frames.push(Frame::text("TIT2", self.title.clone()));
        }
        if !self.subtitle.is_empty() {
            frames.push(Frame::text("TIT3", self.subtitle.clone()));
        }
        Chapter {
            element_id: if self.unique_id.is_empty() {
                format!("ch{}", index)
            } else {
                self.unique_id.clone()
            },
            start_time: self.start_time,
            end_time: self.end_time,
            start_offset: self.start_offset,
            end_offset: self.end_offset,
            frames,
        }
    }
}

/// Chapters held by a tag, in frame order.
pub(crate) fn read_chapters<'a>(frames: impl Iterator<Item = &'a Frame>) -> Vec<ChapterInfo> {
    frames
        .filter_map(|frame| match frame.content() {
            Content::Chapter(chapter) => Some(ChapterInfo::from_id3(chapter)),
            _ => None,
        })
        .collect()
}
