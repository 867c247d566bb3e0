use std::io::{Read, Seek, Write};

use crate::error::Result;
use crate::meta::TagData;
use crate::warning::WarningSink;

/// A metadata block that lives inside a container.
///
/// `try_decode` is called with the reader at the start of a candidate block.
/// It returns `Ok(false)` when the block is not one of its own; the caller is
/// then responsible for repositioning the reader.
pub trait TagCodec {
    fn try_decode<R: Read + Seek>(
        &self,
        reader: &mut R,
        tag: &mut TagData,
        sink: &dyn WarningSink,
    ) -> Result<bool>;

    /// Write the block at the writer's position and return the number of
    /// bytes emitted.
    fn encode<W: Write + Seek>(
        &self,
        writer: &mut W,
        tag: &TagData,
        sink: &dyn WarningSink,
    ) -> Result<u64>;
}
