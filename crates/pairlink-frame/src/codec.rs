use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame delimiter.
pub const DELIMITER: u8 = b'\n';

/// Default maximum frame size, delimiter included: 16 MiB.
pub const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024;

/// Default number of bytes requested per read from the control stream.
pub const DEFAULT_READ_CHUNK: usize = 512;

/// Append `text` plus the delimiter to `dst`.
///
/// Wire format:
/// ```text
/// ┌──────────────────────────────┬──────┐
/// │ UTF-8 text (no raw newline)  │ 0x0A │
/// └──────────────────────────────┴──────┘
/// ```
pub fn encode_frame(text: &[u8], dst: &mut BytesMut) -> Result<()> {
    if text.contains(&DELIMITER) {
        return Err(FrameError::EmbeddedDelimiter);
    }
    dst.reserve(text.len() + 1);
    dst.put_slice(text);
    dst.put_u8(DELIMITER);
    Ok(())
}

/// Extract the first complete frame from a buffer.
///
/// The delimiter search starts at `from`; callers pass the length of a prefix
/// already known to hold no delimiter. Returns `None` if no delimiter follows.
/// On success the frame, delimiter included, is removed from the head of the
/// buffer; bytes after the delimiter stay buffered.
pub fn extract_frame(src: &mut BytesMut, from: usize) -> Option<Bytes> {
    let pos = src.get(from..)?.iter().position(|&b| b == DELIMITER)?;
    Some(src.split_to(from + pos + 1).freeze())
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum frame size in bytes, delimiter included. Default: 16 MiB.
    pub max_frame_size: usize,
    /// Bytes requested per read. Default: 512.
    pub read_chunk_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME,
            read_chunk_size: DEFAULT_READ_CHUNK,
        }
    }
}
