//! Newline-delimited control framing.
//!
//! Every control message travels as one line of UTF-8 text terminated by a
//! single `\n`. The transport underneath may split or merge lines arbitrarily;
//! [`FrameReader`] reassembles them so callers only ever see whole frames, and
//! [`FrameWriter`] emits each frame as one contiguous write.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    encode_frame, extract_frame, FrameConfig, DEFAULT_MAX_FRAME, DEFAULT_READ_CHUNK, DELIMITER,
};
pub use error::{FrameError, Result};
pub use reader::{FrameReader, Frames};
pub use writer::FrameWriter;
