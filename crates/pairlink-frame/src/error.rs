/// Errors that can occur while reading or writing control frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A frame (or a pending partial frame) exceeds the configured maximum.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Outbound frame text contains a raw delimiter.
    #[error("frame text contains a raw newline")]
    EmbeddedDelimiter,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended. Any unterminated partial frame is dropped.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
