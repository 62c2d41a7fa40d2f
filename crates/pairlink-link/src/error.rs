/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Multiplexer error.
    #[error("transport error: {0}")]
    Transport(#[from] pairlink_transport::TransportError),

    /// Control frame error.
    #[error("frame error: {0}")]
    Frame(#[from] pairlink_frame::FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while streaming a payload or spawning the reader thread.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The packet's payload transfer info does not name a channel.
    #[error("invalid payload transfer info: {0}")]
    InvalidTransferInfo(String),

    /// The receive loop is already running.
    #[error("link is already listening")]
    AlreadyListening,

    /// The link has been disconnected.
    #[error("link disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, LinkError>;
