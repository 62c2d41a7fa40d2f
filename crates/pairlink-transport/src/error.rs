use crate::traits::ChannelId;

/// Errors reported by a multiplexer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the physical connection.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel id is not known to the multiplexer (never opened, already
    /// consumed, or discarded by close).
    #[error("unknown channel {0}")]
    UnknownChannel(ChannelId),

    /// A channel id string could not be parsed.
    #[error("invalid channel id '{0}'")]
    InvalidChannelId(String),

    /// The control stream halves were already handed out.
    #[error("control stream already taken")]
    ControlStreamTaken,

    /// The multiplexer has been closed.
    #[error("multiplexer closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
