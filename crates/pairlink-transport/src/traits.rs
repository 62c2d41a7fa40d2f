use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use uuid::Uuid;

use crate::error::{Result, TransportError};

/// Readable half of a control stream or payload channel.
pub type ByteReader = Box<dyn Read + Send>;

/// Writable half of a control stream or payload channel.
///
/// Dropping the writer releases the channel on the sending side; the reading
/// side then observes end-of-stream once buffered bytes are drained.
pub type ByteWriter = Box<dyn Write + Send>;

/// Opaque identifier of a payload channel.
///
/// Unique per physical connection. The textual form is a hyphenated UUID,
/// which is what gets embedded in control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(Uuid);

impl ChannelId {
    /// Generate a fresh random channel id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// All-zero id. Never returned by a multiplexer; its text has the same
    /// length as any real id.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for ChannelId {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| TransportError::InvalidChannelId(s.to_string()))
    }
}

/// Shares one physical connection between a control stream and on-demand
/// payload channels.
///
/// Implementations own channel-level concurrency: readers and writers handed
/// out for different channels may be used from different threads at once.
pub trait Multiplexer: Send + Sync {
    /// Hand out the two halves of the control stream.
    ///
    /// Called once per connection by the link that owns it.
    fn control_stream(&self) -> Result<(ByteReader, ByteWriter)>;

    /// Allocate a new payload channel.
    fn open_channel(&self) -> Result<ChannelId>;

    /// Reader for a channel opened by either side of the connection.
    ///
    /// Fails with [`TransportError::UnknownChannel`] when the id does not
    /// name a live channel.
    fn input_stream(&self, id: ChannelId) -> Result<ByteReader>;

    /// Writer for a channel opened on this side of the connection.
    fn output_stream(&self, id: ChannelId) -> Result<ByteWriter>;

    /// Drop a channel whose transfer will not happen.
    ///
    /// Handles already given out for it see end-of-stream (readers) or fail
    /// (writers). Discarding an unknown channel is not an error.
    fn discard_channel(&self, id: ChannelId) -> Result<()>;

    /// Close the physical connection and every outstanding channel.
    ///
    /// Idempotent. Blocked readers wake up and observe end-of-stream; later
    /// writes fail.
    fn close(&self) -> Result<()>;
}
