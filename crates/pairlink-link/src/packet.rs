use std::fmt;
use std::io::{Cursor, Read};
use std::time::{SystemTime, UNIX_EPOCH};

use pairlink_transport::{ByteReader, ChannelId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LinkError, Result};

/// Key inside `payloadTransferInfo` holding the channel id.
pub const TRANSFER_UUID_KEY: &str = "uuid";

/// Wire value of `payloadSize` for a payload of unknown length.
const UNKNOWN_PAYLOAD_SIZE: i64 = -1;

/// Control packet exchanged over the link's control stream.
///
/// Encoded as one line of compact JSON:
/// `{"id":..,"type":"..","body":{..},"payloadSize":..,"payloadTransferInfo":{"uuid":".."}}`.
/// `payloadSize` and `payloadTransferInfo` are either both present or both
/// absent on packets produced by [`Link::send_packet`](crate::Link::send_packet).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Packet {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "type")]
    pub packet_type: String,
    #[serde(default)]
    pub body: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_transfer_info: Option<Map<String, Value>>,
}

impl Packet {
    /// Create a packet with an empty body, stamped with the current time in
    /// milliseconds.
    pub fn new(packet_type: impl Into<String>) -> Self {
        let id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self {
            id,
            packet_type: packet_type.into(),
            body: Map::new(),
            payload_size: None,
            payload_transfer_info: None,
        }
    }

    /// Set a body field.
    pub fn with_body(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    pub fn body_str(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }

    pub fn body_i64(&self, key: &str) -> Option<i64> {
        self.body.get(key).and_then(Value::as_i64)
    }

    pub fn body_bool(&self, key: &str) -> Option<bool> {
        self.body.get(key).and_then(Value::as_bool)
    }

    /// Whether the packet announces a payload channel.
    pub fn has_payload_transfer_info(&self) -> bool {
        self.payload_transfer_info.is_some()
    }

    /// Declared payload length, `None` when absent or unknown.
    pub fn payload_size_hint(&self) -> Option<u64> {
        self.payload_size.and_then(|size| u64::try_from(size).ok())
    }

    /// Resolve the announced payload channel.
    ///
    /// `None` when the packet carries no transfer info; `Some(Err(..))` when
    /// the info is present but does not hold a valid channel id.
    pub fn transfer_channel(&self) -> Option<Result<ChannelId>> {
        let info = self.payload_transfer_info.as_ref()?;
        let resolved = match info.get(TRANSFER_UUID_KEY).and_then(Value::as_str) {
            Some(text) => text.parse::<ChannelId>().map_err(LinkError::from),
            None => Err(LinkError::InvalidTransferInfo(format!(
                "missing string field '{TRANSFER_UUID_KEY}'"
            ))),
        };
        Some(resolved)
    }

    /// Announce `channel` as the payload channel for a payload of `size`
    /// bytes (`None` when unknown).
    pub fn set_transfer_channel(&mut self, channel: ChannelId, size: Option<u64>) {
        let mut info = Map::new();
        info.insert(
            TRANSFER_UUID_KEY.to_string(),
            Value::String(channel.to_string()),
        );
        self.payload_transfer_info = Some(info);
        self.payload_size = Some(
            size.and_then(|size| i64::try_from(size).ok())
                .unwrap_or(UNKNOWN_PAYLOAD_SIZE),
        );
    }

    /// Drop any payload announcement.
    pub fn clear_transfer_channel(&mut self) {
        self.payload_transfer_info = None;
        self.payload_size = None;
    }

    /// Serialize to compact JSON. The output never contains a raw newline.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse one frame. A trailing delimiter is accepted.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(frame)?)
    }
}

/// Payload bytes travelling on a channel next to a control packet.
pub struct Payload {
    reader: ByteReader,
    size: Option<u64>,
}

impl Payload {
    /// Wrap a boxed reader. `size` is the total length when known.
    pub fn new(reader: ByteReader, size: Option<u64>) -> Self {
        Self { reader, size }
    }

    /// Wrap any reader.
    pub fn from_reader(reader: impl Read + Send + 'static, size: Option<u64>) -> Self {
        Self::new(Box::new(reader), size)
    }

    /// In-memory payload of known size.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let size = bytes.len() as u64;
        Self::from_reader(Cursor::new(bytes), Some(size))
    }

    /// Total length when known.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn into_reader(self) -> ByteReader {
        self.reader
    }
}

impl Read for Payload {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
