use pairlink_frame::FrameConfig;

/// Default chunk size for streaming payloads: 1 KiB.
pub const DEFAULT_PAYLOAD_BUFFER: usize = 1024;

/// Controls link behavior.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Control frame limits and read chunk size.
    pub frame: FrameConfig,
    /// Bytes copied per write when streaming a payload. Progress is reported
    /// once per chunk.
    pub payload_buffer_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            payload_buffer_size: DEFAULT_PAYLOAD_BUFFER,
        }
    }
}
