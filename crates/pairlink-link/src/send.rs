//! Outbound packets and payload streaming.

use std::io::{ErrorKind, Read, Write};

use pairlink_frame::FrameError;
use pairlink_transport::ChannelId;
use tracing::{debug, warn};

use crate::error::{LinkError, Result};
use crate::link::Link;
use crate::packet::{Packet, Payload};

/// Observer of a single send.
///
/// Exactly one of [`on_success`](Self::on_success) or
/// [`on_failure`](Self::on_failure) is called per send. Progress is only
/// reported for payloads of known, non-zero size.
pub trait SendCallback {
    /// Percentage of the payload written so far, 0 through 100.
    fn on_progress(&mut self, _percent: u8) {}

    fn on_success(&mut self);

    fn on_failure(&mut self, error: &LinkError);
}

/// Callback that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallback;

impl SendCallback for NoopCallback {
    fn on_success(&mut self) {}

    fn on_failure(&mut self, _error: &LinkError) {}
}

impl Link {
    /// Send `packet`, then stream `payload` on a fresh channel.
    ///
    /// When a payload is given, a channel is opened first and announced in the
    /// packet's transfer info; without one, any transfer info the packet
    /// carries is removed. A packet too large to frame fails before any
    /// channel is opened, and a channel whose packet could not be written is
    /// discarded. The control writer is held only while the frame itself is
    /// written, so other sends can proceed while the payload streams.
    pub fn send_packet(
        &self,
        mut packet: Packet,
        payload: Option<Payload>,
        callback: &mut dyn SendCallback,
    ) -> Result<()> {
        match self.try_send(&mut packet, payload, callback) {
            Ok(()) => {
                debug!(
                    device_id = %self.peer().device_id,
                    packet_type = %packet.packet_type,
                    "packet sent"
                );
                callback.on_success();
                Ok(())
            }
            Err(err) => {
                warn!(
                    device_id = %self.peer().device_id,
                    packet_type = %packet.packet_type,
                    error = %err,
                    "send failed"
                );
                callback.on_failure(&err);
                Err(err)
            }
        }
    }

    /// Send a packet without payload or callback.
    pub fn send(&self, packet: Packet) -> Result<()> {
        self.send_packet(packet, None, &mut NoopCallback)
    }

    fn try_send(
        &self,
        packet: &mut Packet,
        payload: Option<Payload>,
        callback: &mut dyn SendCallback,
    ) -> Result<()> {
        if !self.is_connected() {
            return Err(LinkError::Disconnected);
        }

        let channel = match &payload {
            Some(payload) => {
                packet.set_transfer_channel(ChannelId::nil(), payload.size());
                self.check_frame_size(&packet.encode()?)?;
                let channel = self.multiplexer().open_channel()?;
                packet.set_transfer_channel(channel, payload.size());
                Some(channel)
            }
            None => {
                packet.clear_transfer_channel();
                None
            }
        };

        let written = packet.encode().and_then(|encoded| {
            self.control_writer()
                .send(&encoded)
                .map_err(LinkError::from)
        });
        if let Err(err) = written {
            if let Some(channel) = channel {
                self.release_channel(channel);
            }
            return Err(err);
        }

        if let (Some(channel), Some(payload)) = (channel, payload) {
            let output = match self.multiplexer().output_stream(channel) {
                Ok(output) => output,
                Err(err) => {
                    self.release_channel(channel);
                    return Err(err.into());
                }
            };
            debug!(
                device_id = %self.peer().device_id,
                %channel,
                size = ?payload.size(),
                "streaming payload"
            );
            stream_payload(
                payload,
                output,
                self.config().payload_buffer_size,
                callback,
            )?;
        }

        Ok(())
    }

    /// Reject a control frame the writer would refuse, before any channel
    /// is opened for it.
    fn check_frame_size(&self, encoded: &[u8]) -> Result<()> {
        let size = encoded.len() + 1;
        let max = self.config().frame.max_frame_size;
        if size > max {
            return Err(FrameError::FrameTooLarge { size, max }.into());
        }
        Ok(())
    }

    fn release_channel(&self, channel: ChannelId) {
        if let Err(err) = self.multiplexer().discard_channel(channel) {
            debug!(
                device_id = %self.peer().device_id,
                %channel,
                error = %err,
                "ignoring error while discarding channel"
            );
        }
    }
}

/// Copy `payload` into `output` in `buffer_size` chunks, reporting progress
/// after each chunk when the total is known.
fn stream_payload(
    mut payload: Payload,
    mut output: impl Write,
    buffer_size: usize,
    callback: &mut dyn SendCallback,
) -> Result<u64> {
    let total = payload.size().filter(|&size| size > 0);
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut sent = 0u64;

    loop {
        let n = match payload.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        output.write_all(&buf[..n])?;
        sent += n as u64;

        if let Some(total) = total {
            callback.on_progress(percent(sent, total));
        }
    }

    output.flush()?;
    Ok(sent)
}

fn percent(sent: u64, total: u64) -> u8 {
    let pct = u128::from(sent) * 100 / u128::from(total);
    u8::try_from(pct.min(100)).unwrap_or(100)
}
