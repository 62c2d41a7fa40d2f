//! The link's reader thread.
//!
//! Pulls frames off the control stream, decodes them, attaches the payload
//! channel a packet announces, and hands the result to the consumer. Bad
//! frames and unresolvable payloads are logged and skipped; end of stream or
//! a read error ends the loop and disconnects the link.

use std::sync::Arc;

use pairlink_frame::{FrameError, FrameReader};
use pairlink_transport::ByteReader;
use tracing::{debug, error, info, warn};

use crate::link::{Link, PacketReceiver};
use crate::packet::{Packet, Payload};

pub(crate) fn run(
    link: Link,
    mut reader: FrameReader<ByteReader>,
    receiver: Arc<dyn PacketReceiver>,
) {
    let device_id = link.peer().device_id.clone();
    debug!(%device_id, "receive loop started");

    for frame in reader.frames() {
        if !link.is_connected() {
            break;
        }
        match frame {
            Ok(frame) => process_frame(&link, &frame, receiver.as_ref()),
            Err(FrameError::ConnectionClosed) => {
                if link.is_connected() {
                    info!(%device_id, "control stream closed by peer");
                }
                break;
            }
            Err(err) => {
                if link.is_connected() {
                    error!(%device_id, error = %err, "connection likely broken");
                } else {
                    debug!(%device_id, error = %err, "read failed after disconnect");
                }
                break;
            }
        }
    }

    link.disconnect();
    debug!(%device_id, "receive loop finished");
}

fn process_frame(link: &Link, frame: &[u8], receiver: &dyn PacketReceiver) {
    let device_id = &link.peer().device_id;

    let packet = match Packet::decode(frame) {
        Ok(packet) => packet,
        Err(err) => {
            warn!(
                %device_id,
                error = %err,
                bytes = frame.len(),
                "unable to parse frame, discarding"
            );
            return;
        }
    };

    let payload = attach_payload(link, &packet);
    debug!(
        %device_id,
        packet_type = %packet.packet_type,
        has_payload = payload.is_some(),
        "packet received"
    );
    receiver.on_packet_received(link, packet, payload);
}

fn attach_payload(link: &Link, packet: &Packet) -> Option<Payload> {
    let resolved = packet.transfer_channel()?.and_then(|channel| {
        let input = link.multiplexer().input_stream(channel)?;
        Ok((channel, input))
    });

    match resolved {
        Ok((channel, input)) => {
            debug!(
                device_id = %link.peer().device_id,
                %channel,
                size = ?packet.payload_size_hint(),
                "attached payload channel"
            );
            Some(Payload::new(input, packet.payload_size_hint()))
        }
        Err(err) => {
            warn!(
                device_id = %link.peer().device_id,
                packet_type = %packet.packet_type,
                error = %err,
                "unable to get payload, delivering packet without it"
            );
            None
        }
    }
}
