use std::fs::File;
use std::io;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use pairlink_link::{
    Link, LinkConfig, LinkError, LinkRegistry, Packet, PacketReceiver, Payload, PeerInfo,
    SendCallback,
};
use pairlink_transport::MemoryMultiplexer;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cmd::LoopbackArgs;
use crate::exit::{io_error, link_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_packet, OutputFormat};

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);

pub fn run(args: LoopbackArgs, format: OutputFormat) -> CliResult<i32> {
    if args.buffer_size == 0 {
        return Err(CliError::new(USAGE, "--buffer-size must be greater than zero"));
    }
    let packet = build_packet(&args.packet_type, args.body.as_deref())?;
    let payload = match &args.file {
        Some(path) => Some(open_payload(path)?),
        None => None,
    };
    let config = LinkConfig {
        payload_buffer_size: args.buffer_size,
        ..LinkConfig::default()
    };

    let (near, far) = MemoryMultiplexer::pair();
    let registry = Arc::new(LinkRegistry::new());
    let sender = Link::new(
        Arc::new(near),
        PeerInfo::new("loopback-far", "memory:1"),
        registry.clone(),
        config.clone(),
    )
    .map_err(|err| link_error("link setup failed", err))?;
    let receiver = Link::new(
        Arc::new(far),
        PeerInfo::new("loopback-near", "memory:0"),
        registry.clone(),
        config,
    )
    .map_err(|err| link_error("link setup failed", err))?;
    registry.register(sender.clone());
    registry.register(receiver.clone());

    let (tx, rx) = mpsc::channel();
    receiver
        .start_listening(Arc::new(Inbox { tx: Mutex::new(tx) }))
        .map_err(|err| link_error("listen failed", err))?;

    let mut progress = ProgressLog::default();
    let sent = sender.send_packet(packet, payload, &mut progress);
    let received = sent.map_err(|err| link_error("send failed", err)).and_then(|()| {
        rx.recv_timeout(RECEIVE_TIMEOUT)
            .map_err(|_| CliError::new(TIMEOUT, "no packet arrived on the far side"))
    });

    registry.disconnect_all();
    receiver.join();

    let (packet, payload_received) = received?;
    print_packet(&packet, payload_received, format);
    Ok(SUCCESS)
}

fn build_packet(packet_type: &str, body: Option<&str>) -> CliResult<Packet> {
    let mut packet = Packet::new(packet_type);
    if let Some(body) = body {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => packet.body = map,
            Ok(_) => return Err(CliError::new(USAGE, "--body must be a JSON object")),
            Err(err) => {
                return Err(CliError::new(USAGE, format!("--body is not valid JSON: {err}")))
            }
        }
    }
    Ok(packet)
}

fn open_payload(path: &std::path::Path) -> CliResult<Payload> {
    let context = format!("failed reading {}", path.display());
    let file = File::open(path).map_err(|err| io_error(&context, err))?;
    let size = file.metadata().map_err(|err| io_error(&context, err))?.len();
    Ok(Payload::from_reader(file, Some(size)))
}

/// Drains each payload on the reader thread and forwards the packet with the
/// byte count.
struct Inbox {
    tx: Mutex<mpsc::Sender<(Packet, Option<u64>)>>,
}

impl PacketReceiver for Inbox {
    fn on_packet_received(&self, link: &Link, packet: Packet, payload: Option<Payload>) {
        let drained = payload.and_then(|mut payload| match io::copy(&mut payload, &mut io::sink()) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                warn!(device_id = %link.peer().device_id, error = %err, "payload read failed");
                None
            }
        });
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = tx.send((packet, drained));
    }
}

#[derive(Default)]
struct ProgressLog {
    last: Option<u8>,
}

impl SendCallback for ProgressLog {
    fn on_progress(&mut self, percent: u8) {
        if self.last != Some(percent) {
            debug!(percent, "payload progress");
            self.last = Some(percent);
        }
    }

    fn on_success(&mut self) {
        debug!("send complete");
    }

    fn on_failure(&mut self, error: &LinkError) {
        debug!(%error, "send failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::NOT_FOUND;

    #[test]
    fn body_must_be_object() {
        let packet = build_packet("ping", Some(r#"{"n":1}"#)).unwrap();
        assert_eq!(packet.body_i64("n"), Some(1));

        assert_eq!(build_packet("ping", Some("[1]")).unwrap_err().code, USAGE);
        assert_eq!(build_packet("ping", Some("{")).unwrap_err().code, USAGE);
    }

    #[test]
    fn missing_payload_file_reports_not_found() {
        let err = open_payload(std::path::Path::new("/nonexistent/pairlink/payload.bin"))
            .unwrap_err();
        assert_eq!(err.code, NOT_FOUND);
    }

    #[test]
    fn progress_log_dedupes() {
        let mut log = ProgressLog::default();
        log.on_progress(50);
        log.on_progress(50);
        assert_eq!(log.last, Some(50));
    }
}
