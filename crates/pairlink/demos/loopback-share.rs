//! Two links over an in-memory multiplexer pair: one side shares a payload,
//! the other drains it.
//!
//! Run with:
//!   cargo run -p pairlink --example loopback-share

use std::io::{self, Read};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pairlink::link::{
    Link, LinkConfig, LinkError, LinkRegistry, Packet, PacketReceiver, Payload, PeerInfo,
    SendCallback,
};
use pairlink::transport::MemoryMultiplexer;

struct Printer {
    done: Mutex<mpsc::Sender<()>>,
}

impl PacketReceiver for Printer {
    fn on_packet_received(&self, link: &Link, packet: Packet, payload: Option<Payload>) {
        let received = match payload {
            Some(mut payload) => {
                let mut data = Vec::new();
                payload.read_to_end(&mut data).map(|_| data.len()).unwrap_or(0)
            }
            None => 0,
        };
        eprintln!(
            "{} received '{}' with {received} payload bytes",
            link.peer().device_id,
            packet.packet_type
        );
        if let Ok(done) = self.done.lock() {
            let _ = done.send(());
        }
    }
}

struct Progress;

impl SendCallback for Progress {
    fn on_progress(&mut self, percent: u8) {
        eprintln!("sent {percent}%");
    }

    fn on_success(&mut self) {
        eprintln!("share complete");
    }

    fn on_failure(&mut self, error: &LinkError) {
        eprintln!("share failed: {error}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (phone_side, laptop_side) = MemoryMultiplexer::pair();
    let registry = Arc::new(LinkRegistry::new());
    let config = LinkConfig {
        payload_buffer_size: 4096,
        ..LinkConfig::default()
    };

    let to_laptop = Link::new(
        Arc::new(phone_side),
        PeerInfo::new("laptop", "memory:laptop"),
        registry.clone(),
        config.clone(),
    )?;
    let to_phone = Link::new(
        Arc::new(laptop_side),
        PeerInfo::new("phone", "memory:phone"),
        registry.clone(),
        config,
    )?;
    registry.register(to_laptop.clone());
    registry.register(to_phone.clone());

    let (done_tx, done_rx) = mpsc::channel();
    to_phone.start_listening(Arc::new(Printer {
        done: Mutex::new(done_tx),
    }))?;

    let photo = vec![0xA5u8; 20_000];
    let packet = Packet::new("share.request").with_body("filename", "photo.jpg");
    to_laptop.send_packet(packet, Some(Payload::from_bytes(photo)), &mut Progress)?;

    done_rx
        .recv_timeout(Duration::from_secs(5))
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "nothing arrived"))?;

    registry.disconnect_all();
    to_phone.join();
    eprintln!("links left: {}", registry.len());
    Ok(())
}
