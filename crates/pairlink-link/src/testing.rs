//! Shared fixtures for the crate's unit tests.

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pairlink_transport::{
    ByteReader, ByteWriter, ChannelId, MemoryMultiplexer, Multiplexer, TransportError,
};

use crate::error::LinkError;
use crate::link::{Link, LinkProvider, PacketReceiver};
use crate::packet::{Packet, Payload};
use crate::send::SendCallback;

pub(crate) const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Forwards every received packet to an mpsc channel.
pub(crate) struct ChannelReceiver {
    tx: Mutex<mpsc::Sender<(Packet, Option<Payload>)>>,
    join_on_receive: bool,
}

impl ChannelReceiver {
    pub(crate) fn new() -> (Arc<Self>, mpsc::Receiver<(Packet, Option<Payload>)>) {
        Self::build(false)
    }

    /// Receiver that calls [`Link::join`] from inside the callback.
    pub(crate) fn joining() -> (Arc<Self>, mpsc::Receiver<(Packet, Option<Payload>)>) {
        Self::build(true)
    }

    fn build(join_on_receive: bool) -> (Arc<Self>, mpsc::Receiver<(Packet, Option<Payload>)>) {
        let (tx, rx) = mpsc::channel();
        let receiver = Arc::new(Self {
            tx: Mutex::new(tx),
            join_on_receive,
        });
        (receiver, rx)
    }
}

impl PacketReceiver for ChannelReceiver {
    fn on_packet_received(&self, link: &Link, packet: Packet, payload: Option<Payload>) {
        if self.join_on_receive {
            link.join();
        }
        let _ = self.tx.lock().unwrap().send((packet, payload));
    }
}

/// Records every disconnect notification.
#[derive(Default)]
pub(crate) struct RecordingProvider {
    events: Mutex<Vec<(String, String)>>,
}

impl RecordingProvider {
    pub(crate) fn events(&self) -> Vec<(String, String)> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl LinkProvider for RecordingProvider {
    fn on_link_disconnected(&self, _link: &Link, device_id: &str, address: &str) {
        self.events
            .lock()
            .unwrap()
            .push((device_id.to_string(), address.to_string()));
    }
}

/// Memory multiplexer whose `close` always fails.
pub(crate) struct FailingCloseMultiplexer {
    inner: MemoryMultiplexer,
    _peer: MemoryMultiplexer,
    close_calls: AtomicUsize,
}

impl FailingCloseMultiplexer {
    pub(crate) fn new() -> Self {
        let (inner, peer) = MemoryMultiplexer::pair();
        Self {
            inner,
            _peer: peer,
            close_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl Multiplexer for FailingCloseMultiplexer {
    fn control_stream(&self) -> pairlink_transport::Result<(ByteReader, ByteWriter)> {
        self.inner.control_stream()
    }

    fn open_channel(&self) -> pairlink_transport::Result<ChannelId> {
        self.inner.open_channel()
    }

    fn input_stream(&self, id: ChannelId) -> pairlink_transport::Result<ByteReader> {
        self.inner.input_stream(id)
    }

    fn output_stream(&self, id: ChannelId) -> pairlink_transport::Result<ByteWriter> {
        self.inner.output_stream(id)
    }

    fn discard_channel(&self, id: ChannelId) -> pairlink_transport::Result<()> {
        self.inner.discard_channel(id)
    }

    fn close(&self) -> pairlink_transport::Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::Io(io::Error::new(
            io::ErrorKind::Other,
            "socket already gone",
        )))
    }
}

/// Memory multiplexer that counts opened channels and payload writes.
pub(crate) struct CountingMultiplexer {
    inner: MemoryMultiplexer,
    opened: Mutex<Vec<ChannelId>>,
    payload_writes: Arc<AtomicUsize>,
}

impl CountingMultiplexer {
    pub(crate) fn new(inner: MemoryMultiplexer) -> Self {
        Self {
            inner,
            opened: Mutex::new(Vec::new()),
            payload_writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub(crate) fn last_opened(&self) -> Option<ChannelId> {
        self.opened.lock().unwrap().last().copied()
    }

    pub(crate) fn payload_writes(&self) -> usize {
        self.payload_writes.load(Ordering::SeqCst)
    }
}

impl Multiplexer for CountingMultiplexer {
    fn control_stream(&self) -> pairlink_transport::Result<(ByteReader, ByteWriter)> {
        self.inner.control_stream()
    }

    fn open_channel(&self) -> pairlink_transport::Result<ChannelId> {
        let id = self.inner.open_channel()?;
        self.opened.lock().unwrap().push(id);
        Ok(id)
    }

    fn input_stream(&self, id: ChannelId) -> pairlink_transport::Result<ByteReader> {
        self.inner.input_stream(id)
    }

    fn output_stream(&self, id: ChannelId) -> pairlink_transport::Result<ByteWriter> {
        let inner = self.inner.output_stream(id)?;
        Ok(Box::new(CountingWriter {
            inner,
            writes: Arc::clone(&self.payload_writes),
        }))
    }

    fn discard_channel(&self, id: ChannelId) -> pairlink_transport::Result<()> {
        self.inner.discard_channel(id)
    }

    fn close(&self) -> pairlink_transport::Result<()> {
        self.inner.close()
    }
}

/// Memory multiplexer whose control stream rejects every write.
pub(crate) struct BrokenControlMultiplexer {
    inner: MemoryMultiplexer,
}

impl BrokenControlMultiplexer {
    pub(crate) fn new(inner: MemoryMultiplexer) -> Self {
        Self { inner }
    }
}

impl Multiplexer for BrokenControlMultiplexer {
    fn control_stream(&self) -> pairlink_transport::Result<(ByteReader, ByteWriter)> {
        let (reader, _writer) = self.inner.control_stream()?;
        Ok((reader, Box::new(BrokenWriter)))
    }

    fn open_channel(&self) -> pairlink_transport::Result<ChannelId> {
        self.inner.open_channel()
    }

    fn input_stream(&self, id: ChannelId) -> pairlink_transport::Result<ByteReader> {
        self.inner.input_stream(id)
    }

    fn output_stream(&self, id: ChannelId) -> pairlink_transport::Result<ByteWriter> {
        self.inner.output_stream(id)
    }

    fn discard_channel(&self, id: ChannelId) -> pairlink_transport::Result<()> {
        self.inner.discard_channel(id)
    }

    fn close(&self) -> pairlink_transport::Result<()> {
        self.inner.close()
    }
}

struct BrokenWriter;

impl Write for BrokenWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct CountingWriter {
    inner: ByteWriter,
    writes: Arc<AtomicUsize>,
}

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Records every callback event of a send.
#[derive(Default)]
pub(crate) struct RecordingCallback {
    pub(crate) progress: Vec<u8>,
    pub(crate) successes: usize,
    pub(crate) failures: Vec<String>,
}

impl SendCallback for RecordingCallback {
    fn on_progress(&mut self, percent: u8) {
        self.progress.push(percent);
    }

    fn on_success(&mut self) {
        self.successes += 1;
    }

    fn on_failure(&mut self, error: &LinkError) {
        self.failures.push(error.to_string());
    }
}
