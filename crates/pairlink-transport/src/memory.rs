use std::collections::{HashMap, VecDeque};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{ByteReader, ByteWriter, ChannelId, Multiplexer};

/// One end of an in-process connected multiplexer pair.
///
/// Bytes written to the control stream of one end are read from the control
/// stream of the other. Channels live in a table shared by both ends, so a
/// channel opened on one end can be read from the other. Every channel is a
/// one-way unbounded pipe: no flow control is applied.
pub struct MemoryMultiplexer {
    hub: Arc<Hub>,
    side: usize,
    control_taken: AtomicBool,
}

impl MemoryMultiplexer {
    /// Create two connected ends.
    pub fn pair() -> (Self, Self) {
        let hub = Arc::new(Hub {
            state: Mutex::new(HubState {
                closed: false,
                channels: HashMap::new(),
            }),
            control: [Arc::new(Pipe::new()), Arc::new(Pipe::new())],
        });
        let left = Self {
            hub: Arc::clone(&hub),
            side: 0,
            control_taken: AtomicBool::new(false),
        };
        let right = Self {
            hub,
            side: 1,
            control_taken: AtomicBool::new(false),
        };
        (left, right)
    }

    /// Whether either end has closed the connection.
    pub fn is_closed(&self) -> bool {
        self.hub.lock().closed
    }

    /// Number of channels still tracked (not yet fully handed out).
    pub fn pending_channels(&self) -> usize {
        self.hub.lock().channels.len()
    }
}

impl Multiplexer for MemoryMultiplexer {
    fn control_stream(&self) -> Result<(ByteReader, ByteWriter)> {
        if self.hub.lock().closed {
            return Err(TransportError::Closed);
        }
        if self.control_taken.swap(true, Ordering::SeqCst) {
            return Err(TransportError::ControlStreamTaken);
        }
        let outbound = Arc::clone(&self.hub.control[self.side]);
        let inbound = Arc::clone(&self.hub.control[1 - self.side]);
        Ok((
            Box::new(PipeReader { pipe: inbound }),
            Box::new(PipeWriter { pipe: outbound }),
        ))
    }

    fn open_channel(&self) -> Result<ChannelId> {
        let mut state = self.hub.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        let id = loop {
            let candidate = ChannelId::random();
            if !state.channels.contains_key(&candidate) {
                break candidate;
            }
        };
        state.channels.insert(
            id,
            ChannelEntry {
                pipe: Arc::new(Pipe::new()),
                reader_taken: false,
                writer_taken: false,
            },
        );
        debug!(channel = %id, side = self.side, "opened channel");
        Ok(id)
    }

    fn input_stream(&self, id: ChannelId) -> Result<ByteReader> {
        let pipe = self.hub.take_half(id, Half::Reader)?;
        Ok(Box::new(PipeReader { pipe }))
    }

    fn output_stream(&self, id: ChannelId) -> Result<ByteWriter> {
        let pipe = self.hub.take_half(id, Half::Writer)?;
        Ok(Box::new(PipeWriter { pipe }))
    }

    fn discard_channel(&self, id: ChannelId) -> Result<()> {
        if let Some(entry) = self.hub.lock().channels.remove(&id) {
            entry.pipe.tear_down();
            debug!(channel = %id, side = self.side, "discarded channel");
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.hub.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        for pipe in &self.hub.control {
            pipe.tear_down();
        }
        for (_, entry) in state.channels.drain() {
            entry.pipe.tear_down();
        }
        debug!(side = self.side, "closed in-memory connection");
        Ok(())
    }
}

impl std::fmt::Debug for MemoryMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMultiplexer")
            .field("side", &self.side)
            .field("closed", &self.is_closed())
            .finish()
    }
}

struct Hub {
    state: Mutex<HubState>,
    control: [Arc<Pipe>; 2],
}

struct HubState {
    closed: bool,
    channels: HashMap<ChannelId, ChannelEntry>,
}

#[derive(Clone, Copy)]
enum Half {
    Reader,
    Writer,
}

struct ChannelEntry {
    pipe: Arc<Pipe>,
    reader_taken: bool,
    writer_taken: bool,
}

impl Hub {
    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand out one half of a channel. The entry is forgotten once both
    /// halves are out; the pipe itself lives on in the handles.
    fn take_half(&self, id: ChannelId, half: Half) -> Result<Arc<Pipe>> {
        let mut state = self.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        let entry = state
            .channels
            .get_mut(&id)
            .ok_or(TransportError::UnknownChannel(id))?;
        let taken = match half {
            Half::Reader => &mut entry.reader_taken,
            Half::Writer => &mut entry.writer_taken,
        };
        if *taken {
            return Err(TransportError::UnknownChannel(id));
        }
        *taken = true;
        let pipe = Arc::clone(&entry.pipe);
        if entry.reader_taken && entry.writer_taken {
            state.channels.remove(&id);
        }
        Ok(pipe)
    }
}

struct Pipe {
    state: Mutex<PipeState>,
    readable: Condvar,
}

#[derive(Default)]
struct PipeState {
    buf: VecDeque<u8>,
    /// Writer released: readers drain what is buffered, then see EOF.
    write_closed: bool,
    /// Connection closed: writes fail, readers drain then see EOF.
    torn_down: bool,
}

impl Pipe {
    fn new() -> Self {
        Self {
            state: Mutex::new(PipeState::default()),
            readable: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tear_down(&self) {
        self.lock().torn_down = true;
        self.readable.notify_all();
    }

    fn close_write(&self) {
        self.lock().write_closed = true;
        self.readable.notify_all();
    }
}

struct PipeReader {
    pipe: Arc<Pipe>,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.pipe.lock();
        loop {
            if !state.buf.is_empty() {
                let n = buf.len().min(state.buf.len());
                for (slot, byte) in buf.iter_mut().zip(state.buf.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if state.write_closed || state.torn_down {
                return Ok(0);
            }
            state = self
                .pipe
                .readable
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

struct PipeWriter {
    pipe: Arc<Pipe>,
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self.pipe.lock();
        if state.torn_down || state.write_closed {
            return Err(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "in-memory connection closed",
            ));
        }
        state.buf.extend(buf);
        drop(state);
        self.pipe.readable.notify_all();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if self.pipe.lock().torn_down {
            return Err(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "in-memory connection closed",
            ));
        }
        Ok(())
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.pipe.close_write();
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn control_stream_crosses_ends() {
        let (left, right) = MemoryMultiplexer::pair();
        let (_left_rx, mut left_tx) = left.control_stream().unwrap();
        let (mut right_rx, _right_tx) = right.control_stream().unwrap();

        left_tx.write_all(b"hello\n").unwrap();

        let mut buf = [0u8; 16];
        let n = right_rx.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello\n");
    }

    #[test]
    fn control_stream_taken_once() {
        let (left, _right) = MemoryMultiplexer::pair();
        let _halves = left.control_stream().unwrap();
        assert!(matches!(
            left.control_stream(),
            Err(TransportError::ControlStreamTaken)
        ));
    }

    #[test]
    fn channel_opened_on_one_end_readable_on_other() {
        let (left, right) = MemoryMultiplexer::pair();
        let id = left.open_channel().unwrap();

        let mut writer = left.output_stream(id).unwrap();
        let mut reader = right.input_stream(id).unwrap();

        writer.write_all(b"payload").unwrap();
        drop(writer);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"payload");
        assert_eq!(left.pending_channels(), 0);
    }

    #[test]
    fn unknown_channel_rejected() {
        let (left, right) = MemoryMultiplexer::pair();
        let id = ChannelId::random();
        assert!(matches!(
            right.input_stream(id),
            Err(TransportError::UnknownChannel(got)) if got == id
        ));

        let opened = left.open_channel().unwrap();
        let _reader = right.input_stream(opened).unwrap();
        assert!(matches!(
            right.input_stream(opened),
            Err(TransportError::UnknownChannel(_))
        ));
    }

    #[test]
    fn discard_forgets_channel_and_ends_reader() {
        let (left, right) = MemoryMultiplexer::pair();
        let unused = left.open_channel().unwrap();
        let half_taken = left.open_channel().unwrap();
        let mut reader = right.input_stream(half_taken).unwrap();
        assert_eq!(left.pending_channels(), 2);

        left.discard_channel(unused).unwrap();
        right.discard_channel(half_taken).unwrap();
        left.discard_channel(unused).unwrap();

        assert_eq!(left.pending_channels(), 0);
        assert!(matches!(
            left.output_stream(unused),
            Err(TransportError::UnknownChannel(_))
        ));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn close_wakes_blocked_reader() {
        let (left, right) = MemoryMultiplexer::pair();
        let (mut right_rx, _right_tx) = right.control_stream().unwrap();

        let reader = thread::spawn(move || {
            let mut buf = [0u8; 8];
            right_rx.read(&mut buf).unwrap()
        });

        thread::sleep(Duration::from_millis(20));
        left.close().unwrap();

        assert_eq!(reader.join().unwrap(), 0);
        assert!(right.is_closed());
    }

    #[test]
    fn close_is_idempotent_and_fails_later_writes() {
        let (left, right) = MemoryMultiplexer::pair();
        let (_rx, mut tx) = left.control_stream().unwrap();

        left.close().unwrap();
        left.close().unwrap();
        right.close().unwrap();

        let err = tx.write(b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
        assert!(matches!(left.open_channel(), Err(TransportError::Closed)));
    }

    #[test]
    fn close_discards_pending_channels() {
        let (left, right) = MemoryMultiplexer::pair();
        let id = left.open_channel().unwrap();
        assert_eq!(left.pending_channels(), 1);

        right.close().unwrap();

        assert_eq!(left.pending_channels(), 0);
        assert!(matches!(
            left.output_stream(id),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn buffered_bytes_survive_close() {
        let (left, right) = MemoryMultiplexer::pair();
        let (_left_rx, mut left_tx) = left.control_stream().unwrap();
        let (mut right_rx, _right_tx) = right.control_stream().unwrap();

        left_tx.write_all(b"last words").unwrap();
        left.close().unwrap();

        let mut out = Vec::new();
        right_rx.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"last words");
    }
}
