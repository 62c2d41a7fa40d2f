use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use pairlink_frame::{FrameReader, FrameWriter};
use pairlink_transport::{ByteReader, ByteWriter, Multiplexer};
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::packet::{Packet, Payload};

const CONSTRUCTED: u8 = 0;
const LISTENING: u8 = 1;
const DISCONNECTED: u8 = 2;

/// Lifecycle of a link. `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Constructed,
    Listening,
    Disconnected,
}

impl LinkState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            CONSTRUCTED => Self::Constructed,
            LISTENING => Self::Listening,
            _ => Self::Disconnected,
        }
    }
}

/// Identity of the remote device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerInfo {
    pub device_id: String,
    /// Transport-level address (for example a Bluetooth MAC).
    pub address: String,
}

impl PeerInfo {
    pub fn new(device_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            address: address.into(),
        }
    }
}

/// Consumer of inbound packets.
///
/// Called from the link's reader thread, once per decoded frame, in receive
/// order. The payload reader, when present, belongs to the consumer.
pub trait PacketReceiver: Send + Sync {
    fn on_packet_received(&self, link: &Link, packet: Packet, payload: Option<Payload>);
}

/// Owner of a set of links, told when one of them goes away.
pub trait LinkProvider: Send + Sync {
    /// Called exactly once per link, when it becomes disconnected.
    fn on_link_disconnected(&self, link: &Link, device_id: &str, address: &str);
}

/// One device link over a multiplexed physical connection.
///
/// `Link` is a shared handle: clones refer to the same connection. Control
/// packets written through any clone are serialized on one writer; payloads
/// stream on their own channels without holding that writer.
#[derive(Clone)]
pub struct Link {
    shared: Arc<Shared>,
}

struct Shared {
    peer: PeerInfo,
    multiplexer: Arc<dyn Multiplexer>,
    provider: Arc<dyn LinkProvider>,
    config: LinkConfig,
    state: AtomicU8,
    writer: Mutex<FrameWriter<ByteWriter>>,
    reader: Mutex<Option<FrameReader<ByteReader>>>,
    reader_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Link {
    /// Link name reported to the pairing layer.
    pub const NAME: &'static str = "MultiplexedLink";

    /// Take over the control stream of `multiplexer`.
    ///
    /// The link starts in [`LinkState::Constructed`]; nothing is read until
    /// [`start_listening`](Self::start_listening).
    pub fn new(
        multiplexer: Arc<dyn Multiplexer>,
        peer: PeerInfo,
        provider: Arc<dyn LinkProvider>,
        config: LinkConfig,
    ) -> Result<Self> {
        let (input, output) = multiplexer.control_stream()?;
        let reader = FrameReader::with_config(input, config.frame.clone());
        let writer = FrameWriter::with_config(output, config.frame.clone());

        Ok(Self {
            shared: Arc::new(Shared {
                peer,
                multiplexer,
                provider,
                config,
                state: AtomicU8::new(CONSTRUCTED),
                writer: Mutex::new(writer),
                reader: Mutex::new(Some(reader)),
                reader_thread: Mutex::new(None),
            }),
        })
    }

    /// Spawn the reader thread. Only the first call starts one.
    pub fn start_listening(&self, receiver: Arc<dyn PacketReceiver>) -> Result<()> {
        match self.shared.state.compare_exchange(
            CONSTRUCTED,
            LISTENING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {}
            Err(LISTENING) => return Err(LinkError::AlreadyListening),
            Err(_) => return Err(LinkError::Disconnected),
        }

        let reader = lock(&self.shared.reader)
            .take()
            .ok_or(LinkError::AlreadyListening)?;

        let link = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("pairlink-rx-{}", self.shared.peer.device_id))
            .spawn(move || crate::receive::run(link, reader, receiver));

        match spawned {
            Ok(handle) => {
                *lock(&self.shared.reader_thread) = Some(handle);
                info!(
                    device_id = %self.shared.peer.device_id,
                    address = %self.shared.peer.address,
                    "link listening"
                );
                Ok(())
            }
            Err(err) => {
                // The reader moved into the closure and is gone with it.
                self.disconnect();
                Err(LinkError::Io(err))
            }
        }
    }

    /// Tear the link down.
    ///
    /// Stops the reader thread at its next boundary, closes the multiplexer
    /// (best effort, errors are dropped) and notifies the provider. Only the
    /// first call notifies; every call retries the close.
    pub fn disconnect(&self) {
        let previous = self.shared.state.swap(DISCONNECTED, Ordering::SeqCst);

        if let Err(err) = self.shared.multiplexer.close() {
            debug!(
                device_id = %self.shared.peer.device_id,
                error = %err,
                "ignoring error while closing connection"
            );
        }

        if previous == DISCONNECTED {
            return;
        }

        info!(
            device_id = %self.shared.peer.device_id,
            address = %self.shared.peer.address,
            "link disconnected"
        );
        self.shared.provider.on_link_disconnected(
            self,
            &self.shared.peer.device_id,
            &self.shared.peer.address,
        );
    }

    /// Wait for the reader thread to finish.
    ///
    /// Returns immediately when listening never started, when another caller
    /// already joined, or when called from the reader thread itself.
    pub fn join(&self) {
        let handle = {
            let mut slot = lock(&self.shared.reader_thread);
            let on_reader_thread = slot
                .as_ref()
                .is_some_and(|handle| handle.thread().id() == thread::current().id());
            if on_reader_thread {
                return;
            }
            slot.take()
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(
                    device_id = %self.shared.peer.device_id,
                    "reader thread panicked"
                );
            }
        }
    }

    pub fn state(&self) -> LinkState {
        LinkState::from_raw(self.shared.state.load(Ordering::SeqCst))
    }

    /// True until the link is disconnected.
    pub fn is_connected(&self) -> bool {
        self.shared.state.load(Ordering::SeqCst) != DISCONNECTED
    }

    pub fn peer(&self) -> &PeerInfo {
        &self.shared.peer
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn config(&self) -> &LinkConfig {
        &self.shared.config
    }

    /// Whether two handles refer to the same link.
    pub fn same_link(&self, other: &Link) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub(crate) fn multiplexer(&self) -> &dyn Multiplexer {
        self.shared.multiplexer.as_ref()
    }

    pub(crate) fn control_writer(&self) -> MutexGuard<'_, FrameWriter<ByteWriter>> {
        lock(&self.shared.writer)
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("peer", &self.shared.peer)
            .field("state", &self.state())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
