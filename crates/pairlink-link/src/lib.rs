//! Multiplexed device link.
//!
//! A [`Link`] turns one multiplexed physical connection into a stream of
//! framed control [`Packet`]s plus on-demand payload channels. It runs one
//! reader thread per connection, serializes control writes across callers, and
//! reports its own teardown to a [`LinkProvider`] exactly once.

pub mod config;
pub mod error;
pub mod link;
pub mod packet;
mod receive;
pub mod registry;
pub mod send;

#[cfg(test)]
mod testing;

pub use config::{LinkConfig, DEFAULT_PAYLOAD_BUFFER};
pub use error::{LinkError, Result};
pub use link::{Link, LinkProvider, LinkState, PacketReceiver, PeerInfo};
pub use packet::{Packet, Payload};
pub use registry::LinkRegistry;
pub use send::{NoopCallback, SendCallback};
