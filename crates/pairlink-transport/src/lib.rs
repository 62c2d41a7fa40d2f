//! Channel multiplexer contract for pairlink links.
//!
//! A physical duplex connection is shared between one control stream and any
//! number of on-demand payload channels. How the bytes are interleaved on the
//! wire belongs to the [`Multiplexer`] implementation; links only use the
//! contract defined here.
//!
//! [`MemoryMultiplexer`] provides an in-process connected pair, used by the
//! CLI loopback command and by tests.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemoryMultiplexer;
pub use traits::{ByteReader, ByteWriter, ChannelId, Multiplexer};
