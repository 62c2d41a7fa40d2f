//! Multiplexed device links.
//!
//! pairlink carries newline-framed JSON control packets between two paired
//! devices over one multiplexed connection, and streams bulk payloads on
//! side channels opened per transfer.
//!
//! # Crate Structure
//!
//! - [`transport`]: the multiplexer contract and an in-memory implementation
//! - [`frame`]: newline frame reassembly and writing
//! - [`link`]: packets, the per-connection link, and the link registry

/// Re-export transport types.
pub mod transport {
    pub use pairlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use pairlink_frame::*;
}

/// Re-export link types.
pub mod link {
    pub use pairlink_link::*;
}
