//! Recoverable dissection faults.
//!
//! A [`Fault`] is the engine's equivalent of a dissection exception: it
//! aborts work on the current packet but never the process. The dispatch
//! layer catches faults, marks the packet, and moves on to the next one.

use thiserror::Error;

/// A recoverable fault raised while dissecting a single packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// A read past the captured data.
    #[error("offset {offset} out of bounds: wanted {want} byte(s), {have} captured")]
    Bounds {
        offset: usize,
        want: usize,
        have: usize,
    },

    /// The packet data is structurally invalid for the claimed protocol.
    #[error("malformed packet: {0}")]
    Malformed(String),

    /// A dissector reported an internal error for this packet.
    #[error("dissector error: {0}")]
    Dissector(String),
}

impl Fault {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Fault::Malformed(msg.into())
    }

    pub fn dissector(msg: impl Into<String>) -> Self {
        Fault::Dissector(msg.into())
    }
}
