//! WebSocket transport for Greenroom.
//!
//! A thin layer over `tokio-tungstenite`: [`WsListener`] accepts upgraded
//! connections, [`WsConnection`] moves byte frames. The read and write
//! halves are locked independently so a server push can go out while the
//! connection's read loop is parked in [`WsConnection::recv`] — the fan-out
//! layer depends on that.

mod error;
mod websocket;

pub use error::TransportError;
pub use websocket::{WsConnection, WsListener};

use std::fmt;

/// Opaque identifier for a connection, unique for the process lifetime.
///
/// Distinct from a player identity: one player may be represented by a
/// series of connections over time (disconnect + resume), but a connection
/// never changes whose bytes it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
