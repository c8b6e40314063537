//! Push delivery: the connection registry and the inter-process seam.
//!
//! Outbound pushes never do network I/O under the server state lock.
//! Each connection handler owns an unbounded channel; the hub enqueues
//! [`ServerMessage`]s on it while holding the lock, which preserves
//! per-lobby ordering, and the handler's writer drains the channel onto
//! the socket outside the lock.
//!
//! The [`EventBus`] trait is the seam for running several server
//! processes against shared state: every lobby push is also published as
//! a [`BusFrame`] tagged with the origin process, and the pump skips
//! frames it published itself so local clients never see a push twice.

use std::collections::HashMap;

use greenroom_protocol::{PlayerId, ServerMessage};
use greenroom_transport::ConnectionId;
use tokio::sync::{broadcast, mpsc};

// ---------------------------------------------------------------------------
// ConnectionRegistry
// ---------------------------------------------------------------------------

/// The live connection of one player.
struct PlayerLink {
    connection: ConnectionId,
    sender: mpsc::UnboundedSender<ServerMessage>,
}

/// Maps each connected player to its push channel.
///
/// This is the single source of truth for reachability: a player is
/// reachable exactly when it has an entry here. Dropping an entry closes
/// the channel, which the owning handler takes as its signal to exit.
#[derive(Default)]
pub struct ConnectionRegistry {
    links: HashMap<PlayerId, PlayerLink>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a player's connection, replacing any previous one.
    /// The replaced channel is dropped, waking its handler.
    pub fn register(
        &mut self,
        player_id: PlayerId,
        connection: ConnectionId,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) {
        self.links
            .insert(player_id, PlayerLink { connection, sender });
    }

    /// Removes a player's entry, but only if `connection` still owns it.
    /// A handler exiting after being superseded must not tear down its
    /// successor's channel.
    pub fn unregister(
        &mut self,
        player_id: PlayerId,
        connection: ConnectionId,
    ) -> bool {
        match self.links.get(&player_id) {
            Some(link) if link.connection == connection => {
                self.links.remove(&player_id);
                true
            }
            _ => false,
        }
    }

    /// Enqueues a message for one player. Silently drops the message if
    /// the player is unreachable or its handler already went away.
    pub fn send_to(&self, player_id: PlayerId, message: ServerMessage) {
        if let Some(link) = self.links.get(&player_id) {
            if link.sender.send(message).is_err() {
                tracing::debug!(%player_id, "push channel closed, dropping message");
            }
        }
    }

    /// Enqueues a message for several players.
    pub fn send_to_all<'a>(
        &self,
        players: impl IntoIterator<Item = &'a PlayerId>,
        message: &ServerMessage,
    ) {
        for player_id in players {
            self.send_to(*player_id, message.clone());
        }
    }

    pub fn connection_of(&self, player_id: PlayerId) -> Option<ConnectionId> {
        self.links.get(&player_id).map(|l| l.connection)
    }

    pub fn is_reachable(&self, player_id: PlayerId) -> bool {
        self.links.contains_key(&player_id)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Identifies one server process on the bus.
///
/// Random per process start; only equality matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(u64);

impl ProcessId {
    /// A fresh random id for this process.
    pub fn generate() -> Self {
        Self(rand::random())
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "proc-{:016x}", self.0)
    }
}

/// One lobby push traveling between server processes.
#[derive(Debug, Clone)]
pub struct BusFrame {
    /// The process that performed the mutation and already delivered the
    /// push to its own clients.
    pub origin: ProcessId,
    pub lobby_id: greenroom_protocol::LobbyId,
    pub message: ServerMessage,
}

/// The inter-process fan-out seam.
///
/// A publishing process delivers to its local clients directly and then
/// publishes the frame here; every process pumps the bus and delivers
/// frames whose origin is not itself.
pub trait EventBus: Send + Sync + 'static {
    fn publish(&self, frame: BusFrame);
    fn subscribe(&self) -> broadcast::Receiver<BusFrame>;
}

/// In-process bus: frames loop straight back to local subscribers.
///
/// With a single process every published frame comes back with our own
/// origin and the pump skips it, so the dedupe path runs continuously in
/// production, not just in tests.
pub struct LoopbackBus {
    sender: broadcast::Sender<BusFrame>,
}

impl LoopbackBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for LoopbackBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus for LoopbackBus {
    fn publish(&self, frame: BusFrame) {
        // Err just means no subscriber is pumping yet.
        let _ = self.sender.send(frame);
    }

    fn subscribe(&self) -> broadcast::Receiver<BusFrame> {
        self.sender.subscribe()
    }
}
