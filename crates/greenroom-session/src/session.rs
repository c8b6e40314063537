//! Session types: the server's record of one player's presence.

use std::time::Instant;

use greenroom_protocol::PlayerId;
use greenroom_transport::ConnectionId;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long (in seconds) a silent or disconnected player keeps its
    /// session before it is permanently expired. Refreshed on every
    /// authenticated action.
    pub grace_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { grace_secs: 60 }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The current state of a player's session.
///
/// ```text
///   Connected ──(disconnect)──→ Disconnected ──(grace elapsed)──→ Expired
///       ↑                            │
///       └─────────(resume)───────────┘
/// ```
///
/// `Instant` is the monotonic clock — immune to wall-clock adjustments,
/// which matters for grace-period arithmetic.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// A live connection currently represents this player.
    Connected,

    /// The connection dropped at `since`; the player has until
    /// `since + grace` to resume.
    Disconnected { since: Instant },

    /// Grace period elapsed. The session is dead and awaits cleanup; the
    /// player must re-handshake for a fresh one.
    Expired,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One player's session.
///
/// Holds at most one live connection handle at a time. The resume token is
/// the only way to reclaim the session from a new connection; presenting a
/// stale or foreign token is rejected.
#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,

    pub state: SessionState,

    /// The 64-hex-char secret (256 bits) the client presents to resume.
    pub resume_token: String,

    /// The connection currently representing this player, if any.
    pub connection: Option<ConnectionId>,

    /// Refreshed on every authenticated action; drives grace expiry for
    /// sessions that go silent without a clean disconnect.
    pub last_activity: Instant,
}
