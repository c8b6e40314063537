//! Core protocol types for Greenroom's wire format.
//!
//! Everything here travels between client and server as JSON: identity
//! newtypes, the message envelope, client requests, server pushes, lobby
//! snapshots, and the sequence-numbered lobby events used for reconnect
//! replay.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player.
///
/// Newtype over `u64` so a `LobbyId` can never be passed where a player is
/// expected. `#[serde(transparent)]` keeps the wire form a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LobbyId(pub u64);

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Roles and sabotages
// ---------------------------------------------------------------------------

/// The two mutually exclusive role assignments handed out at game start.
///
/// Deceivers are the hidden minority; innocents are everyone else. A member
/// learns its own role through a private `role_assigned` push, never through
/// a broadcast snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Deceiver,
    Innocent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deceiver => write!(f, "deceiver"),
            Self::Innocent => write!(f, "innocent"),
        }
    }
}

/// The sabotage catalog. Criticality and countdown durations are server
/// policy (see the lobby crate); the wire only names the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SabotageKind {
    ConfuseLanguage,
    EgyptianDarkness,
    Famine,
}

impl fmt::Display for SabotageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfuseLanguage => write!(f, "confuse_language"),
            Self::EgyptianDarkness => write!(f, "egyptian_darkness"),
            Self::Famine => write!(f, "famine"),
        }
    }
}

// ---------------------------------------------------------------------------
// Lobby status
// ---------------------------------------------------------------------------

/// The lifecycle status of a lobby, as shown to clients.
///
/// `Open ⇄ Full` oscillates with membership; `Open`/`Full → InProgress` on
/// start; `InProgress → Completed` when the game ends. `Removed` is the
/// terminal state for a lobby whose membership reached zero. The transition
/// rules themselves live in the lobby crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyStatus {
    Open,
    Full,
    InProgress,
    Completed,
    Removed,
}

impl fmt::Display for LobbyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Full => write!(f, "full"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// One member as it appears inside a [`LobbySnapshot`].
///
/// `role` is `None` in every broadcast snapshot — role assignments are only
/// ever delivered through the private `role_assigned` push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub player_id: PlayerId,
    pub is_host: bool,
    /// Whether this member currently has a live connection.
    pub connected: bool,
    pub alive: bool,
    pub score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Sabotage info as carried inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SabotageInfo {
    pub kind: SabotageKind,
    pub critical: bool,
    /// Seconds until the countdown fires. `None` for non-critical sabotages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<u64>,
}

/// The full current view of a lobby, pushed on every mutation and returned
/// on resume.
///
/// `server_seq` is the sequence number of the latest event emitted for this
/// lobby; a client that has applied the snapshot is caught up to that seq.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySnapshot {
    pub lobby_id: LobbyId,
    pub name: String,
    pub host: PlayerId,
    pub capacity: usize,
    pub public: bool,
    pub status: LobbyStatus,
    pub players: Vec<PlayerEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sabotage: Option<SabotageInfo>,
    pub server_seq: u64,
}

/// A summary row returned by `list_lobbies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyListEntry {
    pub lobby_id: LobbyId,
    pub name: String,
    pub player_count: usize,
    pub capacity: usize,
    pub status: LobbyStatus,
}

// ---------------------------------------------------------------------------
// Lobby events (replay stream)
// ---------------------------------------------------------------------------

/// What happened in a lobby, without the sequencing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    PlayerJoined {
        player_id: PlayerId,
    },
    PlayerLeft {
        player_id: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_host: Option<PlayerId>,
    },
    GameStarted {
        started_by: PlayerId,
    },
    SabotageActivated {
        kind: SabotageKind,
        critical: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_in_secs: Option<u64>,
    },
    SabotageFixed {
        kind: SabotageKind,
        fixed_by: PlayerId,
    },
    GameOver {
        winner: Role,
        reason: String,
    },
}

/// One entry in a lobby's bounded event history.
///
/// `seq` is strictly increasing per lobby starting at 1, with no gaps among
/// events actually emitted. Events are immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyEvent {
    pub seq: u64,
    /// Wall-clock milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

// ---------------------------------------------------------------------------
// Client requests
// ---------------------------------------------------------------------------

/// Everything a client can ask of the server.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON:
/// `{ "type": "join_lobby", "lobby_id": 3 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// First message on every connection. `token` is the opaque credential
    /// the authenticator turns into a `PlayerId`.
    Hello {
        version: u32,
        token: Option<String>,
    },

    /// Keep-alive. `client_time` is echoed back for RTT calculation.
    Heartbeat { client_time: u64 },

    CreateLobby {
        name: String,
        capacity: usize,
        public: bool,
    },

    ListLobbies,

    JoinLobby { lobby_id: LobbyId },

    LeaveLobby,

    StartGame,

    ActivateSabotage { kind: SabotageKind },

    FixSabotage,

    /// Reclaim a logical session after a dropped connection.
    Resume {
        player_id: PlayerId,
        resume_token: String,
        last_seen_seq: u64,
    },

    /// Clean goodbye.
    Bye { reason: String },
}

// ---------------------------------------------------------------------------
// Server messages
// ---------------------------------------------------------------------------

/// The outcome reported in a `lobby_joined` ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinAck {
    Joined,
    /// The player was already seated — the join was idempotent.
    AlreadyInLobby,
}

/// Everything the server can send to a client: request acks and pushed
/// notifications alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake ack. Carries the resume credential for this session.
    Welcome {
        player_id: PlayerId,
        resume_token: String,
        server_time: u64,
    },

    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },

    LobbyCreated { snapshot: LobbySnapshot },

    LobbyList { lobbies: Vec<LobbyListEntry> },

    LobbyJoined {
        lobby_id: LobbyId,
        outcome: JoinAck,
        server_seq: u64,
    },

    LobbyLeft { lobby_id: LobbyId },

    /// Membership or liveness changed.
    LobbyUpdate { snapshot: LobbySnapshot },

    GameStarted { snapshot: LobbySnapshot },

    /// Sent privately to each member at game start — never broadcast.
    /// `fellow_deceivers` is empty for innocents.
    RoleAssigned {
        role: Role,
        fellow_deceivers: Vec<PlayerId>,
    },

    SabotageActive {
        kind: SabotageKind,
        critical: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_in_secs: Option<u64>,
    },

    SabotageFixed {
        kind: SabotageKind,
        fixed_by: PlayerId,
    },

    GameOver { winner: Role, reason: String },

    LobbyClosed { reason: String },

    /// Sent to a connection that was superseded by a resume or a fresh
    /// handshake from the same identity.
    SessionReplaced { reason: String },

    ResumeOk {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lobby_id: Option<LobbyId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot: Option<LobbySnapshot>,
        /// Buffered events after the client's `last_seen_seq`. Empty when
        /// the gap exceeded the retained window — the snapshot alone is
        /// authoritative then.
        missed_events: Vec<LobbyEvent>,
        server_seq: u64,
    },

    ResumeFailed { reason: String },

    /// HTTP-style codes: 400 bad request, 401 unauthorized, 403 forbidden,
    /// 404 not found, 409 conflict, 503 transient.
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Envelope — the top-level wire format
// ---------------------------------------------------------------------------

/// The content of an envelope: a request going up or a message coming down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Request(ClientRequest),
    Message(ServerMessage),
}

/// The top-level wrapper. Every frame on the wire is an `Envelope`.
///
/// `seq` is a per-connection counter (each side keeps its own) used to spot
/// missing or reordered frames; it is unrelated to the per-lobby event seq.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,
    /// Milliseconds since the server started.
    pub timestamp: u64,
    pub payload: Payload,
}

// =========================================================================
// Tests
// =========================================================================
