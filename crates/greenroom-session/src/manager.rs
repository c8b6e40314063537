//! The session manager: maps authenticated identities to live connections.
//!
//! Responsibilities:
//! - Issuing a fresh resume credential when a player handshakes
//! - Validating resume credentials and atomically swapping the connection
//!   (the superseded connection is reported back so the caller can notify
//!   and close it)
//! - Tracking connected/disconnected liveness per player
//! - Expiring sessions whose grace period elapsed without a resume
//!
//! `SessionManager` is not thread-safe by itself — callers hold it behind
//! the server's mutex, so every method here runs as one indivisible step.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use greenroom_protocol::PlayerId;
use greenroom_transport::ConnectionId;
use rand::Rng;

use crate::{Session, SessionConfig, SessionError, SessionState};

/// Result of opening a session at handshake time.
#[derive(Debug)]
pub struct OpenedSession {
    /// The fresh resume credential to hand to the client.
    pub resume_token: String,
    /// A previous live connection for the same identity, if one existed.
    /// The caller must notify it (`session_replaced`) and close it.
    pub superseded: Option<ConnectionId>,
}

/// Result of a successful resume.
#[derive(Debug)]
pub struct ResumeAccept {
    /// The connection that was holding the session before the swap, if it
    /// differs from the resuming one.
    pub superseded: Option<ConnectionId>,
}

/// Manages all player sessions for one process.
pub struct SessionManager {
    sessions: HashMap<PlayerId, Session>,
    config: SessionConfig,
}

impl SessionManager {
    /// Creates a new, empty session manager with the given config.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    /// Opens (or replaces) the session for a player that just completed
    /// the handshake on `connection`.
    ///
    /// Always issues a fresh credential — a re-handshake invalidates any
    /// token issued before it. If the identity already had a live
    /// connection, it is superseded, not rejected: mobile clients
    /// re-handshake instead of resuming more often than not.
    pub fn open(
        &mut self,
        player_id: PlayerId,
        connection: ConnectionId,
    ) -> OpenedSession {
        let superseded = self.sessions.get(&player_id).and_then(|s| {
            match s.state {
                SessionState::Connected => {
                    s.connection.filter(|c| *c != connection)
                }
                _ => None,
            }
        });

        let resume_token = generate_token();
        let session = Session {
            player_id,
            state: SessionState::Connected,
            resume_token: resume_token.clone(),
            connection: Some(connection),
            last_activity: Instant::now(),
        };
        self.sessions.insert(player_id, session);

        tracing::info!(%player_id, %connection, "session opened");

        OpenedSession {
            resume_token,
            superseded,
        }
    }

    /// Resumes a session from a new connection.
    ///
    /// Validates the credential, swaps the connection handle, and refreshes
    /// the grace clock. The caller replays missed events separately.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] — no session for this player
    /// - [`SessionError::InvalidResumeToken`] — credential mismatch
    /// - [`SessionError::Expired`] — grace period already elapsed
    pub fn resume(
        &mut self,
        player_id: PlayerId,
        resume_token: &str,
        connection: ConnectionId,
    ) -> Result<ResumeAccept, SessionError> {
        let grace = Duration::from_secs(self.config.grace_secs);
        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;

        // Token check comes before any state change: a wrong token must
        // not disturb the legitimate holder's session.
        if session.resume_token != resume_token {
            return Err(SessionError::InvalidResumeToken);
        }

        match &session.state {
            SessionState::Expired => {
                return Err(SessionError::Expired(player_id));
            }
            SessionState::Disconnected { since } => {
                if since.elapsed() > grace {
                    session.state = SessionState::Expired;
                    return Err(SessionError::Expired(player_id));
                }
            }
            SessionState::Connected => {}
        }

        let superseded =
            session.connection.filter(|c| *c != connection);
        session.connection = Some(connection);
        session.state = SessionState::Connected;
        session.last_activity = Instant::now();

        tracing::info!(%player_id, %connection, "session resumed");

        Ok(ResumeAccept { superseded })
    }

    /// Marks a player as disconnected, starting the grace period.
    ///
    /// Only takes effect if `connection` still holds the session — the
    /// close of a connection that was already superseded by a resume must
    /// not knock the new connection offline. Returns whether the session
    /// actually went offline.
    pub fn disconnect(
        &mut self,
        player_id: PlayerId,
        connection: ConnectionId,
    ) -> Result<bool, SessionError> {
        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;

        if session.connection != Some(connection) {
            return Ok(false);
        }

        session.connection = None;
        session.state = SessionState::Disconnected {
            since: Instant::now(),
        };

        tracing::info!(%player_id, "player disconnected, grace period started");
        Ok(true)
    }

    /// Refreshes the grace clock. Called on every authenticated action.
    pub fn touch(&mut self, player_id: PlayerId) {
        if let Some(session) = self.sessions.get_mut(&player_id) {
            session.last_activity = Instant::now();
        }
    }

    /// Expires sessions whose grace period elapsed: disconnected sessions
    /// past the window, and nominally connected sessions that have been
    /// silent for the whole window (half-open sockets).
    ///
    /// Returns the players that expired so the caller can flip their
    /// lobby liveness flags. Expiry never touches lobby membership.
    pub fn expire_stale(&mut self) -> Vec<PlayerId> {
        let grace = Duration::from_secs(self.config.grace_secs);
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            let stale = match &session.state {
                SessionState::Disconnected { since } => {
                    since.elapsed() > grace
                }
                SessionState::Connected => {
                    session.last_activity.elapsed() > grace
                }
                SessionState::Expired => false,
            };
            if stale {
                session.state = SessionState::Expired;
                session.connection = None;
                expired.push(session.player_id);
                tracing::info!(
                    player_id = %session.player_id,
                    "session expired (grace period elapsed)"
                );
            }
        }

        expired
    }

    /// Removes expired sessions, freeing memory and invalidating their
    /// tokens for good. Run after `expire_stale` once callers have reacted.
    pub fn cleanup_expired(&mut self) {
        self.sessions
            .retain(|_, s| !matches!(s.state, SessionState::Expired));
    }

    /// Looks up a session by player id.
    pub fn get(&self, player_id: &PlayerId) -> Option<&Session> {
        self.sessions.get(player_id)
    }

    /// The connection currently representing a player, if any.
    pub fn connection_of(&self, player_id: &PlayerId) -> Option<ConnectionId> {
        self.sessions
            .get(player_id)
            .and_then(|s| s.connection)
    }

    /// Number of sessions in any state.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Generates a random 64-character hex string (256 bits of entropy).
///
/// The token is the only proof of session ownership, so it gets the full
/// 32 bytes the original deployment used.
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
