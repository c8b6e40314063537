//! Error types for the session layer.

use greenroom_protocol::PlayerId;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Authentication failed — the token was invalid, expired, or rejected
    /// by the [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No session exists for the given player.
    #[error("session not found for player {0}")]
    NotFound(PlayerId),

    /// The resume token doesn't match what the server issued. Could be a
    /// stale token or a hijack attempt; either way the resume is rejected.
    #[error("invalid resume token")]
    InvalidResumeToken,

    /// The session's grace period has elapsed.
    #[error("session expired for player {0}")]
    Expired(PlayerId),
}
