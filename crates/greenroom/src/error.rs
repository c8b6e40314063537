//! Unified error type for the Greenroom server.

use greenroom_lobby::LobbyError;
use greenroom_protocol::ProtocolError;
use greenroom_session::SessionError;
use greenroom_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GreenroomError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, resume, expired).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A lobby-level error (full, not found, not host, ...).
    #[error(transparent)]
    Lobby(#[from] LobbyError),
}

impl GreenroomError {
    /// The HTTP-style code reported to clients for this error.
    pub fn code(&self) -> u16 {
        match self {
            Self::Transport(_) => 503,
            Self::Protocol(_) => 400,
            Self::Session(e) => match e {
                SessionError::AuthFailed(_) => 401,
                SessionError::InvalidResumeToken => 403,
                SessionError::NotFound(_) => 404,
                SessionError::Expired(_) => 404,
            },
            Self::Lobby(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenroom_protocol::{LobbyId, PlayerId};

    #[test]
    fn test_from_lobby_error() {
        let err: GreenroomError = LobbyError::NotFound(LobbyId(1)).into();
        assert!(matches!(err, GreenroomError::Lobby(_)));
        assert_eq!(err.code(), 404);
    }

    #[test]
    fn test_from_session_error() {
        let err: GreenroomError = SessionError::InvalidResumeToken.into();
        assert!(matches!(err, GreenroomError::Session(_)));
        assert_eq!(err.code(), 403);
    }

    #[test]
    fn test_from_transport_error() {
        let err: GreenroomError =
            TransportError::ConnectionClosed("gone".into()).into();
        assert_eq!(err.code(), 503);
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_auth_failure_maps_to_401() {
        let err: GreenroomError =
            SessionError::AuthFailed("bad token".into()).into();
        assert_eq!(err.code(), 401);
    }

    #[test]
    fn test_not_host_maps_to_403() {
        let err: GreenroomError = LobbyError::NotHost(PlayerId(2)).into();
        assert_eq!(err.code(), 403);
    }
}
