//! Error types for lobby operations.
//!
//! Every variant is a legitimate concurrent-state outcome, not a bug:
//! callers surface them to the client and never retry them.

use greenroom_protocol::{LobbyId, PlayerId};

/// Errors that can occur during lobby operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("lobby {0} not found")]
    NotFound(LobbyId),

    #[error("lobby {0} is not accepting joins")]
    NotJoinable(LobbyId),

    #[error("player {0} is already in lobby {1}")]
    AlreadyInOtherLobby(PlayerId, LobbyId),

    #[error("lobby {0} is full")]
    Full(LobbyId),

    #[error("player {0} is not in a lobby")]
    NotInLobby(PlayerId),

    #[error("player {0} is not the host")]
    NotHost(PlayerId),

    #[error("lobby {0} has already started")]
    AlreadyInGame(LobbyId),

    #[error("lobby {0} has no game in progress")]
    NotInProgress(LobbyId),

    #[error("capacity {0} is outside the allowed bounds")]
    InvalidCapacity(usize),

    #[error("lobby {0} already has an active sabotage")]
    SabotageAlreadyActive(LobbyId),

    #[error("no sabotage is active in lobby {0}")]
    NoActiveSabotage(LobbyId),

    #[error("player {0} is not eligible for this action")]
    RoleIneligible(PlayerId),

    #[error("the sabotage in lobby {0} already expired")]
    FixTooLate(LobbyId),
}

impl LobbyError {
    /// The HTTP-style status code carried alongside this error on the wire.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::InvalidCapacity(_) => 400,
            Self::NotHost(_) | Self::RoleIneligible(_) => 403,
            Self::NotJoinable(_)
            | Self::AlreadyInOtherLobby(..)
            | Self::Full(_)
            | Self::NotInLobby(_)
            | Self::AlreadyInGame(_)
            | Self::NotInProgress(_)
            | Self::SabotageAlreadyActive(_)
            | Self::NoActiveSabotage(_)
            | Self::FixTooLate(_) => 409,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_by_category() {
        assert_eq!(LobbyError::NotFound(LobbyId(1)).code(), 404);
        assert_eq!(LobbyError::InvalidCapacity(99).code(), 400);
        assert_eq!(LobbyError::NotHost(PlayerId(1)).code(), 403);
        assert_eq!(LobbyError::RoleIneligible(PlayerId(1)).code(), 403);
        assert_eq!(LobbyError::Full(LobbyId(1)).code(), 409);
        assert_eq!(LobbyError::FixTooLate(LobbyId(1)).code(), 409);
    }

    #[test]
    fn test_error_display_includes_ids() {
        let err = LobbyError::AlreadyInOtherLobby(PlayerId(7), LobbyId(3));
        assert_eq!(err.to_string(), "player P-7 is already in lobby L-3");
    }
}
