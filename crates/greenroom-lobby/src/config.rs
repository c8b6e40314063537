//! Lobby configuration and status-machine helpers.

use std::time::Duration;

use greenroom_protocol::LobbyStatus;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Server-wide lobby policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyConfig {
    /// Smallest capacity a lobby may be created with.
    pub min_capacity: usize,

    /// Largest capacity a lobby may be created with.
    pub max_capacity: usize,

    /// How long a lobby with no connected members may exist before the
    /// reaper removes it. In-progress games are exempt.
    pub empty_reap_after: Duration,

    /// Most lobbies a single listing returns.
    pub list_limit: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            min_capacity: 4,
            max_capacity: 15,
            empty_reap_after: Duration::from_secs(900),
            list_limit: 20,
        }
    }
}

impl LobbyConfig {
    /// Returns `true` if `capacity` is inside the allowed bounds.
    pub fn capacity_allowed(&self, capacity: usize) -> bool {
        (self.min_capacity..=self.max_capacity).contains(&capacity)
    }
}

// ---------------------------------------------------------------------------
// Status-machine helpers
// ---------------------------------------------------------------------------

/// Lifecycle queries and transitions for [`LobbyStatus`].
///
/// The status values themselves live in the protocol crate because they go
/// over the wire; the rules for moving between them live here:
///
/// ```text
/// Open ⇄ Full          (membership crossing capacity, both directions)
/// Open | Full → InProgress   (host starts the game)
/// InProgress → Completed     (game over)
/// any non-terminal → Removed (last member leaves)
/// ```
pub trait LobbyStatusExt {
    /// Accepting joins (capacity permitting)?
    fn is_joinable(&self) -> bool;

    /// May the host start a game from this status?
    fn can_start(&self) -> bool;

    /// No further transitions possible?
    fn is_terminal(&self) -> bool;
}

impl LobbyStatusExt for LobbyStatus {
    fn is_joinable(&self) -> bool {
        matches!(self, LobbyStatus::Open | LobbyStatus::Full)
    }

    fn can_start(&self) -> bool {
        matches!(self, LobbyStatus::Open | LobbyStatus::Full)
    }

    fn is_terminal(&self) -> bool {
        matches!(self, LobbyStatus::Completed | LobbyStatus::Removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lobby_config_default_bounds() {
        let config = LobbyConfig::default();
        assert_eq!(config.min_capacity, 4);
        assert_eq!(config.max_capacity, 15);
        assert_eq!(config.empty_reap_after, Duration::from_secs(900));
        assert_eq!(config.list_limit, 20);
    }

    #[test]
    fn test_capacity_allowed_inclusive_bounds() {
        let config = LobbyConfig::default();
        assert!(!config.capacity_allowed(3));
        assert!(config.capacity_allowed(4));
        assert!(config.capacity_allowed(15));
        assert!(!config.capacity_allowed(16));
        assert!(!config.capacity_allowed(0));
    }

    #[test]
    fn test_status_is_joinable() {
        assert!(LobbyStatus::Open.is_joinable());
        assert!(LobbyStatus::Full.is_joinable());
        assert!(!LobbyStatus::InProgress.is_joinable());
        assert!(!LobbyStatus::Completed.is_joinable());
        assert!(!LobbyStatus::Removed.is_joinable());
    }

    #[test]
    fn test_status_can_start() {
        assert!(LobbyStatus::Open.can_start());
        assert!(LobbyStatus::Full.can_start());
        assert!(!LobbyStatus::InProgress.can_start());
        assert!(!LobbyStatus::Completed.can_start());
    }

    #[test]
    fn test_status_is_terminal() {
        assert!(!LobbyStatus::Open.is_terminal());
        assert!(!LobbyStatus::Full.is_terminal());
        assert!(!LobbyStatus::InProgress.is_terminal());
        assert!(LobbyStatus::Completed.is_terminal());
        assert!(LobbyStatus::Removed.is_terminal());
    }
}
