//! A single lobby: membership, host, status, and active sabotage.

use std::time::Instant;

use greenroom_protocol::{
    LobbyId, LobbyListEntry, LobbySnapshot, LobbyStatus, PlayerEntry,
    PlayerId, Role,
};

use crate::ActiveSabotage;

/// One member of a lobby.
///
/// Seats are kept in join order, which is what makes host promotion
/// deterministic: when the host leaves, the earliest remaining seat
/// inherits the role.
#[derive(Debug, Clone)]
pub struct Seat {
    pub player_id: PlayerId,
    pub connected: bool,
    pub alive: bool,
    pub score: u32,
    /// Assigned at game start, cleared when a new game begins. Never
    /// included in broadcast snapshots.
    pub role: Option<Role>,
}

impl Seat {
    fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            connected: true,
            alive: true,
            score: 0,
            role: None,
        }
    }
}

/// A lobby and everything scoped to it.
#[derive(Debug)]
pub struct Lobby {
    pub id: LobbyId,
    pub name: String,
    pub host: PlayerId,
    pub capacity: usize,
    pub public: bool,
    pub status: LobbyStatus,
    /// Members in join order.
    pub seats: Vec<Seat>,
    pub sabotage: Option<ActiveSabotage>,
    /// Bumped on every sabotage activation. Expiry timers check it to
    /// tell whether their sabotage is still the live one.
    pub sabotage_generation: u64,
    pub created_at: Instant,
}

impl Lobby {
    /// Creates a lobby with the host already seated.
    pub fn new(
        id: LobbyId,
        name: String,
        host: PlayerId,
        capacity: usize,
        public: bool,
    ) -> Self {
        Self {
            id,
            name,
            host,
            capacity,
            public,
            status: LobbyStatus::Open,
            seats: vec![Seat::new(host)],
            sabotage: None,
            sabotage_generation: 0,
            created_at: Instant::now(),
        }
    }

    pub fn player_count(&self) -> usize {
        self.seats.len()
    }

    pub fn is_full(&self) -> bool {
        self.seats.len() >= self.capacity
    }

    pub fn is_member(&self, player_id: PlayerId) -> bool {
        self.seats.iter().any(|s| s.player_id == player_id)
    }

    pub fn seat(&self, player_id: PlayerId) -> Option<&Seat> {
        self.seats.iter().find(|s| s.player_id == player_id)
    }

    pub fn seat_mut(&mut self, player_id: PlayerId) -> Option<&mut Seat> {
        self.seats.iter_mut().find(|s| s.player_id == player_id)
    }

    /// Seats a new member and updates the `Open → Full` edge.
    ///
    /// The caller has already validated status and capacity.
    pub fn seat_player(&mut self, player_id: PlayerId) {
        self.seats.push(Seat::new(player_id));
        if self.is_full() {
            self.status = LobbyStatus::Full;
        }
    }

    /// Removes a member's seat, reverting `Full → Open` and promoting the
    /// earliest remaining member if the host left.
    ///
    /// Returns the new host if a promotion happened. The caller handles
    /// the empty-lobby case before calling this.
    pub fn unseat_player(&mut self, player_id: PlayerId) -> Option<PlayerId> {
        self.seats.retain(|s| s.player_id != player_id);

        if self.status == LobbyStatus::Full && !self.is_full() {
            self.status = LobbyStatus::Open;
        }

        if self.host == player_id {
            if let Some(next) = self.seats.first() {
                self.host = next.player_id;
                return Some(next.player_id);
            }
        }
        None
    }

    /// Whether every seat lacks a live connection.
    pub fn all_disconnected(&self) -> bool {
        self.seats.iter().all(|s| !s.connected)
    }

    /// The full client-facing view, stamped with the latest event seq.
    ///
    /// Roles deliberately never appear here; each member learns its own
    /// role through a private push at game start.
    pub fn snapshot(&self, server_seq: u64) -> LobbySnapshot {
        LobbySnapshot {
            lobby_id: self.id,
            name: self.name.clone(),
            host: self.host,
            capacity: self.capacity,
            public: self.public,
            status: self.status,
            players: self
                .seats
                .iter()
                .map(|s| PlayerEntry {
                    player_id: s.player_id,
                    is_host: s.player_id == self.host,
                    connected: s.connected,
                    alive: s.alive,
                    score: s.score,
                    role: None,
                })
                .collect(),
            sabotage: self.sabotage.as_ref().map(ActiveSabotage::info),
            server_seq,
        }
    }

    /// The summary row shown in lobby listings.
    pub fn list_entry(&self) -> LobbyListEntry {
        LobbyListEntry {
            lobby_id: self.id,
            name: self.name.clone(),
            player_count: self.player_count(),
            capacity: self.capacity,
            status: self.status,
        }
    }
}
