//! Lobby registry: creates, tracks, and mutates lobbies.
//!
//! This is the entry point for lobby operations from higher layers. All
//! methods are synchronous and take `&mut self`; the server holds the
//! registry behind its state mutex, so each method is one indivisible
//! step. That is what makes the documented outcomes atomic: a join either
//! seats the player and updates the membership index and the status edge
//! together, or changes nothing.

use std::collections::HashMap;
use std::time::Duration;

use greenroom_protocol::{
    LobbyId, LobbyListEntry, LobbyStatus, PlayerId, Role, SabotageKind,
};

use crate::{
    ActiveSabotage, Lobby, LobbyConfig, LobbyError, LobbyStatusExt,
    SabotageSpec, assign_roles,
};

// ---------------------------------------------------------------------------
// Operation outcomes
// ---------------------------------------------------------------------------

/// Outcome of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The player took a seat.
    Joined,
    /// The player was already seated here; nothing changed.
    AlreadyInLobby,
}

/// Outcome of a successful leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left {
        lobby_id: LobbyId,
        /// Set when the departing player was host and someone else
        /// inherited the seat.
        new_host: Option<PlayerId>,
    },
    /// The last member left and the lobby was removed.
    LobbyDeleted { lobby_id: LobbyId },
}

/// Everything a successful `start_game` produced.
#[derive(Debug)]
pub struct GameStart {
    pub lobby_id: LobbyId,
    pub started_by: PlayerId,
    /// The private role of every member.
    pub roles: HashMap<PlayerId, Role>,
}

impl GameStart {
    /// The deceivers, so each can be told who its fellows are.
    pub fn deceivers(&self) -> Vec<PlayerId> {
        let mut d: Vec<PlayerId> = self
            .roles
            .iter()
            .filter(|(_, r)| **r == Role::Deceiver)
            .map(|(p, _)| *p)
            .collect();
        d.sort_by_key(|p| p.0);
        d
    }
}

/// A sabotage that just went active.
#[derive(Debug, Clone, Copy)]
pub struct SabotageStarted {
    pub lobby_id: LobbyId,
    pub kind: SabotageKind,
    pub critical: bool,
    /// How long the caller's expiry timer should sleep. `None` for
    /// non-critical kinds (no timer at all).
    pub countdown: Option<Duration>,
    /// Pass back to [`LobbyRegistry::claim_sabotage_expiry`] when the
    /// timer fires.
    pub generation: u64,
}

/// A sabotage that was fixed in time.
#[derive(Debug, Clone, Copy)]
pub struct SabotageFixed {
    pub lobby_id: LobbyId,
    pub kind: SabotageKind,
    pub fixed_by: PlayerId,
}

/// A critical sabotage that expired unfixed. The game is over.
#[derive(Debug, Clone)]
pub struct SabotageExpired {
    pub lobby_id: LobbyId,
    pub kind: SabotageKind,
    pub winner: Role,
    pub reason: String,
}

/// An idle lobby the reaper removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReapedLobby {
    pub lobby_id: LobbyId,
    /// Who still held a seat at removal time, so closure notices can
    /// reach them wherever their connection lives.
    pub members: Vec<PlayerId>,
}

// ---------------------------------------------------------------------------
// LobbyRegistry
// ---------------------------------------------------------------------------

/// All lobbies of one server, plus the player → lobby index.
///
/// A player is in at most ONE lobby at a time (key invariant); the
/// `membership` index and each lobby's seat list are always mutated
/// together.
pub struct LobbyRegistry {
    lobbies: HashMap<LobbyId, Lobby>,
    membership: HashMap<PlayerId, LobbyId>,
    config: LobbyConfig,
    next_lobby_id: u64,
}

impl LobbyRegistry {
    pub fn new(config: LobbyConfig) -> Self {
        Self {
            lobbies: HashMap::new(),
            membership: HashMap::new(),
            config,
            next_lobby_id: 1,
        }
    }

    // -- creation and lookup ------------------------------------------------

    /// Creates a lobby with `host` seated in it.
    ///
    /// Fails if the host is already seated somewhere or the capacity is
    /// out of bounds.
    pub fn create(
        &mut self,
        host: PlayerId,
        name: String,
        capacity: usize,
        public: bool,
    ) -> Result<LobbyId, LobbyError> {
        if let Some(current) = self.membership.get(&host) {
            return Err(LobbyError::AlreadyInOtherLobby(host, *current));
        }
        if !self.config.capacity_allowed(capacity) {
            return Err(LobbyError::InvalidCapacity(capacity));
        }

        let lobby_id = LobbyId(self.next_lobby_id);
        self.next_lobby_id += 1;

        self.lobbies
            .insert(lobby_id, Lobby::new(lobby_id, name, host, capacity, public));
        self.membership.insert(host, lobby_id);

        tracing::info!(%lobby_id, %host, capacity, "lobby created");
        Ok(lobby_id)
    }

    pub fn get(&self, lobby_id: LobbyId) -> Option<&Lobby> {
        self.lobbies.get(&lobby_id)
    }

    /// The lobby a player is currently seated in, if any.
    pub fn lobby_of(&self, player_id: PlayerId) -> Option<LobbyId> {
        self.membership.get(&player_id).copied()
    }

    /// Summary rows for public lobbies still accepting joins, newest
    /// first, capped at the configured listing limit.
    pub fn list_public(&self) -> Vec<LobbyListEntry> {
        let mut listed: Vec<&Lobby> = self
            .lobbies
            .values()
            .filter(|l| l.public && l.status.is_joinable())
            .collect();
        listed.sort_by_key(|l| std::cmp::Reverse(l.id.0));
        listed
            .into_iter()
            .take(self.config.list_limit)
            .map(Lobby::list_entry)
            .collect()
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies.len()
    }

    // -- membership ---------------------------------------------------------

    /// Seats a player in a lobby.
    ///
    /// Idempotent: a repeated join by an already-seated player succeeds
    /// with [`JoinOutcome::AlreadyInLobby`] and mutates nothing. A join
    /// that finds the lobby at capacity fails `Full` and, as a side
    /// effect, makes sure the status shows `Full`.
    pub fn join(
        &mut self,
        player_id: PlayerId,
        lobby_id: LobbyId,
    ) -> Result<JoinOutcome, LobbyError> {
        if let Some(current) = self.membership.get(&player_id) {
            if *current == lobby_id {
                return Ok(JoinOutcome::AlreadyInLobby);
            }
            return Err(LobbyError::AlreadyInOtherLobby(player_id, *current));
        }

        let lobby = self
            .lobbies
            .get_mut(&lobby_id)
            .ok_or(LobbyError::NotFound(lobby_id))?;

        if !lobby.status.is_joinable() {
            return Err(LobbyError::NotJoinable(lobby_id));
        }
        if lobby.is_full() {
            lobby.status = LobbyStatus::Full;
            return Err(LobbyError::Full(lobby_id));
        }

        lobby.seat_player(player_id);
        self.membership.insert(player_id, lobby_id);

        tracing::info!(%lobby_id, %player_id, count = lobby.player_count(), "player joined");
        Ok(JoinOutcome::Joined)
    }

    /// Removes a player from their current lobby.
    ///
    /// The last member leaving removes the lobby entirely; a departing
    /// host hands the seat to the earliest-joined remaining member.
    pub fn leave(
        &mut self,
        player_id: PlayerId,
    ) -> Result<LeaveOutcome, LobbyError> {
        let lobby_id = self
            .membership
            .remove(&player_id)
            .ok_or(LobbyError::NotInLobby(player_id))?;

        let lobby = self
            .lobbies
            .get_mut(&lobby_id)
            .ok_or(LobbyError::NotFound(lobby_id))?;

        if lobby.player_count() == 1 {
            lobby.status = LobbyStatus::Removed;
            self.lobbies.remove(&lobby_id);
            tracing::info!(%lobby_id, %player_id, "last member left, lobby removed");
            return Ok(LeaveOutcome::LobbyDeleted { lobby_id });
        }

        let new_host = lobby.unseat_player(player_id);
        if let Some(host) = new_host {
            tracing::info!(%lobby_id, %host, "host left, promoted earliest member");
        }
        tracing::info!(%lobby_id, %player_id, "player left");
        Ok(LeaveOutcome::Left { lobby_id, new_host })
    }

    /// Flips a member's liveness flag. Returns the lobby it happened in.
    ///
    /// Liveness never affects membership; an expired session leaves its
    /// seat in place, just marked disconnected.
    pub fn set_connected(
        &mut self,
        player_id: PlayerId,
        connected: bool,
    ) -> Option<LobbyId> {
        let lobby_id = *self.membership.get(&player_id)?;
        let seat = self
            .lobbies
            .get_mut(&lobby_id)?
            .seat_mut(player_id)?;
        seat.connected = connected;
        Some(lobby_id)
    }

    // -- game lifecycle -----------------------------------------------------

    /// Starts the game in the requester's lobby.
    ///
    /// Host-only, and only from `Open`/`Full`. Shuffles roles, resets
    /// per-member score and alive flags, and moves to `InProgress`.
    pub fn start_game(
        &mut self,
        requester: PlayerId,
    ) -> Result<GameStart, LobbyError> {
        let lobby_id = self
            .membership
            .get(&requester)
            .copied()
            .ok_or(LobbyError::NotInLobby(requester))?;
        let lobby = self
            .lobbies
            .get_mut(&lobby_id)
            .ok_or(LobbyError::NotFound(lobby_id))?;

        if lobby.host != requester {
            return Err(LobbyError::NotHost(requester));
        }
        if !lobby.status.can_start() {
            return Err(LobbyError::AlreadyInGame(lobby_id));
        }

        let members: Vec<PlayerId> =
            lobby.seats.iter().map(|s| s.player_id).collect();
        let roles = assign_roles(&members);

        for seat in &mut lobby.seats {
            seat.alive = true;
            seat.score = 0;
            seat.role = roles.get(&seat.player_id).copied();
        }
        lobby.status = LobbyStatus::InProgress;
        lobby.sabotage = None;

        tracing::info!(%lobby_id, %requester, players = members.len(), "game started");
        Ok(GameStart {
            lobby_id,
            started_by: requester,
            roles,
        })
    }

    // -- sabotage -----------------------------------------------------------

    /// Activates a sabotage in the requester's lobby.
    ///
    /// Requires a running game, a living deceiver as requester, and no
    /// sabotage already active. The caller schedules the expiry timer
    /// from the returned countdown and generation.
    pub fn activate_sabotage(
        &mut self,
        requester: PlayerId,
        kind: SabotageKind,
    ) -> Result<SabotageStarted, LobbyError> {
        let lobby_id = self
            .membership
            .get(&requester)
            .copied()
            .ok_or(LobbyError::NotInLobby(requester))?;
        let lobby = self
            .lobbies
            .get_mut(&lobby_id)
            .ok_or(LobbyError::NotFound(lobby_id))?;

        if lobby.status != LobbyStatus::InProgress {
            return Err(LobbyError::NotInProgress(lobby_id));
        }
        let seat = lobby
            .seat(requester)
            .ok_or(LobbyError::NotInLobby(requester))?;
        if seat.role != Some(Role::Deceiver) || !seat.alive {
            return Err(LobbyError::RoleIneligible(requester));
        }
        if lobby.sabotage.is_some() {
            return Err(LobbyError::SabotageAlreadyActive(lobby_id));
        }

        let spec = SabotageSpec::of(kind);
        lobby.sabotage_generation += 1;
        let generation = lobby.sabotage_generation;
        lobby.sabotage = Some(ActiveSabotage::new(spec, generation));

        tracing::info!(%lobby_id, %kind, critical = spec.critical, "sabotage activated");
        Ok(SabotageStarted {
            lobby_id,
            kind,
            critical: spec.critical,
            countdown: spec.countdown,
            generation,
        })
    }

    /// Fixes the active sabotage in the requester's lobby.
    ///
    /// Any living member can fix. If the sabotage already expired and
    /// ended the game, the fix is too late; the expiry outcome stands.
    pub fn fix_sabotage(
        &mut self,
        requester: PlayerId,
    ) -> Result<SabotageFixed, LobbyError> {
        let lobby_id = self
            .membership
            .get(&requester)
            .copied()
            .ok_or(LobbyError::NotInLobby(requester))?;
        let lobby = self
            .lobbies
            .get_mut(&lobby_id)
            .ok_or(LobbyError::NotFound(lobby_id))?;

        let seat = lobby
            .seat(requester)
            .ok_or(LobbyError::NotInLobby(requester))?;
        if !seat.alive {
            return Err(LobbyError::RoleIneligible(requester));
        }

        match lobby.sabotage.take() {
            Some(active) => {
                tracing::info!(%lobby_id, kind = %active.kind, %requester, "sabotage fixed");
                Ok(SabotageFixed {
                    lobby_id,
                    kind: active.kind,
                    fixed_by: requester,
                })
            }
            None if lobby.status == LobbyStatus::Completed => {
                Err(LobbyError::FixTooLate(lobby_id))
            }
            None => Err(LobbyError::NoActiveSabotage(lobby_id)),
        }
    }

    /// Claims the expiry transition for a fired sabotage countdown.
    ///
    /// This is the single atomic step that settles the fix-vs-expiry
    /// race: it succeeds only if the sabotage of exactly `generation` is
    /// still active. A fix that landed first removed it and the claim
    /// returns `None`; the timer then does nothing. On success the game
    /// is over and the deceivers won.
    pub fn claim_sabotage_expiry(
        &mut self,
        lobby_id: LobbyId,
        generation: u64,
    ) -> Option<SabotageExpired> {
        let lobby = self.lobbies.get_mut(&lobby_id)?;

        match &lobby.sabotage {
            Some(active) if active.generation == generation => {}
            _ => return None,
        }
        let active = lobby.sabotage.take()?;

        lobby.status = LobbyStatus::Completed;
        tracing::info!(%lobby_id, kind = %active.kind, "sabotage expired unfixed, deceivers win");
        Some(SabotageExpired {
            lobby_id,
            kind: active.kind,
            winner: Role::Deceiver,
            reason: active.kind.to_string(),
        })
    }

    // -- reaping ------------------------------------------------------------

    /// Removes idle lobbies: `Open`/`Full`, every member disconnected,
    /// and older than the configured grace window. Running games are
    /// never reaped. Returns the removed lobbies with their final seat
    /// lists.
    pub fn reap_idle(&mut self) -> Vec<ReapedLobby> {
        let grace = self.config.empty_reap_after;
        let doomed: Vec<ReapedLobby> = self
            .lobbies
            .values()
            .filter(|l| {
                l.status.is_joinable()
                    && l.all_disconnected()
                    && l.created_at.elapsed() > grace
            })
            .map(|l| ReapedLobby {
                lobby_id: l.id,
                members: l.seats.iter().map(|s| s.player_id).collect(),
            })
            .collect();

        for reaped in &doomed {
            self.lobbies.remove(&reaped.lobby_id);
            self.membership.retain(|_, lid| *lid != reaped.lobby_id);
            tracing::info!(lobby_id = %reaped.lobby_id, "idle lobby reaped");
        }
        doomed
    }
}

impl Default for LobbyRegistry {
    fn default() -> Self {
        Self::new(LobbyConfig::default())
    }
}
