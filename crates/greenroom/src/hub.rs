//! The hub: every stateful operation of the server, each one atomic.
//!
//! All mutable state — lobbies, sessions, the event log, and the
//! connection registry — sits behind ONE mutex. Each operation locks it,
//! mutates, appends the lobby event, and enqueues the resulting pushes
//! on the members' channels before unlocking. Enqueueing is synchronous
//! (unbounded channels), so the mutation, its event, and the fan-out
//! order are a single indivisible step; the per-connection writers do
//! the actual socket I/O outside the lock.
//!
//! Timers (sabotage countdowns, the maintenance sweep) are plain spawned
//! tasks that re-enter the hub through the same lock, so the fix-vs-
//! expiry race reduces to lock ordering plus the registry's generation
//! claim.

use std::sync::Arc;
use std::time::{Duration, Instant};

use greenroom_lobby::{
    JoinOutcome, LeaveOutcome, LobbyConfig, LobbyRegistry,
};
use greenroom_protocol::{
    EventKind, JoinAck, LobbyId, PlayerId, Role, SabotageKind,
    ServerMessage,
};
use greenroom_session::{
    EventLog, Replay, SessionConfig, SessionManager,
};
use greenroom_transport::ConnectionId;
use tokio::sync::{Mutex, mpsc};

use crate::GreenroomError;
use crate::fanout::{
    BusFrame, ConnectionRegistry, EventBus, ProcessId,
};

/// Tunables for one hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub session: SessionConfig,
    pub lobby: LobbyConfig,
    /// How often the maintenance task expires sessions and reaps idle
    /// lobbies.
    pub sweep_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            lobby: LobbyConfig::default(),
            sweep_interval: Duration::from_secs(10),
        }
    }
}

struct HubState {
    sessions: SessionManager,
    lobbies: LobbyRegistry,
    events: EventLog,
    connections: ConnectionRegistry,
}

impl HubState {
    /// Enqueues `message` for every member of a lobby except `exclude`
    /// (the requester, who gets it as its ack instead).
    fn broadcast(
        &self,
        lobby_id: LobbyId,
        message: &ServerMessage,
        exclude: Option<PlayerId>,
    ) {
        let Some(lobby) = self.lobbies.get(lobby_id) else {
            return;
        };
        for seat in &lobby.seats {
            if Some(seat.player_id) == exclude {
                continue;
            }
            self.connections.send_to(seat.player_id, message.clone());
        }
    }

    /// Snapshot of a lobby stamped with its latest event seq.
    fn snapshot(&self, lobby_id: LobbyId) -> Option<greenroom_protocol::LobbySnapshot> {
        let seq = self.events.current_seq(lobby_id);
        self.lobbies.get(lobby_id).map(|l| l.snapshot(seq))
    }
}

/// The shared server core. One per process, wrapped in an [`Arc`].
pub struct Hub {
    state: Mutex<HubState>,
    bus: Arc<dyn EventBus>,
    process_id: ProcessId,
    started: Instant,
    config: HubConfig,
}

impl Hub {
    pub fn new(config: HubConfig, bus: Arc<dyn EventBus>) -> Self {
        Self {
            state: Mutex::new(HubState {
                sessions: SessionManager::new(config.session.clone()),
                lobbies: LobbyRegistry::new(config.lobby.clone()),
                events: EventLog::default(),
                connections: ConnectionRegistry::new(),
            }),
            bus,
            process_id: ProcessId::generate(),
            started: Instant::now(),
            config,
        }
    }

    /// Milliseconds since this hub started. Used as envelope timestamps.
    pub fn uptime_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn publish(&self, lobby_id: LobbyId, message: &ServerMessage) {
        self.bus.publish(BusFrame {
            origin: self.process_id,
            lobby_id,
            message: message.clone(),
        });
    }

    // ---------------------------------------------------------------------
    // Session lifecycle
    // ---------------------------------------------------------------------

    /// Opens (or replaces) a session after a fresh handshake and wires up
    /// the connection's push channel. Returns the `welcome` ack.
    pub async fn open_session(
        &self,
        player_id: PlayerId,
        connection: ConnectionId,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> ServerMessage {
        let mut state = self.state.lock().await;

        let opened = state.sessions.open(player_id, connection);
        if opened.superseded.is_some() {
            // The old link is still registered; tell it why it is about
            // to go away, then replace it (dropping its channel).
            state.connections.send_to(
                player_id,
                ServerMessage::SessionReplaced {
                    reason: "connected elsewhere".into(),
                },
            );
        }
        state.connections.register(player_id, connection, sender);

        // A member coming back online is a liveness change its lobby
        // gets to see.
        if let Some(lobby_id) = state.lobbies.set_connected(player_id, true) {
            if let Some(snapshot) = state.snapshot(lobby_id) {
                let update = ServerMessage::LobbyUpdate { snapshot };
                state.broadcast(lobby_id, &update, Some(player_id));
                self.publish(lobby_id, &update);
            }
        }

        ServerMessage::Welcome {
            player_id,
            resume_token: opened.resume_token,
            server_time: self.uptime_ms(),
        }
    }

    /// Resumes a dropped session on a new connection. Returns `resume_ok`
    /// with the snapshot and the missed events, or `resume_failed`.
    pub async fn resume(
        &self,
        player_id: PlayerId,
        resume_token: &str,
        last_seen_seq: u64,
        connection: ConnectionId,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> ServerMessage {
        let mut state = self.state.lock().await;

        let accepted =
            match state.sessions.resume(player_id, resume_token, connection) {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::info!(%player_id, error = %e, "resume rejected");
                    return ServerMessage::ResumeFailed {
                        reason: e.to_string(),
                    };
                }
            };

        if accepted.superseded.is_some() {
            state.connections.send_to(
                player_id,
                ServerMessage::SessionReplaced {
                    reason: "resumed elsewhere".into(),
                },
            );
        }
        state.connections.register(player_id, connection, sender);

        let lobby_id = state.lobbies.set_connected(player_id, true);
        let (snapshot, missed_events, server_seq) = match lobby_id {
            Some(lobby_id) => {
                let missed = match state.events.since(lobby_id, last_seen_seq) {
                    Replay::Events(events) => events,
                    // Gap too old: the snapshot alone is authoritative.
                    Replay::SnapshotOnly => Vec::new(),
                };
                let server_seq = state.events.current_seq(lobby_id);
                let snapshot = state.snapshot(lobby_id);

                let update = ServerMessage::LobbyUpdate {
                    snapshot: snapshot.clone().expect("lobby exists"),
                };
                state.broadcast(lobby_id, &update, Some(player_id));
                self.publish(lobby_id, &update);

                (snapshot, missed, server_seq)
            }
            None => (None, Vec::new(), 0),
        };

        tracing::info!(%player_id, %connection, "session resumed");
        ServerMessage::ResumeOk {
            lobby_id,
            snapshot,
            missed_events,
            server_seq,
        }
    }

    /// Tears down a closed connection: marks the session disconnected
    /// (if this connection still owned it) and tells the lobby.
    pub async fn disconnect(
        &self,
        player_id: PlayerId,
        connection: ConnectionId,
    ) {
        let mut state = self.state.lock().await;

        state.connections.unregister(player_id, connection);
        let went_offline = state
            .sessions
            .disconnect(player_id, connection)
            .unwrap_or(false);
        if !went_offline {
            return;
        }

        if let Some(lobby_id) = state.lobbies.set_connected(player_id, false) {
            if let Some(snapshot) = state.snapshot(lobby_id) {
                let update = ServerMessage::LobbyUpdate { snapshot };
                state.broadcast(lobby_id, &update, Some(player_id));
                self.publish(lobby_id, &update);
            }
        }
    }

    /// Heartbeat: refreshes the session TTL and echoes the client time.
    pub async fn heartbeat(
        &self,
        player_id: PlayerId,
        client_time: u64,
    ) -> ServerMessage {
        let mut state = self.state.lock().await;
        state.sessions.touch(player_id);
        ServerMessage::HeartbeatAck {
            client_time,
            server_time: self.uptime_ms(),
        }
    }

    // ---------------------------------------------------------------------
    // Lobby operations
    // ---------------------------------------------------------------------

    pub async fn create_lobby(
        &self,
        player_id: PlayerId,
        name: String,
        capacity: usize,
        public: bool,
    ) -> Result<ServerMessage, GreenroomError> {
        let mut state = self.state.lock().await;
        state.sessions.touch(player_id);

        let lobby_id =
            state.lobbies.create(player_id, name, capacity, public)?;
        let snapshot = state.snapshot(lobby_id).expect("just created");
        Ok(ServerMessage::LobbyCreated { snapshot })
    }

    pub async fn list_lobbies(&self, player_id: PlayerId) -> ServerMessage {
        let mut state = self.state.lock().await;
        state.sessions.touch(player_id);
        ServerMessage::LobbyList {
            lobbies: state.lobbies.list_public(),
        }
    }

    pub async fn join_lobby(
        &self,
        player_id: PlayerId,
        lobby_id: LobbyId,
    ) -> Result<ServerMessage, GreenroomError> {
        let mut state = self.state.lock().await;
        state.sessions.touch(player_id);

        let (outcome, server_seq) = match state.lobbies.join(player_id, lobby_id)? {
            JoinOutcome::Joined => {
                state
                    .events
                    .append(lobby_id, EventKind::PlayerJoined { player_id });
                let snapshot = state.snapshot(lobby_id).expect("just joined");
                let server_seq = snapshot.server_seq;
                let update = ServerMessage::LobbyUpdate { snapshot };
                state.broadcast(lobby_id, &update, Some(player_id));
                self.publish(lobby_id, &update);
                (JoinAck::Joined, server_seq)
            }
            JoinOutcome::AlreadyInLobby => (
                JoinAck::AlreadyInLobby,
                state.events.current_seq(lobby_id),
            ),
        };
        Ok(ServerMessage::LobbyJoined {
            lobby_id,
            outcome,
            server_seq,
        })
    }

    pub async fn leave_lobby(
        &self,
        player_id: PlayerId,
    ) -> Result<ServerMessage, GreenroomError> {
        let mut state = self.state.lock().await;
        state.sessions.touch(player_id);

        match state.lobbies.leave(player_id)? {
            LeaveOutcome::Left { lobby_id, new_host } => {
                state.events.append(
                    lobby_id,
                    EventKind::PlayerLeft {
                        player_id,
                        new_host,
                    },
                );
                let snapshot = state.snapshot(lobby_id).expect("still exists");
                let update = ServerMessage::LobbyUpdate { snapshot };
                state.broadcast(lobby_id, &update, Some(player_id));
                self.publish(lobby_id, &update);
                Ok(ServerMessage::LobbyLeft { lobby_id })
            }
            LeaveOutcome::LobbyDeleted { lobby_id } => {
                state.events.drop_lobby(lobby_id);
                Ok(ServerMessage::LobbyLeft { lobby_id })
            }
        }
    }

    // ---------------------------------------------------------------------
    // Game lifecycle
    // ---------------------------------------------------------------------

    pub async fn start_game(
        &self,
        player_id: PlayerId,
    ) -> Result<ServerMessage, GreenroomError> {
        let mut state = self.state.lock().await;
        state.sessions.touch(player_id);

        let start = state.lobbies.start_game(player_id)?;
        let lobby_id = start.lobby_id;
        state.events.append(
            lobby_id,
            EventKind::GameStarted {
                started_by: player_id,
            },
        );

        let snapshot = state.snapshot(lobby_id).expect("game just started");
        let started = ServerMessage::GameStarted { snapshot };
        state.broadcast(lobby_id, &started, Some(player_id));
        self.publish(lobby_id, &started);

        // Roles go out as private pushes only. A deceiver learns its
        // fellows; innocents learn nothing beyond their own role.
        let deceivers = start.deceivers();
        for (member, role) in &start.roles {
            let fellow_deceivers = match role {
                Role::Deceiver => deceivers
                    .iter()
                    .copied()
                    .filter(|d| d != member)
                    .collect(),
                Role::Innocent => Vec::new(),
            };
            state.connections.send_to(
                *member,
                ServerMessage::RoleAssigned {
                    role: *role,
                    fellow_deceivers,
                },
            );
        }

        Ok(started)
    }

    // ---------------------------------------------------------------------
    // Sabotage
    // ---------------------------------------------------------------------

    /// Activates a sabotage and, for critical kinds, arms the expiry
    /// timer. The timer task re-enters the hub when it fires and claims
    /// the expiry through the registry's generation check, so a fix that
    /// lands first turns the timer into a no-op.
    pub async fn activate_sabotage(
        self: &Arc<Self>,
        player_id: PlayerId,
        kind: SabotageKind,
    ) -> Result<ServerMessage, GreenroomError> {
        let mut state = self.state.lock().await;
        state.sessions.touch(player_id);

        let started = state.lobbies.activate_sabotage(player_id, kind)?;
        let lobby_id = started.lobby_id;
        let expires_in_secs = started.countdown.map(|d| d.as_secs());

        state.events.append(
            lobby_id,
            EventKind::SabotageActivated {
                kind,
                critical: started.critical,
                expires_in_secs,
            },
        );
        let active = ServerMessage::SabotageActive {
            kind,
            critical: started.critical,
            expires_in_secs,
        };
        state.broadcast(lobby_id, &active, Some(player_id));
        self.publish(lobby_id, &active);
        drop(state);

        if let Some(countdown) = started.countdown {
            let hub = Arc::clone(self);
            let generation = started.generation;
            tokio::spawn(async move {
                tokio::time::sleep(countdown).await;
                hub.expire_sabotage(lobby_id, generation).await;
            });
        }

        Ok(active)
    }

    pub async fn fix_sabotage(
        &self,
        player_id: PlayerId,
    ) -> Result<ServerMessage, GreenroomError> {
        let mut state = self.state.lock().await;
        state.sessions.touch(player_id);

        let fixed = state.lobbies.fix_sabotage(player_id)?;
        let lobby_id = fixed.lobby_id;
        state.events.append(
            lobby_id,
            EventKind::SabotageFixed {
                kind: fixed.kind,
                fixed_by: player_id,
            },
        );
        let message = ServerMessage::SabotageFixed {
            kind: fixed.kind,
            fixed_by: player_id,
        };
        state.broadcast(lobby_id, &message, Some(player_id));
        self.publish(lobby_id, &message);
        Ok(message)
    }

    /// Fired by a sabotage countdown. Completes the game iff the
    /// sabotage of exactly this generation is still active.
    async fn expire_sabotage(&self, lobby_id: LobbyId, generation: u64) {
        let mut state = self.state.lock().await;

        let Some(expired) =
            state.lobbies.claim_sabotage_expiry(lobby_id, generation)
        else {
            // Fixed in time, or a later sabotage took over.
            return;
        };

        state.events.append(
            lobby_id,
            EventKind::GameOver {
                winner: expired.winner,
                reason: expired.reason.clone(),
            },
        );
        let message = ServerMessage::GameOver {
            winner: expired.winner,
            reason: expired.reason,
        };
        state.broadcast(lobby_id, &message, None);
        self.publish(lobby_id, &message);
    }

    // ---------------------------------------------------------------------
    // Background tasks
    // ---------------------------------------------------------------------

    /// One maintenance pass: expire stale sessions (flipping lobby
    /// liveness), then reap idle lobbies.
    pub async fn sweep(&self) {
        let mut state = self.state.lock().await;

        for player_id in state.sessions.expire_stale() {
            if let Some(lobby_id) =
                state.lobbies.set_connected(player_id, false)
            {
                if let Some(snapshot) = state.snapshot(lobby_id) {
                    let update = ServerMessage::LobbyUpdate { snapshot };
                    state.broadcast(lobby_id, &update, Some(player_id));
                    self.publish(lobby_id, &update);
                }
            }
        }
        state.sessions.cleanup_expired();

        for reaped in state.lobbies.reap_idle() {
            state.events.drop_lobby(reaped.lobby_id);
            // The seats were all disconnected locally, but a member may
            // resume on another process before its grace runs out.
            let closed = ServerMessage::LobbyClosed {
                reason: "lobby idle too long".into(),
            };
            for player_id in &reaped.members {
                state.connections.send_to(*player_id, closed.clone());
            }
            self.publish(reaped.lobby_id, &closed);
        }
    }

    /// Spawns the periodic maintenance task.
    pub fn spawn_maintenance(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let hub = Arc::clone(self);
        let period = hub.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(
                tokio::time::MissedTickBehavior::Skip,
            );
            loop {
                ticker.tick().await;
                hub.sweep().await;
            }
        })
    }

    /// Spawns the bus pump: delivers frames published by OTHER processes
    /// to this process's connections. Frames we published ourselves come
    /// back with our own origin and are skipped.
    pub fn spawn_bus_pump(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let hub = Arc::clone(self);
        let mut rx = hub.bus.subscribe();
        tokio::spawn(async move {
            loop {
                let frame = match rx.recv().await {
                    Ok(frame) => frame,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(missed = n, "bus pump lagged");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        break;
                    }
                };
                if frame.origin == hub.process_id {
                    continue;
                }
                let state = hub.state.lock().await;
                state.broadcast(frame.lobby_id, &frame.message, None);
            }
        })
    }
}

// =========================================================================
// Tests
// =========================================================================
