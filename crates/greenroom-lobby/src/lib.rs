//! Lobby lifecycle for Greenroom.
//!
//! The registry in this crate is the authority on which lobbies exist,
//! who sits where, and what state each game is in. It is deliberately
//! synchronous: the server wraps it in its state mutex, so every
//! operation here runs as one atomic step and the documented outcomes
//! (join idempotence, single-lobby membership, the fix-vs-expiry claim)
//! hold without any internal locking.
//!
//! What lives where:
//! - [`LobbyRegistry`] — create/join/leave/start and the sabotage
//!   operations, all returning typed outcomes
//! - [`Lobby`] / [`Seat`] — one lobby's membership in join order
//! - [`SabotageSpec`] — the static sabotage catalog
//! - [`assign_roles`] — the shuffle that picks the deceivers

mod config;
mod error;
mod lobby;
mod registry;
mod roles;
mod sabotage;

pub use config::{LobbyConfig, LobbyStatusExt};
pub use error::LobbyError;
pub use lobby::{Lobby, Seat};
pub use registry::{
    GameStart, JoinOutcome, LeaveOutcome, LobbyRegistry, ReapedLobby,
    SabotageExpired, SabotageFixed, SabotageStarted,
};
pub use roles::{assign_roles, deceiver_count};
pub use sabotage::{ActiveSabotage, SabotageSpec};
