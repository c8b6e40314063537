//! Wire protocol for Greenroom.
//!
//! Defines the language clients and servers speak:
//!
//! - **Types** ([`Envelope`], [`ClientRequest`], [`ServerMessage`],
//!   [`LobbySnapshot`], [`LobbyEvent`], …) — the structures that travel
//!   on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how they become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer sits between transport (raw frames) and the session
//! and lobby layers — it knows nothing about connections or lobbies beyond
//! their ids.

mod codec;
mod error;
mod types;

#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use codec::Codec;
pub use error::ProtocolError;
pub use types::{
    ClientRequest, Envelope, EventKind, JoinAck, LobbyEvent, LobbyId,
    LobbyListEntry, LobbySnapshot, LobbyStatus, Payload, PlayerEntry,
    PlayerId, Role, SabotageInfo, SabotageKind, ServerMessage,
};
