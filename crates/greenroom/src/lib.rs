//! # Greenroom
//!
//! Realtime lobby and session synchronization server for round-based
//! social deduction games.
//!
//! The server is authoritative for everything: who is in which lobby,
//! whether a game is running, who the deceivers are, and whether the
//! active sabotage was fixed in time. Clients speak a JSON WebSocket
//! protocol of requests and pushed notifications; a dropped client can
//! reclaim its session with a resume credential and replay the lobby
//! events it missed.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use greenroom::GreenroomServerBuilder;
//! use greenroom_session::DevAuthenticator;
//!
//! # async fn run() -> Result<(), greenroom::GreenroomError> {
//! let server = GreenroomServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(DevAuthenticator)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod fanout;
mod handler;
mod hub;
mod server;

pub use error::GreenroomError;
pub use fanout::{
    BusFrame, ConnectionRegistry, EventBus, LoopbackBus, ProcessId,
};
pub use hub::{Hub, HubConfig};
pub use server::{GreenroomServer, GreenroomServerBuilder, PROTOCOL_VERSION};
