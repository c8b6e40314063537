//! Session continuity for Greenroom.
//!
//! This crate decouples "logical player presence in a lobby" from "which
//! physical connection currently represents them":
//!
//! 1. **Authentication seam** — the [`Authenticator`] trait turns an opaque
//!    token into a [`PlayerId`](greenroom_protocol::PlayerId).
//! 2. **Session tracking** — [`SessionManager`] issues resume credentials,
//!    swaps connections on resume, and expires sessions after a grace
//!    period of silence.
//! 3. **Reconnect replay** — [`EventLog`] keeps a bounded, sequence-numbered
//!    window of each lobby's recent events so a resuming client can replay
//!    exactly what it missed.
//!
//! Session expiry degrades a player to "disconnected" for liveness purposes
//! but never removes lobby membership — a flaky connection must not eject a
//! player from a running game.

mod auth;
mod error;
mod manager;
mod replay;
mod session;

pub use auth::{Authenticator, DevAuthenticator};
pub use error::SessionError;
pub use manager::{OpenedSession, ResumeAccept, SessionManager};
pub use replay::{EventLog, Replay, DEFAULT_EVENT_CAPACITY};
pub use session::{Session, SessionConfig, SessionState};
