//! Authentication seam for validating player identity.
//!
//! Greenroom does not issue credentials itself. The [`Authenticator`]
//! trait maps an opaque token presented at handshake to a `PlayerId`.
//! Production wires in a real validator; development and tests use
//! [`DevAuthenticator`], which accepts any numeric token.

use greenroom_protocol::PlayerId;

use crate::SessionError;

/// Validates a client's auth token and returns their identity.
///
/// `Send + Sync + 'static` so the authenticator can be shared across
/// connection tasks for the lifetime of the server.
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns the player's identity.
    ///
    /// # Errors
    /// [`SessionError::AuthFailed`] if the token is invalid or expired.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<PlayerId, SessionError>> + Send;
}

/// Accepts any numeric token and uses it as the player id. Development and
/// test use only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevAuthenticator;

impl Authenticator for DevAuthenticator {
    async fn authenticate(
        &self,
        token: &str,
    ) -> Result<PlayerId, SessionError> {
        let id: u64 = token.parse().map_err(|_| {
            SessionError::AuthFailed("token must be a number".into())
        })?;
        Ok(PlayerId(id))
    }
}
