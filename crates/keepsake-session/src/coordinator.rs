//! Host entry point for connection events.
//!
//! The host knows players by transient account handles; the cache knows
//! them by stable [`PlayerId`]s. The coordinator resolves one to the other
//! and forwards the event.

use std::sync::Arc;

use keepsake_protocol::{AccountHandle, PlayerId};

use crate::{
    AccountDirectory, IdentityResolver, PlayerSessionCache, ScanReport, SessionError,
    SessionHandle,
};

/// Forwards host connect/disconnect callbacks to a [`PlayerSessionCache`].
pub struct ConnectionCoordinator {
    cache: Arc<PlayerSessionCache>,
    resolver: Arc<dyn IdentityResolver>,
}

impl ConnectionCoordinator {
    pub fn new(cache: Arc<PlayerSessionCache>, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { cache, resolver }
    }

    /// Runs the cache's one-time initial scan with this coordinator's
    /// resolver.
    pub fn build_initial_cache(
        &self,
        directory: &dyn AccountDirectory,
    ) -> Result<ScanReport, SessionError> {
        self.cache
            .build_initial_cache(directory, self.resolver.as_ref())
    }

    /// Called by the host once a player's character is in the world.
    ///
    /// # Errors
    /// [`SessionError::Unresolved`] if the account has no player id. The
    /// cache is left untouched.
    pub fn on_connect(&self, handle: SessionHandle) -> Result<PlayerId, SessionError> {
        let player_id = self.resolve(handle.account)?;
        self.cache.handle_connection(player_id, handle);
        Ok(player_id)
    }

    /// Called by the host when a player's connection closes.
    ///
    /// # Errors
    /// [`SessionError::Unresolved`] if the account has no player id.
    pub fn on_disconnect(&self, account: AccountHandle) -> Result<PlayerId, SessionError> {
        let player_id = self.resolve(account)?;
        self.cache.handle_disconnection(player_id);
        Ok(player_id)
    }

    /// The cache this coordinator feeds.
    pub fn cache(&self) -> &Arc<PlayerSessionCache> {
        &self.cache
    }

    fn resolve(&self, account: AccountHandle) -> Result<PlayerId, SessionError> {
        self.resolver.resolve(account).ok_or_else(|| {
            tracing::warn!(%account, "connection event for unresolvable account ignored");
            SessionError::Unresolved(account)
        })
    }
}
