//! Hooks into the host: where accounts come from, how they map to stable
//! ids, and who needs telling when a player leaves.
//!
//! Keepsake doesn't talk to the game runtime itself. The host implements
//! these three traits (usually thin wrappers over its entity queries) and
//! hands them to the cache and the coordinator.
//!
//! Plain closures work for the two single-method hooks, which keeps test
//! setup short:
//!
//! ```rust
//! use keepsake_protocol::{AccountHandle, PlayerId};
//! use keepsake_session::{IdentityResolver, SessionCleanup};
//!
//! let resolver = |account: AccountHandle| Some(PlayerId(account.0 + 1000));
//! assert_eq!(resolver.resolve(AccountHandle(7)), Some(PlayerId(1007)));
//!
//! let cleanup = |player: PlayerId| println!("dropping pending state for {player}");
//! cleanup.clear_session_state(PlayerId(1007));
//! ```

use keepsake_protocol::{AccountHandle, PlayerId};

use crate::{AccountEntry, SessionError};

/// The host's bulk "every known account" query.
///
/// Called once, by the initial cache build.
pub trait AccountDirectory: Send + Sync {
    /// Returns every account the host knows about, connected or not.
    ///
    /// # Errors
    /// Return [`SessionError::Directory`] only if the query as a whole
    /// failed. A single broken account should come back as an entry with
    /// missing fields; the scan skips it.
    fn known_accounts(&self) -> Result<Vec<AccountEntry>, SessionError>;
}

/// A fixed list of accounts. Handy for tests and offline tooling.
impl AccountDirectory for Vec<AccountEntry> {
    fn known_accounts(&self) -> Result<Vec<AccountEntry>, SessionError> {
        Ok(self.clone())
    }
}

/// Maps a transient account handle to the player's stable id.
pub trait IdentityResolver: Send + Sync {
    /// Returns `None` if the account is gone or has no platform id.
    fn resolve(&self, account: AccountHandle) -> Option<PlayerId>;
}

impl<F> IdentityResolver for F
where
    F: Fn(AccountHandle) -> Option<PlayerId> + Send + Sync,
{
    fn resolve(&self, account: AccountHandle) -> Option<PlayerId> {
        self(account)
    }
}

/// A subsystem holding per-session state that must not outlive the
/// connection (pending registrations, open trades, queued prompts, ...).
pub trait SessionCleanup: Send + Sync {
    /// Drops whatever the subsystem holds for this player.
    ///
    /// Called on every disconnect notification, including duplicates and
    /// disconnects for players who were never online, so it must tolerate
    /// having nothing to clear.
    fn clear_session_state(&self, player_id: PlayerId);
}

impl<F> SessionCleanup for F
where
    F: Fn(PlayerId) + Send + Sync,
{
    fn clear_session_state(&self, player_id: PlayerId) {
        self(player_id)
    }
}
