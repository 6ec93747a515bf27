//! Error types for the session layer.

use keepsake_protocol::AccountHandle;

/// Errors that can occur while building or updating the session cache.
///
/// A player who simply isn't in the cache is *not* an error: lookups
/// return `None`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The initial scan already ran. Call `reset()` first to rebuild.
    #[error("session cache is already initialized")]
    AlreadyInitialized,

    /// The host's account enumeration failed as a whole.
    /// (Individual bad entries are skipped, not reported here.)
    #[error("account directory query failed: {0}")]
    Directory(String),

    /// The host could not map an account handle to a stable player id.
    /// Usually the account vanished between the callback and the lookup.
    #[error("no player id for account {0}")]
    Unresolved(AccountHandle),
}
