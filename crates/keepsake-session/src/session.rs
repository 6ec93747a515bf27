//! Session types: what the cache stores about a player.
//!
//! A [`SessionHandle`] is the host's view of one player's connection. It
//! is transient: the account and character handles change on every
//! reconnect, so the cache replaces the whole handle each time.

use keepsake_protocol::{AccountHandle, CharacterHandle};

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// A player's live handles plus their display name.
///
/// Never persisted. For an offline player this is the last-known value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// The host's account-session handle.
    pub account: AccountHandle,

    /// The host's in-world character handle.
    pub character: CharacterHandle,

    /// Display name, copied from the character when the handle was taken.
    pub name: String,
}

impl SessionHandle {
    pub fn new(account: AccountHandle, character: CharacterHandle, name: impl Into<String>) -> Self {
        Self {
            account,
            character,
            name: name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// Where a player stands with respect to the cache.
///
/// ```text
///   Unknown ──(connect)──→ Online ──(disconnect)──→ Offline
///                            ↑                        │
///                            └──────(reconnect)───────┘
/// ```
///
/// There is no way back to `Unknown` except an administrative reset of the
/// whole cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Never seen this process run.
    Unknown,
    /// Seen before, not connected now.
    Offline,
    /// Connected now.
    Online,
}

// ---------------------------------------------------------------------------
// Initial scan
// ---------------------------------------------------------------------------

/// One row of the host's "every known account" enumeration.
///
/// Handles and names come straight from the host's objects, which may be
/// half torn down during startup; missing pieces make the entry malformed
/// and it gets skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountEntry {
    pub account: AccountHandle,
    pub character: Option<CharacterHandle>,
    pub name: Option<String>,
    pub connected: bool,
}

/// Counts from [`PlayerSessionCache::build_initial_cache`](crate::PlayerSessionCache::build_initial_cache).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Entries cached as online (in both maps).
    pub online: usize,
    /// Entries cached as known-offline.
    pub offline: usize,
    /// Malformed or unresolvable entries that were skipped.
    pub skipped: usize,
    /// Entries dropped because a live connect or disconnect for the same
    /// player had already been applied.
    pub superseded: usize,
}

impl ScanReport {
    /// Entries that made it into the cache.
    pub fn cached(&self) -> usize {
        self.online + self.offline
    }
}
