//! Core identity types shared by the session cache and the record stores.
//!
//! There are two kinds of identifiers in play:
//!
//! - **Stable**: [`PlayerId`] is assigned by the platform, unique per human
//!   player, never reused and never mutated. It keys every cache and every
//!   record file.
//! - **Transient**: [`AccountHandle`] and [`CharacterHandle`] point at the
//!   host's live objects for one connection. They change on reconnect and
//!   must never be written to disk.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PlayerId
// ---------------------------------------------------------------------------

/// The stable identifier of a player.
///
/// This is a "newtype wrapper" around the platform's 64-bit id. You can't
/// accidentally pass an [`AccountHandle`] where a `PlayerId` is expected,
/// even though both are `u64` underneath.
///
/// `Ord` is derived so record files can be written in a deterministic
/// order (a `BTreeMap<PlayerId, _>` sorts by the inner number).
///
/// `#[serde(transparent)]` serializes `PlayerId(42)` as plain `42`. As a
/// JSON object key it becomes the string `"42"`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

/// `tracing::info!(%player_id, "connected")` prints `player_id=P-42`.
impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Transient handles
// ---------------------------------------------------------------------------

/// The host's handle to a player's account session.
///
/// Only valid for the lifetime of one connection. Resolve it to a
/// [`PlayerId`] before keying anything on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountHandle(pub u64);

impl fmt::Display for AccountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

/// The host's handle to a player's in-world character.
///
/// Like [`AccountHandle`], this is not stable across reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacterHandle(pub u64);

impl fmt::Display for CharacterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}
