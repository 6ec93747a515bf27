//! # Keepsake
//!
//! Player-state subsystem for game servers.
//!
//! Keepsake keeps two things for the host:
//!
//! - a thread-safe cache of every player seen this run and the subset
//!   online right now, kept current from connect/disconnect callbacks
//! - per-category player records (experience, bloodlines, settings, ...),
//!   each backed by one file, with a scoped switch to batch disk writes
//!
//! ## Quick Start
//!
//! ```rust
//! use keepsake::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
//! struct Experience {
//!     level: u32,
//!     xp: f32,
//! }
//!
//! let dir = tempfile::tempdir().unwrap();
//! let keepsake = Keepsake::builder()
//!     .data_root(dir.path())
//!     .category("experience", Experience::default)
//!     .build(|account: AccountHandle| Some(PlayerId(account.0)))
//!     .unwrap();
//!
//! keepsake
//!     .connections()
//!     .on_connect(SessionHandle::new(AccountHandle(42), CharacterHandle(1), "Mairwyn"))
//!     .unwrap();
//!
//! let player = PlayerId(42);
//! {
//!     let _batch = keepsake.suppress_persistence();
//!     keepsake
//!         .save("experience", player, Experience { level: 15, xp: 23.5 })
//!         .unwrap();
//! }
//! keepsake.flush();
//!
//! assert!(keepsake.players().is_online(player));
//! assert_eq!(keepsake.load::<Experience>("experience", player).unwrap().level, 15);
//! ```

mod config;
mod error;
mod keepsake;
pub mod logging;

pub use config::{KeepsakeConfig, STANDARD_CATEGORIES};
pub use error::KeepsakeError;
pub use keepsake::{Keepsake, KeepsakeBuilder};

pub use keepsake_persist as persist;
pub use keepsake_protocol as protocol;
pub use keepsake_session as session;

/// Everything a host typically needs, in one import.
pub mod prelude {
    pub use crate::{Keepsake, KeepsakeBuilder, KeepsakeConfig, KeepsakeError};
    pub use keepsake_persist::{FlushReport, Record, SaveOutcome, SuppressionScope};
    pub use keepsake_protocol::{AccountHandle, CharacterHandle, PlayerId};
    pub use keepsake_session::{
        AccountDirectory, AccountEntry, IdentityResolver, Presence, ScanReport, SessionCleanup,
        SessionHandle,
    };
}
