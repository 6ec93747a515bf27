//! Player session cache for Keepsake.
//!
//! This crate answers two questions for the rest of the server, from any
//! thread, at any time:
//!
//! 1. **Who has ever been here?** — every player seen this process run
//! 2. **Who is here now?** — the currently connected subset
//!
//! Both views live in [`PlayerSessionCache`]. It is filled once at startup
//! from the host's account list ([`AccountDirectory`]) and then kept
//! current by the [`ConnectionCoordinator`], which the host calls on every
//! connect and disconnect.
//!
//! # How it fits in the stack
//!
//! ```text
//! Host callbacks (connect / disconnect)
//!     ↓
//! ConnectionCoordinator  ← resolves transient handles to PlayerIds
//!     ↓
//! PlayerSessionCache (this crate)  ← all-known and online maps
//!     ↓
//! SessionCleanup sinks   ← other subsystems drop per-session state
//! ```

mod cache;
mod coordinator;
mod directory;
mod error;
mod session;

pub use cache::PlayerSessionCache;
pub use coordinator::ConnectionCoordinator;
pub use directory::{AccountDirectory, IdentityResolver, SessionCleanup};
pub use error::SessionError;
pub use session::{AccountEntry, Presence, ScanReport, SessionHandle};
