//! Player record persistence for Keepsake.
//!
//! Every piece of per-player progression (experience, bloodlines,
//! familiars, settings, ...) lives in a **category**: one in-memory map
//! from [`PlayerId`](keepsake_protocol::PlayerId) to a payload, backed by
//! exactly one file on disk.
//!
//! 1. **Suppression** — batching writes ([`SuppressionGate`],
//!    [`SuppressionScope`])
//! 2. **Record stores** — one category's map and file ([`RecordStore`])
//! 3. **Registry** — the category → file mapping ([`RecordStoreRegistry`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Gameplay / admin code  ← load/save records by category
//!     ↕
//! Registry (this crate)  ← one store per category, one file per store
//!     ↕
//! Suppression gate       ← consulted before every disk write
//! ```
//!
//! # Batching writes
//!
//! Every save rewrites the whole category file. While a
//! [`SuppressionScope`] is alive, saves only touch memory; the first save
//! (or [`RecordStore::flush`]) after the last scope ends writes the full,
//! current map. Skipped writes never need replaying.
//!
//! ```rust
//! use keepsake_persist::{RecordStoreRegistry, SaveOutcome, SuppressionGate};
//! use keepsake_protocol::PlayerId;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let registry = RecordStoreRegistry::new(dir.path(), SuppressionGate::new());
//! registry.register("kills", "kills.json", || 0u32).unwrap();
//!
//! {
//!     let _batch = registry.suppress_persistence();
//!     for raw in 1..=100 {
//!         let outcome = registry.save("kills", PlayerId(raw), 1u32).unwrap();
//!         assert_eq!(outcome, SaveOutcome::Suppressed);
//!     }
//! }
//!
//! let report = registry.flush_all();
//! assert_eq!(report.written, vec!["kills".to_string()]);
//! ```

mod error;
mod gate;
mod registry;
mod store;

pub use error::PersistError;
pub use gate::{SuppressionGate, SuppressionScope};
pub use registry::{FlushReport, RecordStoreRegistry};
pub use store::{Record, RecordStore, SaveOutcome};
