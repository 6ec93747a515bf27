//! Record stores: one category's player map and the file behind it.
//!
//! A store is loaded lazily. The first call that needs the map reads the
//! backing file; until then the store is just a name and a path.
//!
//! ```text
//!   [Unloaded] ──(load / save / update / len / ...)──→ [Loaded]
//!                                                        │
//!                   save / update: mutate map, then ─────┤
//!                   write whole map unless suppressed    │
//!                                                        ▼
//!                                                   never evicted
//! ```
//!
//! # Concurrency
//!
//! One mutex guards the map and the loaded flag. A save holds it across
//! encoding and writing, so two saves for the same category reach the
//! disk in the same order they reached memory.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use keepsake_protocol::{Codec, JsonCodec, PlayerId};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{PersistError, SuppressionGate};

/// Marker for types that can be stored as a player record.
///
/// Blanket-implemented: any plain serde data type that can be cloned and
/// sent between threads qualifies. You never implement this by hand.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + 'static {}

impl<T> Record for T where T: Serialize + DeserializeOwned + Clone + Send + 'static {}

/// Produces the value returned for players with no stored record.
pub(crate) type DefaultFn<V> = Arc<dyn Fn() -> V + Send + Sync>;

/// What happened to the disk during a save, update, or flush.
///
/// The in-memory map is updated regardless of the outcome; this only
/// reports whether the backing file now matches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The full map was written to the backing file.
    Written,
    /// Persistence is suppressed; only memory was changed.
    Suppressed,
    /// Writing failed. The error has been logged; memory is still current.
    Failed,
    /// Nothing to write: a flush on a store that was never loaded.
    Skipped,
}

#[derive(Debug)]
struct StoreState<V> {
    loaded: bool,
    records: HashMap<PlayerId, V>,
}

/// The in-memory map and backing file for one record category.
///
/// Usually obtained from a [`RecordStoreRegistry`](crate::RecordStoreRegistry),
/// which guarantees one store per category and one category per file.
pub struct RecordStore<V, C = JsonCodec> {
    category: String,
    path: PathBuf,
    gate: SuppressionGate,
    codec: C,
    default: DefaultFn<V>,
    state: Mutex<StoreState<V>>,
}

impl<V: Record, C: Codec> RecordStore<V, C> {
    /// Creates an unloaded store. Nothing is read until first use.
    pub fn new(
        category: impl Into<String>,
        path: impl Into<PathBuf>,
        gate: SuppressionGate,
        codec: C,
        default: impl Fn() -> V + Send + Sync + 'static,
    ) -> Self {
        Self::with_default_fn(category.into(), path.into(), gate, codec, Arc::new(default))
    }

    pub(crate) fn with_default_fn(
        category: String,
        path: PathBuf,
        gate: SuppressionGate,
        codec: C,
        default: DefaultFn<V>,
    ) -> Self {
        Self {
            category,
            path,
            gate,
            codec,
            default,
            state: Mutex::new(StoreState {
                loaded: false,
                records: HashMap::new(),
            }),
        }
    }

    /// Returns the player's record, or the category default if they have
    /// none. The default is not stored.
    pub fn load(&self, player_id: PlayerId) -> V {
        let mut state = self.state.lock();
        self.ensure_loaded(&mut state);
        match state.records.get(&player_id) {
            Some(value) => value.clone(),
            None => (self.default)(),
        }
    }

    /// Stores the player's record, then writes the whole category file
    /// unless persistence is suppressed.
    pub fn save(&self, player_id: PlayerId, value: V) -> SaveOutcome {
        let mut state = self.state.lock();
        self.ensure_loaded(&mut state);
        state.records.insert(player_id, value);
        self.persist(&state.records)
    }

    /// Modifies the player's record in place (starting from the default
    /// if absent), then writes like [`save`](Self::save).
    ///
    /// The read and the write happen under one lock, so two concurrent
    /// updates for the same player never overwrite each other.
    pub fn update(&self, player_id: PlayerId, f: impl FnOnce(&mut V)) -> SaveOutcome {
        let mut state = self.state.lock();
        self.ensure_loaded(&mut state);
        let record = state
            .records
            .entry(player_id)
            .or_insert_with(|| (self.default)());
        f(record);
        self.persist(&state.records)
    }

    /// Writes the current map without changing it.
    ///
    /// This is the "flush once" step after a suppressed batch. A store
    /// that was never loaded has nothing newer than its file and is
    /// skipped.
    pub fn flush(&self) -> SaveOutcome {
        let state = self.state.lock();
        if !state.loaded {
            return SaveOutcome::Skipped;
        }
        self.persist(&state.records)
    }

    /// Returns `true` if the player has a stored record (defaults don't count).
    pub fn contains(&self, player_id: PlayerId) -> bool {
        let mut state = self.state.lock();
        self.ensure_loaded(&mut state);
        state.records.contains_key(&player_id)
    }

    /// Number of players with a stored record.
    pub fn len(&self) -> usize {
        let mut state = self.state.lock();
        self.ensure_loaded(&mut state);
        state.records.len()
    }

    /// Returns `true` if no player has a stored record.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of every stored record, ordered by player.
    pub fn snapshot(&self) -> BTreeMap<PlayerId, V> {
        let mut state = self.state.lock();
        self.ensure_loaded(&mut state);
        state
            .records
            .iter()
            .map(|(id, value)| (*id, value.clone()))
            .collect()
    }

    /// The category name this store was registered under.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The file this category is persisted to.
    pub fn backing_path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` once the backing file has been read.
    pub fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    // -- Internals --------------------------------------------------------

    fn ensure_loaded(&self, state: &mut StoreState<V>) {
        if state.loaded {
            return;
        }
        state.records = self.read_file();
        state.loaded = true;
    }

    /// Reads the backing file. Every failure degrades to an empty map.
    fn read_file(&self) -> HashMap<PlayerId, V> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(
                    category = %self.category,
                    path = %self.path.display(),
                    "no record file yet, starting empty"
                );
                return HashMap::new();
            }
            Err(e) => {
                tracing::error!(
                    category = %self.category,
                    path = %self.path.display(),
                    error = %e,
                    "failed to read record file, starting empty"
                );
                self.quarantine();
                return HashMap::new();
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            tracing::warn!(
                category = %self.category,
                path = %self.path.display(),
                "record file is empty"
            );
            return HashMap::new();
        }

        match self.codec.decode::<HashMap<PlayerId, V>>(&bytes) {
            Ok(records) => {
                tracing::info!(
                    category = %self.category,
                    records = records.len(),
                    "record file loaded"
                );
                records
            }
            Err(e) => {
                tracing::error!(
                    category = %self.category,
                    path = %self.path.display(),
                    error = %e,
                    "record file is corrupt, starting empty"
                );
                self.quarantine();
                HashMap::new()
            }
        }
    }

    /// Moves an unreadable or undecodable file aside so the next write
    /// doesn't replace the only copy of whatever it contained.
    fn quarantine(&self) {
        let target = with_suffix(&self.path, QUARANTINE_SUFFIX);
        match fs::rename(&self.path, &target) {
            Ok(()) => tracing::warn!(
                category = %self.category,
                moved_to = %target.display(),
                "corrupt record file moved aside"
            ),
            Err(e) => tracing::error!(
                category = %self.category,
                error = %e,
                "failed to move corrupt record file aside"
            ),
        }
    }

    fn persist(&self, records: &HashMap<PlayerId, V>) -> SaveOutcome {
        if self.gate.is_suppressed() {
            tracing::trace!(category = %self.category, "write suppressed");
            return SaveOutcome::Suppressed;
        }

        match self.write_file(records) {
            Ok(()) => {
                tracing::debug!(
                    category = %self.category,
                    records = records.len(),
                    "record file written"
                );
                SaveOutcome::Written
            }
            Err(e) => {
                tracing::error!(
                    category = %self.category,
                    error = %e,
                    "failed to write record file, keeping in-memory state"
                );
                SaveOutcome::Failed
            }
        }
    }

    /// Encodes the whole map and replaces the backing file atomically:
    /// write a sibling temp file, then rename it over the real one.
    fn write_file(&self, records: &HashMap<PlayerId, V>) -> Result<(), PersistError> {
        let ordered: BTreeMap<&PlayerId, &V> = records.iter().collect();
        let bytes = self.codec.encode(&ordered)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| PersistError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let temp = with_suffix(&self.path, TEMP_SUFFIX);
        fs::write(&temp, &bytes).map_err(|source| PersistError::Io {
            path: temp.clone(),
            source,
        })?;

        if let Err(source) = fs::rename(&temp, &self.path) {
            let _ = fs::remove_file(&temp);
            return Err(PersistError::Io {
                path: self.path.clone(),
                source,
            });
        }
        Ok(())
    }
}

impl<V, C> fmt::Debug for RecordStore<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("category", &self.category)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Appended to the backing file name for the write-then-rename temp file.
pub(crate) const TEMP_SUFFIX: &str = ".tmp";

/// Appended to the backing file name when a bad file is moved aside.
pub(crate) const QUARANTINE_SUFFIX: &str = ".corrupt";

/// Every file a store at `path` may create or replace.
pub(crate) fn owned_files(path: &Path) -> [PathBuf; 3] {
    [
        path.to_path_buf(),
        with_suffix(path, TEMP_SUFFIX),
        with_suffix(path, QUARANTINE_SUFFIX),
    ]
}

/// `players.json` + `.tmp` → `players.json.tmp`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(OsString::new);
    name.push(suffix);
    path.with_file_name(name)
}
