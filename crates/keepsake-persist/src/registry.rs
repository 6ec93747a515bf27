//! The record store registry: one store per category, one file per store.
//!
//! Categories are registered once at startup with a payload type, a path
//! relative to the data root, and a default value. The registry refuses
//! anything that would make two names share a dataset or two datasets
//! share a file:
//!
//! - the same category name twice → [`PersistError::DuplicateCategory`]
//! - two categories on one file → [`PersistError::PathCollision`]. A
//!   store also owns `<file>.tmp` and `<file>.corrupt`, so registering a
//!   category at another category's side file is a collision too.
//! - a path outside the data root → [`PersistError::InvalidPath`]
//!
//! Stores are built lazily, the first time a category is accessed, and
//! live as long as the registry.

use std::any::{Any, TypeId, type_name};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use keepsake_protocol::{Codec, JsonCodec, PlayerId};
use parking_lot::Mutex;

use crate::store::{DefaultFn, owned_files};
use crate::{PersistError, Record, RecordStore, SaveOutcome, SuppressionGate, SuppressionScope};

/// Type-erased view of a [`RecordStore`], so stores with different payload
/// types can sit in one map.
trait ErasedStore: Send + Sync {
    fn flush(&self) -> SaveOutcome;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<V: Record, C: Codec> ErasedStore for RecordStore<V, C> {
    fn flush(&self) -> SaveOutcome {
        RecordStore::flush(self)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

type StoreFactory = Box<dyn Fn() -> Arc<dyn ErasedStore> + Send + Sync>;

struct Registration {
    path: PathBuf,
    payload: &'static str,
    type_id: TypeId,
    factory: StoreFactory,
    store: Option<Arc<dyn ErasedStore>>,
}

/// Result of [`RecordStoreRegistry::flush_all`], by category name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Categories whose file now matches memory.
    pub written: Vec<String>,
    /// Categories skipped because persistence is suppressed.
    pub suppressed: Vec<String>,
    /// Categories whose write failed (details are in the log).
    pub failed: Vec<String>,
}

impl FlushReport {
    /// Returns `true` if no write failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns every record store and the category → file mapping.
///
/// Construct one at startup and share it (usually behind an `Arc`). All
/// methods take `&self`.
pub struct RecordStoreRegistry<C = JsonCodec> {
    root: PathBuf,
    gate: SuppressionGate,
    codec: C,
    entries: Mutex<BTreeMap<String, Registration>>,
}

impl RecordStoreRegistry<JsonCodec> {
    /// Creates an empty registry writing JSON files under `root`.
    pub fn new(root: impl Into<PathBuf>, gate: SuppressionGate) -> Self {
        Self::with_codec(root, gate, JsonCodec)
    }
}

impl<C: Codec + Clone> RecordStoreRegistry<C> {
    /// Creates an empty registry with a custom codec.
    pub fn with_codec(root: impl Into<PathBuf>, gate: SuppressionGate, codec: C) -> Self {
        Self {
            root: root.into(),
            gate,
            codec,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Registers a category.
    ///
    /// `relative_path` is resolved against the data root. `default` builds
    /// the value [`load`](Self::load) returns for players with no record.
    ///
    /// # Errors
    /// - [`PersistError::InvalidPath`] — empty, absolute, or `..` path
    /// - [`PersistError::DuplicateCategory`] — name already registered
    /// - [`PersistError::PathCollision`] — another category uses the file,
    ///   or either one's temp or quarantine file
    pub fn register<V: Record>(
        &self,
        category: impl Into<String>,
        relative_path: impl AsRef<Path>,
        default: impl Fn() -> V + Send + Sync + 'static,
    ) -> Result<(), PersistError> {
        let category = category.into();
        let relative = relative_path.as_ref();
        validate_relative(&category, relative)?;
        let path = self.root.join(relative);

        let mut entries = self.entries.lock();
        if entries.contains_key(&category) {
            return Err(PersistError::DuplicateCategory(category));
        }
        let claimed = owned_files(&path);
        let collision = entries.iter().find(|(_, reg)| {
            let theirs = owned_files(&reg.path);
            claimed.iter().any(|file| theirs.contains(file))
        });
        if let Some((existing, _)) = collision {
            return Err(PersistError::PathCollision {
                category,
                existing: existing.clone(),
                path,
            });
        }

        let factory: StoreFactory = {
            let category = category.clone();
            let path = path.clone();
            let gate = self.gate.clone();
            let codec = self.codec.clone();
            let default: DefaultFn<V> = Arc::new(default);
            Box::new(move || -> Arc<dyn ErasedStore> {
                tracing::debug!(%category, "record store constructed");
                Arc::new(RecordStore::with_default_fn(
                    category.clone(),
                    path.clone(),
                    gate.clone(),
                    codec.clone(),
                    Arc::clone(&default),
                ))
            })
        };

        tracing::info!(
            %category,
            path = %path.display(),
            payload = type_name::<V>(),
            "record category registered"
        );
        entries.insert(
            category,
            Registration {
                path,
                payload: type_name::<V>(),
                type_id: TypeId::of::<V>(),
                factory,
                store: None,
            },
        );
        Ok(())
    }

    /// Returns the store for `category`, building it on first access.
    ///
    /// # Errors
    /// - [`PersistError::UnknownCategory`] — never registered
    /// - [`PersistError::TypeMismatch`] — registered with another payload type
    pub fn store<V: Record>(&self, category: &str) -> Result<Arc<RecordStore<V, C>>, PersistError> {
        let (erased, registered) = {
            let mut entries = self.entries.lock();
            let reg = entries
                .get_mut(category)
                .ok_or_else(|| PersistError::UnknownCategory(category.to_owned()))?;
            if reg.type_id != TypeId::of::<V>() {
                return Err(PersistError::TypeMismatch {
                    category: category.to_owned(),
                    registered: reg.payload,
                    requested: type_name::<V>(),
                });
            }
            let factory = &reg.factory;
            let store = reg.store.get_or_insert_with(|| factory());
            (Arc::clone(store), reg.payload)
        };

        erased
            .into_any()
            .downcast::<RecordStore<V, C>>()
            .map_err(|_| PersistError::TypeMismatch {
                category: category.to_owned(),
                registered,
                requested: type_name::<V>(),
            })
    }

    /// Shorthand for `store(category)?.load(player_id)`.
    pub fn load<V: Record>(&self, category: &str, player_id: PlayerId) -> Result<V, PersistError> {
        Ok(self.store::<V>(category)?.load(player_id))
    }

    /// Shorthand for `store(category)?.save(player_id, value)`.
    ///
    /// The `Err` case only covers configuration mistakes; a failed disk
    /// write is reported as [`SaveOutcome::Failed`].
    pub fn save<V: Record>(
        &self,
        category: &str,
        player_id: PlayerId,
        value: V,
    ) -> Result<SaveOutcome, PersistError> {
        Ok(self.store::<V>(category)?.save(player_id, value))
    }

    /// Shorthand for `store(category)?.update(player_id, f)`.
    pub fn update<V: Record>(
        &self,
        category: &str,
        player_id: PlayerId,
        f: impl FnOnce(&mut V),
    ) -> Result<SaveOutcome, PersistError> {
        Ok(self.store::<V>(category)?.update(player_id, f))
    }

    /// Flushes every store built so far. Categories never accessed have
    /// nothing newer than their files and are left alone.
    pub fn flush_all(&self) -> FlushReport {
        let stores: Vec<(String, Arc<dyn ErasedStore>)> = self
            .entries
            .lock()
            .iter()
            .filter_map(|(name, reg)| reg.store.as_ref().map(|s| (name.clone(), Arc::clone(s))))
            .collect();

        let mut report = FlushReport::default();
        for (name, store) in stores {
            match store.flush() {
                SaveOutcome::Written => report.written.push(name),
                SaveOutcome::Suppressed => report.suppressed.push(name),
                SaveOutcome::Failed => report.failed.push(name),
                SaveOutcome::Skipped => {}
            }
        }

        tracing::info!(
            written = report.written.len(),
            suppressed = report.suppressed.len(),
            failed = report.failed.len(),
            "record stores flushed"
        );
        report
    }
}

impl<C> RecordStoreRegistry<C> {
    /// Opens a suppression scope on the gate this registry writes through.
    pub fn suppress_persistence(&self) -> SuppressionScope {
        self.gate.enter()
    }

    /// The gate consulted before every write.
    pub fn gate(&self) -> &SuppressionGate {
        &self.gate
    }

    /// The backing file of one category.
    pub fn backing_path(&self, category: &str) -> Option<PathBuf> {
        self.entries.lock().get(category).map(|reg| reg.path.clone())
    }

    /// Every backing file, one per registered category.
    pub fn all_backing_paths(&self) -> BTreeSet<PathBuf> {
        self.entries
            .lock()
            .values()
            .map(|reg| reg.path.clone())
            .collect()
    }

    /// Registered category names, sorted.
    pub fn categories(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Number of registered categories.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no category is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Category files must live under the data root.
fn validate_relative(category: &str, path: &Path) -> Result<(), PersistError> {
    let invalid = |reason| PersistError::InvalidPath {
        category: category.to_owned(),
        path: path.to_path_buf(),
        reason,
    };

    if path.as_os_str().is_empty() {
        return Err(invalid("path is empty"));
    }
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(invalid("path must be relative"));
            }
            Component::ParentDir => return Err(invalid("path must not contain '..'")),
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    if path.file_name().is_none() {
        return Err(invalid("path must name a file"));
    }
    Ok(())
}
