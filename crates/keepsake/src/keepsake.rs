//! `Keepsake` builder and facade.
//!
//! This ties the layers together: one suppression gate, one record store
//! registry writing through it, one session cache, and the coordinator
//! that feeds the cache. Build it once at startup and share it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use keepsake_persist::{
    FlushReport, PersistError, Record, RecordStoreRegistry, SaveOutcome, SuppressionGate,
    SuppressionScope,
};
use keepsake_protocol::PlayerId;
use keepsake_session::{
    AccountDirectory, ConnectionCoordinator, IdentityResolver, PlayerSessionCache, ScanReport,
    SessionCleanup,
};

use crate::{KeepsakeConfig, KeepsakeError};

/// Deferred typed registration: the payload type is known when the
/// builder method is called, the path only once the config is final.
type Registration = Box<dyn FnOnce(&RecordStoreRegistry, &Path) -> Result<(), PersistError>>;

/// Builder for a [`Keepsake`] instance.
///
/// # Example
///
/// ```rust
/// use keepsake::prelude::*;
///
/// let dir = tempfile::tempdir().unwrap();
/// let keepsake = Keepsake::builder()
///     .config(KeepsakeConfig::with_root(dir.path()))
///     .category("experience", || 0u64)
///     .build(|account: AccountHandle| Some(PlayerId(account.0)))
///     .unwrap();
///
/// keepsake.save("experience", PlayerId(7), 1_200u64).unwrap();
/// assert_eq!(keepsake.load::<u64>("experience", PlayerId(7)).unwrap(), 1_200);
/// ```
pub struct KeepsakeBuilder {
    config: KeepsakeConfig,
    registrations: Vec<(String, Registration)>,
    cleanup: Vec<Arc<dyn SessionCleanup>>,
}

impl KeepsakeBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: KeepsakeConfig::default(),
            registrations: Vec::new(),
            cleanup: Vec::new(),
        }
    }

    /// Replaces the configuration.
    pub fn config(mut self, config: KeepsakeConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the data root, keeping the configured categories.
    pub fn data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.data_root = root.into();
        self
    }

    /// Registers a record category with payload type `V`.
    ///
    /// The file path comes from the configuration's category table.
    pub fn category<V: Record>(
        mut self,
        name: impl Into<String>,
        default: impl Fn() -> V + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        let category = name.clone();
        self.registrations.push((
            name,
            Box::new(move |registry, relative| registry.register(category, relative, default)),
        ));
        self
    }

    /// Adds a subsystem to notify whenever a player disconnects.
    pub fn cleanup(mut self, sink: Arc<dyn SessionCleanup>) -> Self {
        self.cleanup.push(sink);
        self
    }

    /// Validates the configuration and wires everything up.
    ///
    /// No file is read here; categories load lazily on first access.
    ///
    /// # Errors
    /// - [`KeepsakeError::Config`] — two configured categories share a
    ///   file, or a registered category has no configured path
    /// - [`KeepsakeError::Persist`] — a category was registered twice
    pub fn build(
        self,
        resolver: impl IdentityResolver + 'static,
    ) -> Result<Keepsake, KeepsakeError> {
        self.config.validate()?;

        let registry = RecordStoreRegistry::new(&self.config.data_root, SuppressionGate::new());
        for (name, register) in self.registrations {
            let relative = self.config.categories.get(&name).ok_or_else(|| {
                KeepsakeError::Config(format!("category {name:?} has no configured path"))
            })?;
            register(&registry, relative)?;
        }

        let players = Arc::new(PlayerSessionCache::new());
        for sink in self.cleanup {
            players.add_cleanup(sink);
        }
        let connections = ConnectionCoordinator::new(Arc::clone(&players), Arc::new(resolver));

        tracing::info!(
            data_root = %self.config.data_root.display(),
            categories = registry.len(),
            "keepsake ready"
        );

        Ok(Keepsake {
            config: self.config,
            records: Arc::new(registry),
            players,
            connections,
        })
    }
}

impl Default for KeepsakeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The player-state subsystem: session cache plus record stores.
pub struct Keepsake {
    config: KeepsakeConfig,
    records: Arc<RecordStoreRegistry>,
    players: Arc<PlayerSessionCache>,
    connections: ConnectionCoordinator,
}

impl Keepsake {
    /// Creates a new builder.
    pub fn builder() -> KeepsakeBuilder {
        KeepsakeBuilder::new()
    }

    /// Populates the session cache from the host's account list.
    pub fn build_initial_cache(
        &self,
        directory: &dyn AccountDirectory,
    ) -> Result<ScanReport, KeepsakeError> {
        Ok(self.connections.build_initial_cache(directory)?)
    }

    /// Suppresses record file writes until the returned scope is dropped.
    ///
    /// ```rust,ignore
    /// {
    ///     let _batch = keepsake.suppress_persistence();
    ///     for player in winners {
    ///         keepsake.update::<Experience>("experience", player, |xp| xp.xp += 500.0)?;
    ///     }
    /// }
    /// keepsake.flush();
    /// ```
    pub fn suppress_persistence(&self) -> SuppressionScope {
        self.records.suppress_persistence()
    }

    /// Loads a player's record (or the category default).
    pub fn load<V: Record>(&self, category: &str, player_id: PlayerId) -> Result<V, KeepsakeError> {
        Ok(self.records.load(category, player_id)?)
    }

    /// Saves a player's record, writing the category file unless suppressed.
    pub fn save<V: Record>(
        &self,
        category: &str,
        player_id: PlayerId,
        value: V,
    ) -> Result<SaveOutcome, KeepsakeError> {
        Ok(self.records.save(category, player_id, value)?)
    }

    /// Modifies a player's record in place, then saves it.
    pub fn update<V: Record>(
        &self,
        category: &str,
        player_id: PlayerId,
        f: impl FnOnce(&mut V),
    ) -> Result<SaveOutcome, KeepsakeError> {
        Ok(self.records.update(category, player_id, f)?)
    }

    /// Writes every loaded category. Use after a suppressed batch and at
    /// shutdown.
    pub fn flush(&self) -> FlushReport {
        let report = self.records.flush_all();
        if !report.is_clean() {
            tracing::error!(failed = ?report.failed, "some record files could not be written");
        }
        report
    }

    /// Final flush at server shutdown.
    ///
    /// Logs a warning if a suppression scope is still open. The flush then
    /// reports every loaded category as suppressed instead of writing it.
    pub fn shutdown(self) -> FlushReport {
        if self.gate().is_suppressed() {
            tracing::warn!(
                depth = self.gate().depth(),
                "shutting down with persistence still suppressed"
            );
        }
        let report = self.flush();
        tracing::info!(
            written = report.written.len(),
            failed = report.failed.len(),
            online = self.players.online_count(),
            "keepsake shut down"
        );
        report
    }

    /// The suppression gate every record write consults.
    pub fn gate(&self) -> &SuppressionGate {
        self.records.gate()
    }

    /// The record store registry.
    pub fn records(&self) -> &Arc<RecordStoreRegistry> {
        &self.records
    }

    /// The known/online player cache.
    pub fn players(&self) -> &Arc<PlayerSessionCache> {
        &self.players
    }

    /// The host's entry point for connect/disconnect events.
    pub fn connections(&self) -> &ConnectionCoordinator {
        &self.connections
    }

    /// The configuration this instance was built with.
    pub fn config(&self) -> &KeepsakeConfig {
        &self.config
    }

    /// Backing files of the registered categories.
    pub fn backing_paths(&self) -> BTreeSet<PathBuf> {
        self.records.all_backing_paths()
    }
}
