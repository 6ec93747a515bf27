//! The player session cache: every known player, and who's online.
//!
//! Two concurrent maps keyed by [`PlayerId`]:
//!
//! - `all` — every player seen this process run, with their last-known
//!   [`SessionHandle`]
//! - `online` — the currently connected subset
//!
//! # Invariant
//!
//! `online ⊆ all` at every observable instant. Connections insert into
//! `all` before `online`; disconnections only ever remove from `online`.
//! A full reset clears `online` before `all`, and holds the membership
//! lock exclusively while doing so, so no connection can slip an entry
//! into `online` between the two clears.
//!
//! # Scan versus live events
//!
//! The initial scan works from a snapshot, and connect/disconnect events
//! may land between taking it and applying it. Live events win: a scan
//! entry never overwrites a player already in `all`, and a player who saw
//! a live event while the scan ran is never put online by the snapshot.
//!
//! # Concurrency note
//!
//! Unlike a single-owner registry, this cache is read and written from
//! connection callbacks, gameplay handlers, and admin jobs on different
//! threads. Each map is a `DashMap` (sharded locks), so lookups never
//! wait on unrelated players. Lookups always see the latest committed
//! insert or remove.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use keepsake_protocol::PlayerId;
use parking_lot::RwLock;

use crate::{
    AccountDirectory, IdentityResolver, Presence, ScanReport, SessionCleanup, SessionError,
    SessionHandle,
};

/// The authoritative in-memory view of known and online players.
///
/// Construct one at startup and share it behind an `Arc`. All methods
/// take `&self`.
pub struct PlayerSessionCache {
    /// Every player seen this run → last-known handle.
    all: DashMap<PlayerId, SessionHandle>,

    /// Connected players → current handle.
    online: DashMap<PlayerId, SessionHandle>,

    /// Connections and disconnections take this shared; `reset` takes it
    /// exclusively.
    membership: RwLock<()>,

    /// Set by the initial scan, cleared by `reset`.
    initialized: AtomicBool,

    /// True while the initial scan is running.
    scanning: AtomicBool,

    /// Players with a live event since the scan started.
    live_during_scan: DashMap<PlayerId, ()>,

    /// Notified on every disconnection.
    cleanup: RwLock<Vec<Arc<dyn SessionCleanup>>>,
}

impl PlayerSessionCache {
    /// Creates an empty, uninitialized cache.
    pub fn new() -> Self {
        Self {
            all: DashMap::new(),
            online: DashMap::new(),
            membership: RwLock::new(()),
            initialized: AtomicBool::new(false),
            scanning: AtomicBool::new(false),
            live_during_scan: DashMap::new(),
            cleanup: RwLock::new(Vec::new()),
        }
    }

    /// Registers a subsystem to notify on every disconnection.
    pub fn add_cleanup(&self, sink: Arc<dyn SessionCleanup>) {
        self.cleanup.write().push(sink);
    }

    // =====================================================================
    // Population
    // =====================================================================

    /// Fills the cache from the host's account list. Runs once.
    ///
    /// Connected accounts go into both maps; the rest into `all` only.
    /// Entries without a character, without a name, or whose account
    /// can't be resolved are skipped and counted in the report.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyInitialized`] — the scan already ran
    /// - [`SessionError::Directory`] — the enumeration itself failed; the
    ///   cache stays uninitialized so the scan can be retried
    pub fn build_initial_cache(
        &self,
        directory: &dyn AccountDirectory,
        resolver: &dyn IdentityResolver,
    ) -> Result<ScanReport, SessionError> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Err(SessionError::AlreadyInitialized);
        }

        self.scanning.store(true, Ordering::Release);
        let entries = match directory.known_accounts() {
            Ok(entries) => entries,
            Err(e) => {
                self.finish_scan();
                self.initialized.store(false, Ordering::Release);
                tracing::error!(error = %e, "initial player scan failed");
                return Err(e);
            }
        };

        let mut report = ScanReport::default();
        for entry in entries {
            let Some(player_id) = resolver.resolve(entry.account) else {
                tracing::warn!(account = %entry.account, "skipping account with no player id");
                report.skipped += 1;
                continue;
            };
            let Some(character) = entry.character else {
                tracing::warn!(%player_id, "skipping account with no character");
                report.skipped += 1;
                continue;
            };
            let name = match entry.name {
                Some(name) if !name.trim().is_empty() => name,
                _ => {
                    tracing::warn!(%player_id, "skipping account with no character name");
                    report.skipped += 1;
                    continue;
                }
            };

            let handle = SessionHandle::new(entry.account, character, name);
            let _membership = self.membership.read();
            // Held while applying the entry, so a live event for this
            // player either lands first (and is seen here) or waits.
            let live = self.live_during_scan.entry(player_id);
            if self.all.contains_key(&player_id) {
                tracing::debug!(%player_id, "scan entry superseded by live event");
                report.superseded += 1;
                continue;
            }
            let saw_live_event = matches!(live, Entry::Occupied(_));
            self.all.insert(player_id, handle.clone());
            if entry.connected && !saw_live_event {
                self.online.insert(player_id, handle);
                report.online += 1;
            } else {
                report.offline += 1;
            }
        }
        self.finish_scan();

        tracing::info!(
            online = report.online,
            offline = report.offline,
            skipped = report.skipped,
            superseded = report.superseded,
            "player cache built"
        );
        Ok(report)
    }

    /// Records a (re)connection. Idempotent.
    ///
    /// The handle replaces whatever was cached: character and session
    /// handles are not stable across reconnects.
    ///
    /// Returns the player's presence *before* this call.
    pub fn handle_connection(&self, player_id: PlayerId, handle: SessionHandle) -> Presence {
        let previous = {
            let _membership = self.membership.read();
            let _live = self.mark_live(player_id);
            let was_known = self.all.insert(player_id, handle.clone()).is_some();
            let was_online = self.online.insert(player_id, handle).is_some();
            match (was_known, was_online) {
                (_, true) => Presence::Online,
                (true, false) => Presence::Offline,
                (false, false) => Presence::Unknown,
            }
        };

        match previous {
            Presence::Unknown => tracing::info!(%player_id, "new player connected"),
            Presence::Offline => tracing::info!(%player_id, "player reconnected"),
            Presence::Online => {
                tracing::debug!(%player_id, "connection for player already online, handle refreshed")
            }
        }
        previous
    }

    /// Records a disconnection.
    ///
    /// Removes the player from the online map (the known map keeps their
    /// last handle), then notifies every cleanup sink, whether or not the
    /// player was online.
    ///
    /// Returns `true` if the player was online.
    pub fn handle_disconnection(&self, player_id: PlayerId) -> bool {
        let was_online = {
            let _membership = self.membership.read();
            let _live = self.mark_live(player_id);
            self.online.remove(&player_id).is_some()
        };

        if was_online {
            tracing::info!(%player_id, "player disconnected");
        } else {
            tracing::debug!(%player_id, "disconnect for player who was not online");
        }

        // Clone the list so sinks run without holding our lock; a sink
        // is free to call back into the cache.
        let sinks = self.cleanup.read().clone();
        for sink in sinks {
            sink.clear_session_state(player_id);
        }
        was_online
    }

    /// While a scan runs, records that `player_id` saw a live event. The
    /// returned guard must stay alive until the event's map updates are
    /// done.
    fn mark_live(&self, player_id: PlayerId) -> Option<RefMut<'_, PlayerId, ()>> {
        self.scanning
            .load(Ordering::Acquire)
            .then(|| self.live_during_scan.entry(player_id).or_insert(()))
    }

    fn finish_scan(&self) {
        self.scanning.store(false, Ordering::Release);
        self.live_during_scan.clear();
    }

    /// Administrative reset: forgets every player and re-arms the initial
    /// scan.
    pub fn reset(&self) {
        let _membership = self.membership.write();
        self.online.clear();
        self.all.clear();
        self.initialized.store(false, Ordering::Release);
        tracing::warn!("player cache reset");
    }

    // =====================================================================
    // Queries
    // =====================================================================

    /// The player's last-known handle, online or not.
    pub fn lookup(&self, player_id: PlayerId) -> Option<SessionHandle> {
        self.all.get(&player_id).map(|entry| entry.value().clone())
    }

    /// The player's current handle, only if they're connected.
    pub fn lookup_online(&self, player_id: PlayerId) -> Option<SessionHandle> {
        self.online.get(&player_id).map(|entry| entry.value().clone())
    }

    /// Returns `true` if the player is connected.
    pub fn is_online(&self, player_id: PlayerId) -> bool {
        self.online.contains_key(&player_id)
    }

    /// Where the player stands right now.
    pub fn presence(&self, player_id: PlayerId) -> Presence {
        if self.online.contains_key(&player_id) {
            Presence::Online
        } else if self.all.contains_key(&player_id) {
            Presence::Offline
        } else {
            Presence::Unknown
        }
    }

    /// Finds a known player by display name, ignoring case.
    ///
    /// If several players share a name, the lowest id wins.
    pub fn find_by_name(&self, name: &str) -> Option<(PlayerId, SessionHandle)> {
        let wanted = name.to_lowercase();
        self.all
            .iter()
            .filter(|entry| entry.value().name.to_lowercase() == wanted)
            .map(|entry| (*entry.key(), entry.value().clone()))
            .min_by_key(|(player_id, _)| *player_id)
    }

    /// Every known player, sorted by id.
    pub fn all_players(&self) -> Vec<(PlayerId, SessionHandle)> {
        sorted_snapshot(&self.all)
    }

    /// Every connected player, sorted by id.
    pub fn online_players(&self) -> Vec<(PlayerId, SessionHandle)> {
        sorted_snapshot(&self.online)
    }

    /// Number of players seen this run.
    pub fn known_count(&self) -> usize {
        self.all.len()
    }

    /// Number of connected players.
    pub fn online_count(&self) -> usize {
        self.online.len()
    }

    /// Returns `true` once the initial scan has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }
}

impl Default for PlayerSessionCache {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_snapshot(map: &DashMap<PlayerId, SessionHandle>) -> Vec<(PlayerId, SessionHandle)> {
    let mut players: Vec<_> = map
        .iter()
        .map(|entry| (*entry.key(), entry.value().clone()))
        .collect();
    players.sort_by_key(|(player_id, _)| *player_id);
    players
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `PlayerSessionCache`.
    //!
    //! Naming: `test_{function}_{scenario}_{expected}`. The state machine
    //! under test:
    //!   Unknown → Online → Offline → Online (reconnect)

    use std::sync::Mutex;

    use keepsake_protocol::{AccountHandle, CharacterHandle};

    use super::*;
    use crate::AccountEntry;

    // -- Helpers ----------------------------------------------------------

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    /// A handle whose account/character numbers are derived from `seed`,
    /// so two calls with different seeds give different handles.
    fn handle(seed: u64, name: &str) -> SessionHandle {
        SessionHandle::new(AccountHandle(seed), CharacterHandle(seed * 10), name)
    }

    /// Resolves account `n` to player `n`, except account 0.
    fn resolver() -> impl IdentityResolver {
        |account: AccountHandle| (account.0 != 0).then_some(PlayerId(account.0))
    }

    fn entry(account: u64, name: Option<&str>, connected: bool) -> AccountEntry {
        AccountEntry {
            account: AccountHandle(account),
            character: Some(CharacterHandle(account * 10)),
            name: name.map(str::to_string),
            connected,
        }
    }

    struct FailingDirectory;

    impl AccountDirectory for FailingDirectory {
        fn known_accounts(&self) -> Result<Vec<AccountEntry>, SessionError> {
            Err(SessionError::Directory("world not ready".into()))
        }
    }

    // =====================================================================
    // build_initial_cache()
    // =====================================================================

    #[test]
    fn test_build_initial_cache_splits_online_and_offline() {
        let cache = PlayerSessionCache::new();
        let accounts = vec![
            entry(1, Some("Alucard"), true),
            entry(2, Some("Carmilla"), false),
            entry(3, Some("Dracula"), true),
        ];

        let report = cache.build_initial_cache(&accounts, &resolver()).unwrap();

        assert_eq!(report, ScanReport { online: 2, offline: 1, skipped: 0, superseded: 0 });
        assert_eq!(cache.known_count(), 3);
        assert_eq!(cache.online_count(), 2);
        assert_eq!(cache.presence(pid(2)), Presence::Offline);
        assert!(cache.is_initialized());
    }

    #[test]
    fn test_build_initial_cache_skips_malformed_entries() {
        let cache = PlayerSessionCache::new();
        let mut no_character = entry(4, Some("Ghost"), true);
        no_character.character = None;
        let accounts = vec![
            entry(1, Some("Alucard"), true),
            entry(0, Some("Unresolvable"), true),
            entry(2, None, true),
            entry(3, Some("   "), false),
            no_character,
        ];

        let report = cache.build_initial_cache(&accounts, &resolver()).unwrap();

        assert_eq!(report.cached(), 1);
        assert_eq!(report.skipped, 4);
        assert!(cache.lookup(pid(1)).is_some());
        assert!(cache.lookup(pid(4)).is_none());
    }

    #[test]
    fn test_build_initial_cache_twice_returns_already_initialized() {
        let cache = PlayerSessionCache::new();
        let accounts = vec![entry(1, Some("Alucard"), true)];
        cache.build_initial_cache(&accounts, &resolver()).unwrap();

        let result = cache.build_initial_cache(&accounts, &resolver());

        assert!(matches!(result, Err(SessionError::AlreadyInitialized)));
    }

    #[test]
    fn test_build_initial_cache_directory_failure_can_retry() {
        let cache = PlayerSessionCache::new();

        let result = cache.build_initial_cache(&FailingDirectory, &resolver());
        assert!(matches!(result, Err(SessionError::Directory(_))));
        assert!(!cache.is_initialized());

        let accounts = vec![entry(1, Some("Alucard"), true)];
        assert!(cache.build_initial_cache(&accounts, &resolver()).is_ok());
    }

    /// Delivers live events for players 7 and 8 while the scan is between
    /// taking its snapshot and applying it.
    struct EventsDuringScan<'a> {
        cache: &'a PlayerSessionCache,
    }

    impl AccountDirectory for EventsDuringScan<'_> {
        fn known_accounts(&self) -> Result<Vec<AccountEntry>, SessionError> {
            let snapshot = vec![
                entry(7, Some("Vlad"), false),
                entry(8, Some("Mina"), true),
            ];
            self.cache.handle_connection(pid(7), handle(77, "Vlad"));
            self.cache.handle_disconnection(pid(8));
            Ok(snapshot)
        }
    }

    #[test]
    fn test_build_initial_cache_live_events_win_over_snapshot() {
        let cache = PlayerSessionCache::new();

        let report = cache
            .build_initial_cache(&EventsDuringScan { cache: &cache }, &resolver())
            .unwrap();

        // Reconnect during the scan: the fresh handle stays in both maps.
        let fresh = handle(77, "Vlad");
        assert_eq!(cache.lookup(pid(7)), Some(fresh.clone()));
        assert_eq!(cache.lookup_online(pid(7)), Some(fresh));
        // Disconnect during the scan: the stale "connected" entry does not
        // put the player back online.
        assert_eq!(cache.presence(pid(8)), Presence::Offline);
        assert_eq!(report.superseded, 1);
        assert_eq!(report.offline, 1);
        assert_eq!(report.online, 0);
    }

    #[test]
    fn test_handle_connection_after_scan_is_not_tracked_as_live() {
        let cache = PlayerSessionCache::new();
        cache
            .build_initial_cache(&vec![entry(1, Some("Alucard"), false)], &resolver())
            .unwrap();

        cache.handle_connection(pid(1), handle(1, "Alucard"));

        assert!(cache.live_during_scan.is_empty());
        assert!(cache.is_online(pid(1)));
    }

    // =====================================================================
    // handle_connection()
    // =====================================================================

    #[test]
    fn test_handle_connection_new_player_is_known_and_online() {
        let cache = PlayerSessionCache::new();
        let h = handle(1, "Alucard");

        let previous = cache.handle_connection(pid(1), h.clone());

        assert_eq!(previous, Presence::Unknown);
        assert_eq!(cache.lookup(pid(1)), Some(h.clone()));
        assert_eq!(cache.lookup_online(pid(1)), Some(h));
    }

    #[test]
    fn test_handle_connection_twice_is_idempotent() {
        let cache = PlayerSessionCache::new();
        cache.handle_connection(pid(1), handle(1, "Alucard"));

        let previous = cache.handle_connection(pid(1), handle(1, "Alucard"));

        assert_eq!(previous, Presence::Online);
        assert_eq!(cache.known_count(), 1);
        assert_eq!(cache.online_count(), 1);
    }

    #[test]
    fn test_handle_connection_reconnect_replaces_stale_handle() {
        let cache = PlayerSessionCache::new();
        cache.handle_connection(pid(1), handle(1, "Alucard"));
        cache.handle_disconnection(pid(1));

        let fresh = handle(2, "Alucard");
        let previous = cache.handle_connection(pid(1), fresh.clone());

        assert_eq!(previous, Presence::Offline);
        assert_eq!(cache.lookup(pid(1)), Some(fresh.clone()));
        assert_eq!(cache.lookup_online(pid(1)), Some(fresh));
    }

    // =====================================================================
    // handle_disconnection()
    // =====================================================================

    #[test]
    fn test_handle_disconnection_keeps_last_known_handle() {
        let cache = PlayerSessionCache::new();
        let h = handle(1, "Alucard");
        cache.handle_connection(pid(1), h.clone());

        assert!(cache.handle_disconnection(pid(1)));

        assert_eq!(cache.lookup_online(pid(1)), None);
        assert_eq!(cache.lookup(pid(1)), Some(h));
        assert_eq!(cache.presence(pid(1)), Presence::Offline);
    }

    #[test]
    fn test_handle_disconnection_unknown_player_is_noop() {
        let cache = PlayerSessionCache::new();

        assert!(!cache.handle_disconnection(pid(99)));

        assert_eq!(cache.presence(pid(99)), Presence::Unknown);
        assert_eq!(cache.known_count(), 0);
    }

    #[test]
    fn test_handle_disconnection_always_notifies_cleanup() {
        let cache = PlayerSessionCache::new();
        let cleared = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&cleared);
        cache.add_cleanup(Arc::new(move |player_id: PlayerId| {
            sink.lock().unwrap().push(player_id);
        }));
        cache.handle_connection(pid(1), handle(1, "Alucard"));

        cache.handle_disconnection(pid(1));
        cache.handle_disconnection(pid(1));
        cache.handle_disconnection(pid(7));

        assert_eq!(*cleared.lock().unwrap(), vec![pid(1), pid(1), pid(7)]);
    }

    // =====================================================================
    // Queries / reset()
    // =====================================================================

    #[test]
    fn test_lookup_unknown_player_returns_none() {
        let cache = PlayerSessionCache::new();

        assert!(cache.lookup(pid(5)).is_none());
        assert!(cache.lookup_online(pid(5)).is_none());
    }

    #[test]
    fn test_find_by_name_ignores_case() {
        let cache = PlayerSessionCache::new();
        cache.handle_connection(pid(1), handle(1, "Alucard"));
        cache.handle_connection(pid(2), handle(2, "Carmilla"));

        let (player_id, found) = cache.find_by_name("carMILLA").unwrap();

        assert_eq!(player_id, pid(2));
        assert_eq!(found.name, "Carmilla");
        assert!(cache.find_by_name("Dracula").is_none());
    }

    #[test]
    fn test_bulk_enumeration_is_sorted_and_scoped() {
        let cache = PlayerSessionCache::new();
        for raw in [30, 2, 11] {
            cache.handle_connection(pid(raw), handle(raw, "p"));
        }
        cache.handle_disconnection(pid(11));

        let all: Vec<_> = cache.all_players().into_iter().map(|(id, _)| id).collect();
        let online: Vec<_> = cache.online_players().into_iter().map(|(id, _)| id).collect();

        assert_eq!(all, vec![pid(2), pid(11), pid(30)]);
        assert_eq!(online, vec![pid(2), pid(30)]);
    }

    #[test]
    fn test_reset_forgets_everyone_and_rearms_scan() {
        let cache = PlayerSessionCache::new();
        let accounts = vec![entry(1, Some("Alucard"), true)];
        cache.build_initial_cache(&accounts, &resolver()).unwrap();
        cache.handle_connection(pid(2), handle(2, "Carmilla"));

        cache.reset();

        assert_eq!(cache.known_count(), 0);
        assert_eq!(cache.online_count(), 0);
        assert!(!cache.is_initialized());
        assert!(cache.build_initial_cache(&accounts, &resolver()).is_ok());
    }
}
