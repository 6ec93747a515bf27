//! Simulated arena server on top of Keepsake.
//!
//! Players connect, fight a few rounds (earning XP and bloodline mastery),
//! and leave. Afterwards a weekend bonus is handed to everyone inside one
//! suppressed batch and flushed with a single write.
//!
//! Run with `cargo run -p arena-host -- [data-dir]` and `RUST_LOG=debug`
//! to see every save.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use keepsake::prelude::*;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::info;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const PLAYERS: u64 = 24;
const MAX_ROUNDS: u32 = 6;
const WEEKEND_BONUS_XP: f32 = 250.0;
/// Platform ids are the account handle offset into the Steam id range.
const PLATFORM_BASE: u64 = 76_561_198_000_000_000;

const NAMES: &[&str] = &[
    "Mairwyn", "Quincey", "Ysolde", "Torn", "Brannoc", "Elspeth", "Vask", "Orrin",
];
const LINEAGES: &[&str] = &["warrior", "rogue", "scholar", "brute", "mutant", "draculin"];

// ---------------------------------------------------------------------------
// Record payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Experience {
    level: u32,
    xp: f32,
}

impl Experience {
    fn threshold(level: u32) -> f32 {
        100.0 + 25.0 * level as f32
    }

    /// Adds XP and returns the number of levels gained.
    fn gain(&mut self, amount: f32) -> u32 {
        self.xp += amount;
        let before = self.level;
        while self.xp >= Self::threshold(self.level) {
            self.xp -= Self::threshold(self.level);
            self.level += 1;
        }
        self.level - before
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Bloodline {
    lineage: Option<String>,
    mastery: f32,
}

impl Default for Bloodline {
    fn default() -> Self {
        Self { lineage: None, mastery: 0.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Settings {
    announce_level_ups: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { announce_level_ups: true }
    }
}

// ---------------------------------------------------------------------------
// Host-side collaborators
// ---------------------------------------------------------------------------

fn resolve(account: AccountHandle) -> Option<PlayerId> {
    (account.0 != 0).then(|| PlayerId(PLATFORM_BASE + account.0))
}

/// Players waiting for a match. Cleared on disconnect.
#[derive(Default)]
struct MatchQueue {
    waiting: Mutex<HashSet<PlayerId>>,
}

impl MatchQueue {
    fn join(&self, player_id: PlayerId) {
        self.waiting.lock().insert(player_id);
    }

    fn len(&self) -> usize {
        self.waiting.lock().len()
    }
}

impl SessionCleanup for MatchQueue {
    fn clear_session_state(&self, player_id: PlayerId) {
        self.waiting.lock().remove(&player_id);
    }
}

/// What the host knew about at boot: a few players already in the world,
/// the rest offline, and one half-created account with no character.
fn roster() -> Vec<AccountEntry> {
    let mut rng = rand::rng();
    let mut accounts: Vec<AccountEntry> = (1..=PLAYERS)
        .map(|raw| AccountEntry {
            account: AccountHandle(raw),
            character: Some(CharacterHandle(raw * 100)),
            name: Some(format!("{}{raw}", NAMES[raw as usize % NAMES.len()])),
            connected: rng.random_bool(0.25),
        })
        .collect();
    accounts.push(AccountEntry {
        account: AccountHandle(PLAYERS + 1),
        character: None,
        name: None,
        connected: false,
    });
    accounts
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

async fn play_session(
    keepsake: Arc<Keepsake>,
    queue: Arc<MatchQueue>,
    entry: AccountEntry,
) -> Result<(), BoxError> {
    let Some(name) = entry.name else {
        return Ok(());
    };
    let (character, rounds) = {
        let mut rng = rand::rng();
        (CharacterHandle(rng.random()), rng.random_range(1..=MAX_ROUNDS))
    };

    let player = keepsake
        .connections()
        .on_connect(SessionHandle::new(entry.account, character, name.clone()))?;
    queue.join(player);

    for _ in 0..rounds {
        let (pause, earned, won) = {
            let mut rng = rand::rng();
            (
                Duration::from_millis(rng.random_range(5..30)),
                rng.random_range(20.0..80.0),
                rng.random_bool(0.5),
            )
        };
        tokio::time::sleep(pause).await;

        // Each save rewrites a whole category file; keep that off the
        // async workers.
        let ks = Arc::clone(&keepsake);
        let name = name.clone();
        tokio::task::spawn_blocking(move || record_round(&ks, player, &name, earned, won))
            .await??;
    }

    keepsake.connections().on_disconnect(entry.account)?;
    Ok(())
}

fn record_round(
    keepsake: &Keepsake,
    player: PlayerId,
    name: &str,
    earned: f32,
    won: bool,
) -> Result<(), KeepsakeError> {
    let mut levels = 0;
    keepsake.update::<Experience>("experience", player, |xp| levels = xp.gain(earned))?;

    if levels > 0 {
        let settings: Settings = keepsake.load("settings", player)?;
        if settings.announce_level_ups {
            let level = keepsake.load::<Experience>("experience", player)?.level;
            info!(%player, name, level, "level up");
        }
    }

    if won {
        keepsake.update::<Bloodline>("bloodlines", player, |blood| {
            if blood.lineage.is_none() {
                let pick = rand::rng().random_range(0..LINEAGES.len());
                blood.lineage = Some(LINEAGES[pick].to_string());
            }
            blood.mastery = (blood.mastery + 2.5).min(100.0);
        })?;
    }
    Ok(())
}

/// Hands every known player the weekend bonus as one batch.
fn award_weekend_bonus(keepsake: &Keepsake) -> Result<usize, KeepsakeError> {
    let players = keepsake.players().all_players();
    {
        let _batch = keepsake.suppress_persistence();
        for (player, _) in &players {
            keepsake.update::<Experience>("experience", *player, |xp| {
                xp.gain(WEEKEND_BONUS_XP);
            })?;
        }
    }
    keepsake.flush();
    Ok(players.len())
}

fn log_leaderboard(keepsake: &Keepsake) -> Result<(), KeepsakeError> {
    let mut board = Vec::new();
    for (player, handle) in keepsake.players().all_players() {
        let xp: Experience = keepsake.load("experience", player)?;
        board.push((xp.level, handle.name));
    }
    board.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    for (rank, (level, name)) in board.iter().take(3).enumerate() {
        info!(rank = rank + 1, name = name.as_str(), level, "leaderboard");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    keepsake::logging::init();

    let data_root = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "save-data/arena-host".into());
    let queue = Arc::new(MatchQueue::default());

    let keepsake = Arc::new(
        Keepsake::builder()
            .data_root(&data_root)
            .category("experience", Experience::default)
            .category("bloodlines", Bloodline::default)
            .category("settings", Settings::default)
            .cleanup(queue.clone())
            .build(resolve)?,
    );

    let accounts = roster();
    let scan = keepsake.build_initial_cache(&accounts)?;
    info!(
        online = scan.online,
        offline = scan.offline,
        skipped = scan.skipped,
        "arena open"
    );

    let mut sessions = JoinSet::new();
    for entry in accounts {
        sessions.spawn(play_session(Arc::clone(&keepsake), Arc::clone(&queue), entry));
    }
    while let Some(finished) = sessions.join_next().await {
        finished??;
    }
    info!(
        online = keepsake.players().online_count(),
        queued = queue.len(),
        "all matches over"
    );

    let ks = Arc::clone(&keepsake);
    let rewarded = tokio::task::spawn_blocking(move || award_weekend_bonus(&ks)).await??;
    info!(rewarded, bonus = WEEKEND_BONUS_XP, "weekend bonus awarded");

    log_leaderboard(&keepsake)?;

    let keepsake = Arc::try_unwrap(keepsake).map_err(|_| "keepsake still shared at shutdown")?;
    let report = keepsake.shutdown();
    info!(%data_root, written = ?report.written, "arena closed");
    Ok(())
}
