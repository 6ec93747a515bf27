//! Integration tests for the Keepsake facade: config, records, sessions.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use keepsake::prelude::*;
use keepsake::STANDARD_CATEGORIES;
use keepsake::persist::PersistError;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

// =========================================================================
// Payloads and helpers
// =========================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Experience {
    level: u32,
    xp: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Settings {
    show_xp_bar: bool,
    language: String,
}

fn resolver(account: AccountHandle) -> Option<PlayerId> {
    Some(PlayerId(account.0))
}

fn build(dir: &TempDir) -> Keepsake {
    Keepsake::builder()
        .data_root(dir.path())
        .category("experience", Experience::default)
        .category("settings", Settings::default)
        .category("bloodlines", Vec::<String>::new)
        .build(resolver)
        .unwrap()
}

fn read_json(path: PathBuf) -> serde_json::Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[test]
fn test_registered_paths_are_expected_and_distinct() {
    let dir = TempDir::new().unwrap();
    let mut builder = Keepsake::builder().data_root(dir.path());
    for (name, _) in STANDARD_CATEGORIES {
        builder = builder.category(*name, || 0u32);
    }
    let keepsake = builder.build(resolver).unwrap();

    let registered = keepsake.backing_paths();
    let expected = keepsake.config().expected_paths();

    assert_eq!(registered.len(), STANDARD_CATEGORIES.len());
    assert!(registered.is_subset(&expected));
}

#[test]
fn test_suppressed_experience_save_reaches_disk_after_scope() {
    let dir = TempDir::new().unwrap();
    let keepsake = build(&dir);
    let player = PlayerId(42);
    let file = keepsake.config().path_for("experience").unwrap();
    let value = Experience { level: 15, xp: 23.5 };

    {
        let _scope = keepsake.suppress_persistence();
        let outcome = keepsake.save("experience", player, value.clone()).unwrap();
        assert_eq!(outcome, SaveOutcome::Suppressed);
        assert!(!file.exists());
        assert_eq!(keepsake.load::<Experience>("experience", player).unwrap(), value);
    }

    let outcome = keepsake.save("experience", player, value.clone()).unwrap();
    assert_eq!(outcome, SaveOutcome::Written);

    let on_disk = read_json(file);
    assert_eq!(on_disk["42"]["level"], 15);
    assert_eq!(on_disk["42"]["xp"], 23.5);
}

#[test]
fn test_shutdown_flushes_batched_updates() {
    let dir = TempDir::new().unwrap();
    let keepsake = build(&dir);

    {
        let _scope = keepsake.suppress_persistence();
        for raw in 1..=20 {
            keepsake
                .update::<Experience>("experience", PlayerId(raw), |xp| xp.xp += 500.0)
                .unwrap();
        }
    }
    let file = keepsake.config().path_for("experience").unwrap();
    assert!(!file.exists());

    let report = keepsake.shutdown();

    assert_eq!(report.written, vec!["experience".to_string()]);
    assert!(report.is_clean());
    let on_disk = read_json(file);
    assert_eq!(on_disk.as_object().unwrap().len(), 20);
    assert_eq!(on_disk["7"]["xp"], 500.0);
}

#[test]
fn test_records_survive_rebuild() {
    let dir = TempDir::new().unwrap();
    let settings = Settings {
        show_xp_bar: true,
        language: "fr".into(),
    };
    build(&dir)
        .save("settings", PlayerId(9), settings.clone())
        .unwrap();

    let reopened = build(&dir);

    assert_eq!(reopened.load::<Settings>("settings", PlayerId(9)).unwrap(), settings);
    assert_eq!(
        reopened.load::<Settings>("settings", PlayerId(10)).unwrap(),
        Settings::default()
    );
}

#[test]
fn test_build_colliding_config_fails() {
    let dir = TempDir::new().unwrap();
    let mut config = KeepsakeConfig::with_root(dir.path());
    config
        .categories
        .insert("rested".into(), PathBuf::from("experience.json"));

    let result = Keepsake::builder()
        .config(config)
        .category("experience", Experience::default)
        .build(resolver);

    let err = result.err().unwrap();
    assert!(matches!(err, KeepsakeError::Config(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_build_unconfigured_category_fails() {
    let dir = TempDir::new().unwrap();

    let result = Keepsake::builder()
        .data_root(dir.path())
        .category("achievements", || 0u32)
        .build(resolver);

    let err = result.err().unwrap();
    assert!(err.to_string().contains("achievements"));
}

#[test]
fn test_build_duplicate_category_fails() {
    let dir = TempDir::new().unwrap();

    let result = Keepsake::builder()
        .data_root(dir.path())
        .category("experience", Experience::default)
        .category("experience", || 0u32)
        .build(resolver);

    assert!(matches!(
        result.err().unwrap(),
        KeepsakeError::Persist(PersistError::DuplicateCategory(_))
    ));
}

#[test]
fn test_load_unknown_category_and_wrong_type_fail() {
    let dir = TempDir::new().unwrap();
    let keepsake = build(&dir);

    let unknown = keepsake.load::<u32>("quests", PlayerId(1)).unwrap_err();
    let mismatch = keepsake.load::<u32>("experience", PlayerId(1)).unwrap_err();

    assert!(matches!(
        unknown,
        KeepsakeError::Persist(PersistError::UnknownCategory(_))
    ));
    assert!(matches!(
        mismatch,
        KeepsakeError::Persist(PersistError::TypeMismatch { .. })
    ));
}

#[test]
fn test_connect_disconnect_runs_cleanup_sinks() {
    let dir = TempDir::new().unwrap();
    let cleared = Arc::new(AtomicUsize::new(0));
    let sink = {
        let cleared = Arc::clone(&cleared);
        move |_player: PlayerId| {
            cleared.fetch_add(1, Ordering::Relaxed);
        }
    };
    let keepsake = Keepsake::builder()
        .data_root(dir.path())
        .cleanup(Arc::new(sink))
        .build(resolver)
        .unwrap();

    let accounts = vec![AccountEntry {
        account: AccountHandle(3),
        character: Some(CharacterHandle(30)),
        name: Some("Ysolde".into()),
        connected: true,
    }];
    let report = keepsake.build_initial_cache(&accounts).unwrap();
    assert_eq!(report.cached(), 1);

    let player = keepsake
        .connections()
        .on_disconnect(AccountHandle(3))
        .unwrap();

    assert_eq!(keepsake.players().presence(player), Presence::Offline);
    assert_eq!(cleared.load(Ordering::Relaxed), 1);
    assert_eq!(
        keepsake.players().find_by_name("ysolde").map(|(id, _)| id),
        Some(player)
    );
}

#[test]
fn test_build_initial_cache_twice_fails() {
    let dir = TempDir::new().unwrap();
    let keepsake = build(&dir);
    let accounts: Vec<AccountEntry> = Vec::new();

    keepsake.build_initial_cache(&accounts).unwrap();
    let err = keepsake.build_initial_cache(&accounts).unwrap_err();

    assert!(!err.is_fatal());
}
