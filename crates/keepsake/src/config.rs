//! Keepsake configuration: where record files live.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::KeepsakeError;

/// Standard record categories and their paths relative to the data root.
///
/// Hosts may add, drop, or move entries; the builder only requires that
/// every category it registers appears in the config it is given.
pub const STANDARD_CATEGORIES: &[(&str, &str)] = &[
    ("experience", "experience.json"),
    ("rested_xp", "rested_xp.json"),
    ("prestige", "prestige.json"),
    ("classes", "classes.json"),
    ("quests", "quests.json"),
    ("professions", "professions.json"),
    ("expertise", "expertise/weapons.json"),
    ("weapon_spells", "expertise/spells.json"),
    ("bloodlines", "legacies/bloodlines.json"),
    ("blood_stats", "legacies/stats.json"),
    ("familiar_unlocks", "familiars/unlocks.json"),
    ("familiar_experience", "familiars/experience.json"),
    ("familiar_battle_groups", "familiars/battle_groups.json"),
    ("shapeshifts", "shapeshifts.json"),
    ("settings", "settings.json"),
];

/// Configuration for a [`Keepsake`](crate::Keepsake) instance.
///
/// Derives serde so hosts can embed it in their own config files; reading
/// those files is up to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepsakeConfig {
    /// Directory every category path is resolved against.
    pub data_root: PathBuf,

    /// Category name → file path relative to `data_root`.
    pub categories: BTreeMap<String, PathBuf>,
}

impl Default for KeepsakeConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("save-data/keepsake"),
            categories: STANDARD_CATEGORIES
                .iter()
                .map(|(name, path)| (name.to_string(), PathBuf::from(path)))
                .collect(),
        }
    }
}

impl KeepsakeConfig {
    /// The standard categories under a custom data root.
    pub fn with_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Self::default()
        }
    }

    /// Absolute-or-root-relative path of one category's file.
    pub fn path_for(&self, category: &str) -> Option<PathBuf> {
        self.categories
            .get(category)
            .map(|relative| self.data_root.join(relative))
    }

    /// Every path the configuration declares, one per category.
    pub fn expected_paths(&self) -> BTreeSet<PathBuf> {
        self.categories
            .values()
            .map(|relative| self.data_root.join(relative))
            .collect()
    }

    /// Checks that no two categories declare the same file.
    ///
    /// # Errors
    /// [`KeepsakeError::Config`] naming both categories.
    pub fn validate(&self) -> Result<(), KeepsakeError> {
        let mut seen: BTreeMap<PathBuf, &str> = BTreeMap::new();
        for (name, relative) in &self.categories {
            let path = self.data_root.join(relative);
            if let Some(existing) = seen.insert(path.clone(), name) {
                return Err(KeepsakeError::Config(format!(
                    "categories {existing:?} and {name:?} both use {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}
