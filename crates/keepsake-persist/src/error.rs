//! Error types for the persistence layer.

use std::path::PathBuf;

use keepsake_protocol::CodecError;

/// Errors that can occur while registering or accessing record categories.
///
/// Only the configuration variants are ever returned to callers of the
/// registry. `Io` and `Codec` describe failed disk writes and reads; those
/// are logged inside the store and never escape a `save` or `load`.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The category name was registered twice.
    /// Two registrations would split one dataset across two stores.
    #[error("record category {0:?} is already registered")]
    DuplicateCategory(String),

    /// Two categories resolve to the same backing file.
    #[error(
        "record category {category:?} would share {} with category {existing:?}",
        .path.display()
    )]
    PathCollision {
        category: String,
        existing: String,
        path: PathBuf,
    },

    /// The relative path is empty, absolute, or escapes the data root.
    #[error("record category {category:?} has invalid path {path:?}: {reason}")]
    InvalidPath {
        category: String,
        path: PathBuf,
        reason: &'static str,
    },

    /// No category with this name was registered.
    #[error("record category {0:?} is not registered")]
    UnknownCategory(String),

    /// The category was registered with a different payload type.
    #[error("record category {category:?} stores {registered}, not {requested}")]
    TypeMismatch {
        category: String,
        registered: &'static str,
        requested: &'static str,
    },

    /// Reading or writing a record file failed.
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Encoding or decoding a record file failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl PersistError {
    /// Returns `true` for errors caused by how categories were set up,
    /// as opposed to transient storage failures.
    ///
    /// Configuration errors are fatal at startup.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::Io { .. } | Self::Codec(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_collision_message_names_both_categories() {
        let err = PersistError::PathCollision {
            category: "pets".into(),
            existing: "familiars".into(),
            path: PathBuf::from("/data/familiars.json"),
        };

        let msg = err.to_string();
        assert!(msg.contains("pets"));
        assert!(msg.contains("familiars"));
        assert!(msg.contains("/data/familiars.json"));
    }

    #[test]
    fn test_is_configuration_separates_storage_failures() {
        assert!(PersistError::DuplicateCategory("xp".into()).is_configuration());
        assert!(PersistError::UnknownCategory("xp".into()).is_configuration());

        let io = PersistError::Io {
            path: PathBuf::from("xp.json"),
            source: std::io::Error::other("disk full"),
        };
        assert!(!io.is_configuration());
        assert!(io.to_string().contains("disk full"));
    }
}
