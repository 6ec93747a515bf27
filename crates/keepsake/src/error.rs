//! Unified error type for Keepsake.

use keepsake_persist::PersistError;
use keepsake_session::SessionError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `keepsake` facade you deal with this single type. The
/// `#[from]` attributes let `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum KeepsakeError {
    /// A record category was misconfigured or misused.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// The session cache rejected an operation.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The configuration is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl KeepsakeError {
    /// Returns `true` for errors that should abort startup.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Persist(e) => e.is_configuration(),
            Self::Session(SessionError::Directory(_)) => true,
            Self::Session(_) => false,
            Self::Config(_) => true,
        }
    }
}
