//! Error types for the codec layer.
//!
//! Each crate in Keepsake defines its own error enum. When you see a
//! `CodecError`, the problem is in turning a record map into bytes (or
//! back), not in the filesystem or the session cache.

/// Errors that can occur while encoding or decoding record files.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization failed (turning a record map into bytes).
    ///
    /// This is rare for plain data payloads; it usually means a payload
    /// contains something the format can't represent, such as a map
    /// keyed by a non-string type.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a record map).
    ///
    /// Common causes: a truncated file after a crash, a hand-edited file
    /// with a typo, or a payload shape that changed between releases.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The bytes decoded, but the content is not a valid record file.
    #[error("invalid record data: {0}")]
    Invalid(String),
}
