//! Codec trait and implementations for record files.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! Record stores don't care HOW a category's map is serialized; they
//! just need something that implements the [`Codec`] trait.
//!
//! Currently we provide [`JsonCodec`] (human-readable, easy to inspect and
//! hand-repair on a live server). A compact binary codec can be added later
//! without touching the stores.

use serde::{Serialize, de::DeserializeOwned};

use crate::CodecError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → one codec value is shared by every record store, and
///   stores are used from many threads at once.
/// - `'static` → the codec owns everything it needs. Stores are kept in a
///   type-erased registry for the whole process lifetime.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `CodecError::Encode` if the value can't be represented in
    /// this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `CodecError::Decode` if the bytes are malformed, truncated,
    /// or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses pretty-printed JSON (via `serde_json`).
///
/// Record files are small (one entry per player who ever touched the
/// category) and get read by humans during support work, so readability
/// wins over size here.
///
/// This is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use std::collections::BTreeMap;
/// use keepsake_protocol::{Codec, JsonCodec, PlayerId};
///
/// let codec = JsonCodec;
///
/// let mut levels = BTreeMap::new();
/// levels.insert(PlayerId(42), 15u32);
///
/// let bytes = codec.encode(&levels).unwrap();
/// let decoded: BTreeMap<PlayerId, u32> = codec.decode(&bytes).unwrap();
/// assert_eq!(levels, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec_pretty(value).map_err(CodecError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError> {
        // serde_json reports blank input as a generic EOF error; callers
        // that care (record stores) want to tell it apart from corruption.
        if data.iter().all(u8::is_ascii_whitespace) {
            return Err(CodecError::Invalid("empty input".into()));
        }
        serde_json::from_slice(data).map_err(CodecError::Decode)
    }
}
