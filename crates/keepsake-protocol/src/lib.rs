//! Identity types and record codecs for Keepsake.
//!
//! This crate defines the vocabulary every other Keepsake crate shares:
//!
//! - **Types** ([`PlayerId`], [`AccountHandle`], [`CharacterHandle`]) —
//!   the stable player key and the transient handles the host hands us.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how a category's record
//!   map is turned into bytes on disk and back.
//! - **Errors** ([`CodecError`]) — what can go wrong while encoding or
//!   decoding a record file.
//!
//! # Architecture
//!
//! ```text
//! Session cache (keyed by PlayerId)     Record stores (keyed by PlayerId)
//!              ↘                               ↙
//!                 Protocol (this crate: ids, codecs)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::CodecError;
pub use types::{AccountHandle, CharacterHandle, PlayerId};
