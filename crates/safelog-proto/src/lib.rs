//! Wire and data model for the SafeLog envelope protocol.
//!
//! Everything here is plain serde data: the session envelope and its
//! key-establishment payloads, the legacy direct-KEM ciphertext format,
//! directory entries, and envelope-encrypted secret records. The transport
//! stores envelopes JSON-encoded in an opaque `content` string; this crate
//! owns that encoding and nothing else. Protocol behavior lives in
//! `safelog-core`.

#![forbid(unsafe_code)]

mod address;
mod directory;
mod envelope;
mod error;
mod secret;

pub use address::Address;
pub use directory::DirectoryEntry;
pub use envelope::{
    Envelope, KeyPayload, LegacyCiphertext, Payload, VERSION_DIRECT, VERSION_GROUP, WrappedKey,
};
pub use error::ProtoError;
pub use secret::SecretRecord;
