//! Session envelopes and key-establishment payloads.
//!
//! The transport stores one JSON document per message in an opaque `content`
//! string. Three shapes exist in the wild:
//!
//! - version 1: a 1:1 session envelope, `keys` (when present) is a
//!   `{recip, sender}` pair,
//! - version 2: a group session envelope, `keys` is a map from member
//!   address to wrapped key,
//! - legacy: a pre-session direct-KEM ciphertext `{kem, iv, content}` with
//!   no version field.
//!
//! [`Envelope::decode`] checks the version tag first and treats the legacy
//! shape as one explicit compatibility branch.

use std::collections::BTreeMap;

use safelog_crypto::SealedBox;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::ProtoError;

/// Envelope version for 1:1 sessions.
pub const VERSION_DIRECT: u8 = 1;

/// Envelope version for group-channel sessions.
pub const VERSION_GROUP: u8 = 2;

/// A session key encrypted for exactly one recipient.
///
/// `kem` is the KEM ciphertext; `nonce` and `ct` are the AEAD encryption of
/// the 32-byte session key under the encapsulated shared secret. All fields
/// hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    /// KEM ciphertext, hex.
    pub kem: String,
    /// AEAD nonce, hex.
    pub nonce: String,
    /// AEAD-encrypted session key with tag, hex.
    pub ct: String,
}

impl WrappedKey {
    /// View the AEAD portion as a [`SealedBox`] for opening.
    pub fn sealed(&self) -> SealedBox {
        SealedBox { nonce: self.nonce.clone(), ciphertext: self.ct.clone() }
    }
}

/// Key-establishment material carried by the first message of a session.
///
/// The variant must agree with the envelope version: [`KeyPayload::Direct`]
/// for version 1, [`KeyPayload::Group`] for version 2. [`Envelope::decode`]
/// picks the variant from the version tag, never from the payload's shape,
/// so a group member literally addressed `recip` still parses as a map
/// entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum KeyPayload {
    /// 1:1 establishment: one entry for the recipient and, when the sender's
    /// own public key was available at send time, one for the sender so they
    /// can decrypt their own sent history.
    Direct {
        /// Session key wrapped for the recipient.
        recip: WrappedKey,
        /// Session key wrapped for the sender.
        #[serde(skip_serializing_if = "Option::is_none")]
        sender: Option<WrappedKey>,
    },
    /// Group establishment: one entry per member that had a public key at
    /// send time, keyed by normalized address.
    Group(BTreeMap<Address, WrappedKey>),
}

/// A session message as stored in the transport's `content` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    /// Envelope version: [`VERSION_DIRECT`] or [`VERSION_GROUP`].
    pub v: u8,
    /// Session id the ciphertext is keyed under.
    pub sid: String,
    /// Key establishment, present only on the first message of a session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<KeyPayload>,
    /// Message ciphertext under the session key.
    pub ct: SealedBox,
}

/// The pre-session direct-KEM message format.
///
/// Each message carried its own KEM encapsulation; there is no session id
/// and nothing is cached. Field names match the historical wire format,
/// `iv` included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCiphertext {
    /// KEM ciphertext, hex.
    pub kem: String,
    /// AEAD nonce, hex.
    pub iv: String,
    /// AEAD ciphertext with tag, hex.
    pub content: String,
}

impl LegacyCiphertext {
    /// View the AEAD portion as a [`SealedBox`] for opening.
    pub fn sealed(&self) -> SealedBox {
        SealedBox { nonce: self.iv.clone(), ciphertext: self.content.clone() }
    }
}

// Wire shape of a session envelope before the version-directed key parse.
#[derive(Deserialize)]
struct RawEnvelope {
    v: u8,
    sid: String,
    #[serde(default)]
    keys: Option<serde_json::Value>,
    ct: SealedBox,
}

#[derive(Deserialize)]
struct DirectKeys {
    recip: WrappedKey,
    #[serde(default)]
    sender: Option<WrappedKey>,
}

/// A decoded transport `content` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A versioned session envelope.
    Session(Envelope),
    /// A legacy direct-KEM ciphertext.
    Legacy(LegacyCiphertext),
}

impl Envelope {
    /// Serialize to the transport `content` string.
    pub fn encode(&self) -> Result<String, ProtoError> {
        serde_json::to_string(self)
            .map_err(|_| ProtoError::Malformed { context: "envelope encode" })
    }

    /// Decode a transport `content` string.
    ///
    /// The version field is inspected before any shape is assumed: it
    /// selects the key-payload variant directly, so the payload's shape is
    /// never sniffed. A document without `v` is accepted only if it matches
    /// the legacy `{kem, iv, content}` format exactly; an unknown version
    /// fails with [`ProtoError::UnsupportedVersion`].
    pub fn decode(content: &str) -> Result<Payload, ProtoError> {
        let value: serde_json::Value = serde_json::from_str(content)
            .map_err(|_| ProtoError::Malformed { context: "content is not JSON" })?;

        match value.get("v") {
            Some(v) => {
                let version =
                    v.as_u64().ok_or(ProtoError::Malformed { context: "version tag" })?;
                if version != u64::from(VERSION_DIRECT) && version != u64::from(VERSION_GROUP) {
                    return Err(ProtoError::UnsupportedVersion(version));
                }
                let raw: RawEnvelope = serde_json::from_value(value)
                    .map_err(|_| ProtoError::Malformed { context: "session envelope" })?;

                let keys = match raw.keys {
                    None => None,
                    Some(keys) if raw.v == VERSION_DIRECT => {
                        let direct: DirectKeys = serde_json::from_value(keys)
                            .map_err(|_| ProtoError::Malformed { context: "key payload" })?;
                        Some(KeyPayload::Direct { recip: direct.recip, sender: direct.sender })
                    }
                    Some(keys) => {
                        let members: BTreeMap<Address, WrappedKey> =
                            serde_json::from_value(keys)
                                .map_err(|_| ProtoError::Malformed { context: "key payload" })?;
                        Some(KeyPayload::Group(members))
                    }
                };

                Ok(Payload::Session(Envelope { v: raw.v, sid: raw.sid, keys, ct: raw.ct }))
            }
            None => {
                let legacy: LegacyCiphertext = serde_json::from_value(value)
                    .map_err(|_| ProtoError::Malformed { context: "legacy ciphertext" })?;
                Ok(Payload::Legacy(legacy))
            }
        }
    }
}
