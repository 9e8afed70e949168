//! Directory entries.

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// A directory record for one identity, as returned by the user directory.
///
/// `kem_public_key` is the wrap target for messages to this identity;
/// either key may be absent for identities that registered before
/// publishing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Identity address.
    pub address: Address,
    /// Display name, when registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// KEM public key, hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kem_public_key: Option<String>,
    /// Signature public key, hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_public_key: Option<String>,
}

impl DirectoryEntry {
    /// Entry with only an address and KEM key, the minimum a sender needs.
    pub fn new(address: impl Into<Address>, kem_public_key: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            username: None,
            kem_public_key: Some(kem_public_key.into()),
            signature_public_key: None,
        }
    }
}
