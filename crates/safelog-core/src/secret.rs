//! Envelope encryption for stored secrets.
//!
//! Secrets are not conversational: one random content key seals the
//! payload, and the content key is wrapped per grantee through the direct
//! key-wrap path. Any grantee can later extend access with [`grant`]
//! because every grantee can recover the content key.

use rand::{CryptoRng, RngCore};
use safelog_crypto::{KeyEncapsulation, SealedBox};
use safelog_proto::{Address, DirectoryEntry, ProtoError, SecretRecord};
use tracing::debug;

use crate::error::SessionError;
use crate::keywrap::{self, SessionKey};

/// Seal a secret payload for a set of grantees.
///
/// Every grantee must have a KEM public key; a secret a grantee cannot
/// open is a creation error, unlike the skip tolerance of group messaging.
pub fn seal_secret<K: KeyEncapsulation, R: RngCore + CryptoRng>(
    kem: &K,
    plaintext: &[u8],
    grantees: &[DirectoryEntry],
    id: impl Into<String>,
    rng: &mut R,
) -> Result<SecretRecord, SessionError> {
    let content_key = SessionKey::generate(rng);
    let sealed = safelog_crypto::seal(plaintext, content_key.as_bytes(), rng);
    let encrypted_data = serde_json::to_string(&sealed)
        .map_err(|_| ProtoError::Malformed { context: "sealed box encode" })?;

    let mut encrypted_key_per_grantee = std::collections::BTreeMap::new();
    for grantee in grantees {
        let public = grantee
            .kem_public_key
            .as_deref()
            .ok_or_else(|| SessionError::MissingPublicKey(grantee.address.clone()))?;
        let wrapped = keywrap::wrap(kem, &content_key, public, rng)?;
        encrypted_key_per_grantee.insert(grantee.address.clone(), wrapped);
    }
    debug!(grantees = encrypted_key_per_grantee.len(), "secret sealed");

    Ok(SecretRecord { id: id.into(), encrypted_data, encrypted_key_per_grantee })
}

/// Open a secret as one of its grantees.
pub fn open_secret<K: KeyEncapsulation>(
    kem: &K,
    record: &SecretRecord,
    own_address: &Address,
    own_kem_private: &[u8],
) -> Result<Vec<u8>, SessionError> {
    let wrapped = record
        .encrypted_key_per_grantee
        .get(own_address)
        .ok_or(SessionError::KeyNotFound)?;
    let content_key = keywrap::unwrap(kem, wrapped, own_kem_private)?;

    let sealed: SealedBox = serde_json::from_str(&record.encrypted_data)
        .map_err(|_| ProtoError::Malformed { context: "sealed box decode" })?;
    keywrap::open_with_session_key(&sealed, &content_key)
}

/// Extend a secret to a new grantee.
///
/// Any existing grantee can do this: their entry recovers the content key,
/// which is re-wrapped for the new grantee's public key. The payload is
/// never re-encrypted.
pub fn grant<K: KeyEncapsulation, R: RngCore + CryptoRng>(
    kem: &K,
    record: &mut SecretRecord,
    new_grantee: &DirectoryEntry,
    holder_address: &Address,
    holder_kem_private: &[u8],
    rng: &mut R,
) -> Result<(), SessionError> {
    let public = new_grantee
        .kem_public_key
        .as_deref()
        .ok_or_else(|| SessionError::MissingPublicKey(new_grantee.address.clone()))?;

    let holder_entry = record
        .encrypted_key_per_grantee
        .get(holder_address)
        .ok_or(SessionError::KeyNotFound)?;
    let content_key = keywrap::unwrap(kem, holder_entry, holder_kem_private)?;

    let wrapped = keywrap::wrap(kem, &content_key, public, rng)?;
    record.encrypted_key_per_grantee.insert(new_grantee.address.clone(), wrapped);
    debug!(record = record.id, grantee = %new_grantee.address, "grant added");
    Ok(())
}
