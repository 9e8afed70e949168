//! Session keys and the key-wrap protocol.
//!
//! A wrap is KEM-encapsulate against the recipient's public key followed by
//! AEAD-sealing the 32-byte session key under the encapsulated shared
//! secret. Unwrap is the inverse. [`unwrap_many`] is the batch form used
//! when loading conversation history: each blob is processed independently
//! and an individual failure yields `None` at that index instead of
//! aborting the batch.
//!
//! [`seal_direct`]/[`open_direct`] are the sessionless path: one fresh
//! encapsulation per payload, producing the `{kem, iv, content}` shape.
//! Secrets and multisig release keys use it; it is also the decode path for
//! pre-session message history.

use rand::{CryptoRng, RngCore};
use safelog_crypto::{CryptoError, KeyEncapsulation, SealedBox, seal};
use safelog_proto::{LegacyCiphertext, WrappedKey};
use zeroize::Zeroize;

use crate::error::SessionError;

/// Session key length.
pub const SESSION_KEY_SIZE: usize = 32;

/// A 256-bit symmetric session key.
///
/// Held in volatile memory only, never persisted. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey {
    key: [u8; SESSION_KEY_SIZE],
}

impl SessionKey {
    /// Generate a fresh random session key.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut key = [0u8; SESSION_KEY_SIZE];
        rng.fill_bytes(&mut key);
        Self { key }
    }

    /// Raw key bytes, for use as an AEAD key.
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.key
    }
}

impl From<[u8; SESSION_KEY_SIZE]> for SessionKey {
    fn from(key: [u8; SESSION_KEY_SIZE]) -> Self {
        Self { key }
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

fn decode_hex(input: &str, context: &'static str) -> Result<Vec<u8>, CryptoError> {
    hex::decode(input).map_err(|_| CryptoError::Malformed { context })
}

/// Wrap a session key for one recipient's hex-encoded KEM public key.
pub fn wrap<K: KeyEncapsulation, R: RngCore + CryptoRng>(
    kem: &K,
    session_key: &SessionKey,
    recipient_public_hex: &str,
    rng: &mut R,
) -> Result<WrappedKey, SessionError> {
    let public = decode_hex(recipient_public_hex, "recipient public key hex")?;
    let (kem_ct, shared) = kem.encapsulate(&public, rng)?;
    let sealed = seal(session_key.as_bytes(), shared.as_bytes(), rng);
    Ok(WrappedKey { kem: hex::encode(kem_ct), nonce: sealed.nonce, ct: sealed.ciphertext })
}

/// Recover a session key from a wrapped blob with our KEM private key.
pub fn unwrap<K: KeyEncapsulation>(
    kem: &K,
    wrapped: &WrappedKey,
    private_key: &[u8],
) -> Result<SessionKey, SessionError> {
    let kem_ct = decode_hex(&wrapped.kem, "kem ciphertext hex")?;
    let shared = kem.decapsulate(&kem_ct, private_key)?;
    let plain = safelog_crypto::open(&wrapped.sealed(), shared.as_bytes())?;

    let key: [u8; SESSION_KEY_SIZE] = plain
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::Malformed { context: "unwrapped session key length" })?;
    Ok(SessionKey::from(key))
}

/// Unwrap a batch of wrapped session keys independently.
///
/// The result has the same length and order as the input; a failed item is
/// `None` and never affects its neighbors. Conversation history routinely
/// mixes valid blobs with ones addressed to other parties or corrupted in
/// storage.
pub fn unwrap_many<K: KeyEncapsulation>(
    kem: &K,
    wrapped: &[WrappedKey],
    private_key: &[u8],
) -> Vec<Option<SessionKey>> {
    wrapped.iter().map(|blob| unwrap(kem, blob, private_key).ok()).collect()
}

/// Encrypt a payload directly to a recipient, one encapsulation per call.
pub fn seal_direct<K: KeyEncapsulation, R: RngCore + CryptoRng>(
    kem: &K,
    plaintext: &[u8],
    recipient_public_hex: &str,
    rng: &mut R,
) -> Result<LegacyCiphertext, SessionError> {
    let public = decode_hex(recipient_public_hex, "recipient public key hex")?;
    let (kem_ct, shared) = kem.encapsulate(&public, rng)?;
    let sealed = seal(plaintext, shared.as_bytes(), rng);
    Ok(LegacyCiphertext {
        kem: hex::encode(kem_ct),
        iv: sealed.nonce,
        content: sealed.ciphertext,
    })
}

/// Decrypt a directly encrypted payload with our KEM private key.
pub fn open_direct<K: KeyEncapsulation>(
    kem: &K,
    ciphertext: &LegacyCiphertext,
    private_key: &[u8],
) -> Result<Vec<u8>, SessionError> {
    let kem_ct = decode_hex(&ciphertext.kem, "kem ciphertext hex")?;
    let shared = kem.decapsulate(&kem_ct, private_key)?;
    Ok(safelog_crypto::open(&ciphertext.sealed(), shared.as_bytes())?)
}

/// Open a sealed box with a session key.
pub fn open_with_session_key(
    sealed: &SealedBox,
    key: &SessionKey,
) -> Result<Vec<u8>, SessionError> {
    Ok(safelog_crypto::open(sealed, key.as_bytes())?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use safelog_crypto::PqKem;

    use super::*;

    #[test]
    fn wrap_unwrap_inverse() {
        let mut rng = StdRng::seed_from_u64(1);
        let pair = PqKem::generate_keypair(&mut rng);
        let key = SessionKey::generate(&mut rng);

        let wrapped = wrap(&PqKem, &key, &hex::encode(&pair.public), &mut rng).unwrap();
        let recovered = unwrap(&PqKem, &wrapped, &pair.private).unwrap();

        assert_eq!(recovered, key);
    }

    #[test]
    fn unwrap_with_wrong_key_fails() {
        let mut rng = StdRng::seed_from_u64(2);
        let alice = PqKem::generate_keypair(&mut rng);
        let bob = PqKem::generate_keypair(&mut rng);
        let key = SessionKey::generate(&mut rng);

        let wrapped = wrap(&PqKem, &key, &hex::encode(&alice.public), &mut rng).unwrap();
        assert!(unwrap(&PqKem, &wrapped, &bob.private).is_err());
    }

    #[test]
    fn batch_isolates_corrupt_entry() {
        let mut rng = StdRng::seed_from_u64(3);
        let pair = PqKem::generate_keypair(&mut rng);
        let public_hex = hex::encode(&pair.public);

        let keys: Vec<SessionKey> =
            (0..5).map(|_| SessionKey::generate(&mut rng)).collect();
        let mut blobs: Vec<WrappedKey> = keys
            .iter()
            .map(|k| wrap(&PqKem, k, &public_hex, &mut rng).unwrap())
            .collect();
        // Corrupt blob #3
        blobs[2].ct = "deadbeef".to_string();

        let results = unwrap_many(&PqKem, &blobs, &pair.private);

        assert_eq!(results.len(), 5);
        for (i, result) in results.iter().enumerate() {
            if i == 2 {
                assert!(result.is_none());
            } else {
                assert_eq!(result.as_ref().unwrap(), &keys[i]);
            }
        }
    }

    #[test]
    fn direct_seal_open_round_trip() {
        let mut rng = StdRng::seed_from_u64(4);
        let pair = PqKem::generate_keypair(&mut rng);

        let ct =
            seal_direct(&PqKem, b"release key", &hex::encode(&pair.public), &mut rng).unwrap();
        assert_eq!(open_direct(&PqKem, &ct, &pair.private).unwrap(), b"release key");
    }

    #[test]
    fn wrap_rejects_bad_hex_public_key() {
        let mut rng = StdRng::seed_from_u64(5);
        let key = SessionKey::generate(&mut rng);
        assert!(wrap(&PqKem, &key, "not hex!", &mut rng).is_err());
    }
}
