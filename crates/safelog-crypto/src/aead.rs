//! Symmetric encryption with `ChaCha20-Poly1305`.
//!
//! The sealed form carries its nonce and ciphertext as hex strings, matching
//! the JSON wire format the transport persists. A fresh random 96-bit nonce
//! is drawn from the caller's RNG on every seal; nonces are never reused for
//! the same key.

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Nonce size for `ChaCha20-Poly1305` (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size appended to every ciphertext.
const TAG_SIZE: usize = 16;

/// An AEAD-sealed payload: hex-encoded nonce and ciphertext-with-tag.
///
/// This is the `ct` field of the wire envelope and the body of the
/// encrypted vault, so it serializes with the short field names the
/// JSON format uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    /// 96-bit nonce, hex encoded (24 chars).
    pub nonce: String,
    /// Ciphertext including the 16-byte Poly1305 tag, hex encoded.
    pub ciphertext: String,
}

/// Encrypt `plaintext` under a 256-bit key with a fresh random nonce.
///
/// The nonce is drawn from `rng`; callers must supply a cryptographically
/// secure generator in production.
pub fn seal<R: RngCore + CryptoRng>(plaintext: &[u8], key: &[u8; 32], rng: &mut R) -> SealedBox {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut nonce);

    let cipher = ChaCha20Poly1305::new(key.into());
    let Ok(ciphertext) = cipher.encrypt(Nonce::from_slice(&nonce), plaintext) else {
        unreachable!("ChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    SealedBox { nonce: hex::encode(nonce), ciphertext: hex::encode(ciphertext) }
}

/// Decrypt a [`SealedBox`] with a 256-bit key.
///
/// # Errors
///
/// - `Malformed` if the nonce or ciphertext is not valid hex, the nonce is
///   not 12 bytes, or the ciphertext is shorter than the tag
/// - `AuthenticationFailed` if the Poly1305 tag does not verify (tampering
///   or wrong key)
pub fn open(sealed: &SealedBox, key: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    let nonce =
        hex::decode(&sealed.nonce).map_err(|_| CryptoError::Malformed { context: "nonce hex" })?;
    if nonce.len() != NONCE_SIZE {
        return Err(CryptoError::Malformed { context: "nonce length" });
    }

    let ciphertext = hex::decode(&sealed.ciphertext)
        .map_err(|_| CryptoError::Malformed { context: "ciphertext hex" })?;
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::Malformed { context: "ciphertext length" });
    }

    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    #[test]
    fn seal_open_roundtrip() {
        let key = test_key();
        let mut rng = StdRng::seed_from_u64(1);

        let sealed = seal(b"hello world", &key, &mut rng);
        let opened = open(&sealed, &key).unwrap();

        assert_eq!(opened, b"hello world");
    }

    #[test]
    fn seal_empty_plaintext() {
        let key = test_key();
        let mut rng = StdRng::seed_from_u64(2);

        let sealed = seal(b"", &key, &mut rng);
        assert_eq!(open(&sealed, &key).unwrap(), b"");
    }

    #[test]
    fn fresh_nonce_per_call() {
        let key = test_key();
        let mut rng = StdRng::seed_from_u64(3);

        let a = seal(b"same message", &key, &mut rng);
        let b = seal(b"same message", &key, &mut rng);

        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_key_fails_closed() {
        let key = test_key();
        let mut rng = StdRng::seed_from_u64(4);
        let sealed = seal(b"secret", &key, &mut rng);

        let mut wrong = key;
        wrong[0] ^= 0xFF;

        assert_eq!(open(&sealed, &wrong), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn tampered_ciphertext_fails_closed() {
        let key = test_key();
        let mut rng = StdRng::seed_from_u64(5);
        let mut sealed = seal(b"secret", &key, &mut rng);

        // Flip one bit inside the hex ciphertext
        let mut raw = hex::decode(&sealed.ciphertext).unwrap();
        raw[0] ^= 0x01;
        sealed.ciphertext = hex::encode(raw);

        assert_eq!(open(&sealed, &key), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn tampered_nonce_fails_closed() {
        let key = test_key();
        let mut rng = StdRng::seed_from_u64(6);
        let mut sealed = seal(b"secret", &key, &mut rng);

        let mut raw = hex::decode(&sealed.nonce).unwrap();
        raw[11] ^= 0x80;
        sealed.nonce = hex::encode(raw);

        assert_eq!(open(&sealed, &key), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn garbage_hex_is_malformed_not_panic() {
        let key = test_key();
        let sealed =
            SealedBox { nonce: "zz".to_string(), ciphertext: "00".repeat(20) };
        assert!(matches!(open(&sealed, &key), Err(CryptoError::Malformed { .. })));

        let sealed = SealedBox { nonce: "00".repeat(12), ciphertext: "0011".to_string() };
        assert!(matches!(open(&sealed, &key), Err(CryptoError::Malformed { .. })));
    }
}
