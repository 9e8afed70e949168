//! Key encapsulation adapters.
//!
//! Uniform interface over the two KEMs the protocol supports:
//!
//! - [`PqKem`]: ML-KEM-768 (FIPS 203), local keypairs.
//! - [`EciesKem`]: ECIES-style X25519. The "KEM ciphertext" is an ephemeral
//!   public key and the shared secret is HKDF-SHA256 of the ECDH output,
//!   bound to both public keys. Works with externally supplied (wallet)
//!   key material.
//!
//! Both produce a fixed 32-byte shared secret consumed directly as an AEAD
//! key by the key-wrap protocol.

use hkdf::Hkdf;
use kem::{Decapsulate, Encapsulate};
use ml_kem::{Encoded, EncodedSizeUser, KemCore, MlKem768};
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Shared secret length for every supported KEM.
pub const SHARED_SECRET_SIZE: usize = 32;

/// ML-KEM-768 encapsulation (public) key length.
pub const MLKEM_PUBLIC_KEY_SIZE: usize = 1184;

/// ML-KEM-768 decapsulation (private) key length.
pub const MLKEM_PRIVATE_KEY_SIZE: usize = 2400;

/// ML-KEM-768 ciphertext length.
pub const MLKEM_CIPHERTEXT_SIZE: usize = 1088;

/// X25519 public key (and ephemeral "ciphertext") length.
pub const ECIES_PUBLIC_KEY_SIZE: usize = 32;

/// HKDF info label binding ECIES shared secrets to this protocol.
const ECIES_HKDF_LABEL: &[u8] = b"safelog ecies v1";

type MlKemDecapsKey = <MlKem768 as KemCore>::DecapsulationKey;
type MlKemEncapsKey = <MlKem768 as KemCore>::EncapsulationKey;

/// A 32-byte KEM shared secret.
///
/// Used directly as an AEAD key by the wrap protocol and never exposed as
/// application data. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret {
    secret: [u8; SHARED_SECRET_SIZE],
}

impl SharedSecret {
    /// Raw secret bytes, for use as an AEAD key.
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.secret
    }
}

impl From<[u8; SHARED_SECRET_SIZE]> for SharedSecret {
    fn from(secret: [u8; SHARED_SECRET_SIZE]) -> Self {
        Self { secret }
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// An asymmetric keypair as raw bytes.
///
/// Encoding matches what the KEM's `encapsulate`/`decapsulate` accept; the
/// vault stores these hex encoded.
#[derive(Clone)]
pub struct KeyPair {
    /// Public key bytes.
    pub public: Vec<u8>,
    /// Private key bytes.
    pub private: Vec<u8>,
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.private.zeroize();
    }
}

/// KEM adapter: encapsulate against a public key, decapsulate with the
/// matching private key.
///
/// Malformed key material fails with [`CryptoError::InvalidKeyMaterial`]
/// before any primitive runs.
pub trait KeyEncapsulation {
    /// Encapsulate a fresh shared secret to `public_key`.
    ///
    /// Returns the KEM ciphertext to transmit and the shared secret.
    fn encapsulate<R: RngCore + CryptoRng>(
        &self,
        public_key: &[u8],
        rng: &mut R,
    ) -> Result<(Vec<u8>, SharedSecret), CryptoError>;

    /// Recover the shared secret from a KEM ciphertext.
    fn decapsulate(
        &self,
        kem_ciphertext: &[u8],
        private_key: &[u8],
    ) -> Result<SharedSecret, CryptoError>;
}

/// ML-KEM-768 adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PqKem;

impl PqKem {
    /// Generate a fresh ML-KEM-768 keypair.
    pub fn generate_keypair<R: RngCore + CryptoRng>(rng: &mut R) -> KeyPair {
        let (dk, ek) = MlKem768::generate(rng);
        KeyPair { public: ek.as_bytes().to_vec(), private: dk.as_bytes().to_vec() }
    }
}

impl KeyEncapsulation for PqKem {
    fn encapsulate<R: RngCore + CryptoRng>(
        &self,
        public_key: &[u8],
        rng: &mut R,
    ) -> Result<(Vec<u8>, SharedSecret), CryptoError> {
        let encoded =
            Encoded::<MlKemEncapsKey>::try_from(public_key).map_err(|_| {
                CryptoError::InvalidKeyMaterial {
                    context: "ML-KEM-768 public key",
                    expected: MLKEM_PUBLIC_KEY_SIZE,
                    actual: public_key.len(),
                }
            })?;
        let ek = MlKemEncapsKey::from_bytes(&encoded);

        let Ok((ct, shared)) = ek.encapsulate(rng) else {
            unreachable!("ML-KEM encapsulation is infallible with a valid key");
        };

        let mut secret = [0u8; SHARED_SECRET_SIZE];
        secret.copy_from_slice(&shared);
        Ok((ct.to_vec(), SharedSecret::from(secret)))
    }

    fn decapsulate(
        &self,
        kem_ciphertext: &[u8],
        private_key: &[u8],
    ) -> Result<SharedSecret, CryptoError> {
        let encoded =
            Encoded::<MlKemDecapsKey>::try_from(private_key).map_err(|_| {
                CryptoError::InvalidKeyMaterial {
                    context: "ML-KEM-768 private key",
                    expected: MLKEM_PRIVATE_KEY_SIZE,
                    actual: private_key.len(),
                }
            })?;
        let dk = MlKemDecapsKey::from_bytes(&encoded);

        let ct = ml_kem::Ciphertext::<MlKem768>::try_from(kem_ciphertext).map_err(|_| {
            CryptoError::Malformed { context: "ML-KEM-768 ciphertext" }
        })?;

        let Ok(shared) = dk.decapsulate(&ct) else {
            unreachable!("ML-KEM decapsulation is infallible (implicit rejection)");
        };

        let mut secret = [0u8; SHARED_SECRET_SIZE];
        secret.copy_from_slice(&shared);
        Ok(SharedSecret::from(secret))
    }
}

/// ECIES-style X25519 adapter.
///
/// `encapsulate` generates an ephemeral X25519 keypair, performs ECDH
/// against the recipient's static key, and derives the shared secret with
/// HKDF-SHA256 over the DH output bound to both public keys. The ephemeral
/// public key is the "KEM ciphertext".
#[derive(Debug, Clone, Copy, Default)]
pub struct EciesKem;

impl EciesKem {
    /// Generate a fresh X25519 static keypair.
    pub fn generate_keypair<R: RngCore + CryptoRng>(rng: &mut R) -> KeyPair {
        let secret = x25519_dalek::StaticSecret::random_from_rng(&mut *rng);
        let public = x25519_dalek::PublicKey::from(&secret);
        KeyPair { public: public.as_bytes().to_vec(), private: secret.to_bytes().to_vec() }
    }

    fn derive(
        dh_output: &[u8; 32],
        ephemeral_public: &[u8; 32],
        static_public: &[u8; 32],
    ) -> SharedSecret {
        let hk = Hkdf::<Sha256>::new(None, dh_output);
        let mut info = Vec::with_capacity(ECIES_HKDF_LABEL.len() + 64);
        info.extend_from_slice(ECIES_HKDF_LABEL);
        info.extend_from_slice(ephemeral_public);
        info.extend_from_slice(static_public);

        let mut secret = [0u8; SHARED_SECRET_SIZE];
        let Ok(()) = hk.expand(&info, &mut secret) else {
            unreachable!("32 bytes is a valid HKDF-SHA256 output length");
        };
        SharedSecret::from(secret)
    }

    fn key_32(bytes: &[u8], context: &'static str) -> Result<[u8; 32], CryptoError> {
        bytes.try_into().map_err(|_| CryptoError::InvalidKeyMaterial {
            context,
            expected: ECIES_PUBLIC_KEY_SIZE,
            actual: bytes.len(),
        })
    }
}

impl KeyEncapsulation for EciesKem {
    fn encapsulate<R: RngCore + CryptoRng>(
        &self,
        public_key: &[u8],
        rng: &mut R,
    ) -> Result<(Vec<u8>, SharedSecret), CryptoError> {
        let static_public = Self::key_32(public_key, "X25519 public key")?;
        let their = x25519_dalek::PublicKey::from(static_public);

        let ephemeral = x25519_dalek::EphemeralSecret::random_from_rng(&mut *rng);
        let ephemeral_public = x25519_dalek::PublicKey::from(&ephemeral);
        let dh = ephemeral.diffie_hellman(&their);

        let secret = Self::derive(dh.as_bytes(), ephemeral_public.as_bytes(), &static_public);
        Ok((ephemeral_public.as_bytes().to_vec(), secret))
    }

    fn decapsulate(
        &self,
        kem_ciphertext: &[u8],
        private_key: &[u8],
    ) -> Result<SharedSecret, CryptoError> {
        let sk_bytes = Self::key_32(private_key, "X25519 private key")?;
        let ephemeral_public = Self::key_32(kem_ciphertext, "X25519 ephemeral key")?;

        let sk = x25519_dalek::StaticSecret::from(sk_bytes);
        let static_public = x25519_dalek::PublicKey::from(&sk);
        let dh = sk.diffie_hellman(&x25519_dalek::PublicKey::from(ephemeral_public));

        Ok(Self::derive(dh.as_bytes(), &ephemeral_public, static_public.as_bytes()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn mlkem_encapsulate_decapsulate_agree() {
        let mut rng = StdRng::seed_from_u64(10);
        let pair = PqKem::generate_keypair(&mut rng);

        let (ct, sender_secret) = PqKem.encapsulate(&pair.public, &mut rng).unwrap();
        let receiver_secret = PqKem.decapsulate(&ct, &pair.private).unwrap();

        assert_eq!(sender_secret.as_bytes(), receiver_secret.as_bytes());
        assert_eq!(ct.len(), MLKEM_CIPHERTEXT_SIZE);
        assert_eq!(pair.public.len(), MLKEM_PUBLIC_KEY_SIZE);
    }

    #[test]
    fn mlkem_rejects_short_public_key() {
        let mut rng = StdRng::seed_from_u64(11);
        let result = PqKem.encapsulate(&[0u8; 64], &mut rng);
        assert!(matches!(result, Err(CryptoError::InvalidKeyMaterial { actual: 64, .. })));
    }

    #[test]
    fn mlkem_rejects_truncated_ciphertext() {
        let mut rng = StdRng::seed_from_u64(12);
        let pair = PqKem::generate_keypair(&mut rng);
        let result = PqKem.decapsulate(&[0u8; 100], &pair.private);
        assert!(matches!(result, Err(CryptoError::Malformed { .. })));
    }

    #[test]
    fn mlkem_wrong_private_key_different_secret() {
        let mut rng = StdRng::seed_from_u64(13);
        let alice = PqKem::generate_keypair(&mut rng);
        let mallory = PqKem::generate_keypair(&mut rng);

        let (ct, secret) = PqKem.encapsulate(&alice.public, &mut rng).unwrap();
        // Implicit rejection: decapsulation succeeds but yields a different secret
        let other = PqKem.decapsulate(&ct, &mallory.private).unwrap();

        assert_ne!(secret.as_bytes(), other.as_bytes());
    }

    #[test]
    fn ecies_encapsulate_decapsulate_agree() {
        let mut rng = StdRng::seed_from_u64(20);
        let pair = EciesKem::generate_keypair(&mut rng);

        let (ct, sender_secret) = EciesKem.encapsulate(&pair.public, &mut rng).unwrap();
        let receiver_secret = EciesKem.decapsulate(&ct, &pair.private).unwrap();

        assert_eq!(sender_secret.as_bytes(), receiver_secret.as_bytes());
        assert_eq!(ct.len(), ECIES_PUBLIC_KEY_SIZE);
    }

    #[test]
    fn ecies_rejects_wrong_length_keys() {
        let mut rng = StdRng::seed_from_u64(21);
        assert!(matches!(
            EciesKem.encapsulate(&[0u8; 31], &mut rng),
            Err(CryptoError::InvalidKeyMaterial { actual: 31, .. })
        ));
        assert!(matches!(
            EciesKem.decapsulate(&[0u8; 32], &[0u8; 33]),
            Err(CryptoError::InvalidKeyMaterial { actual: 33, .. })
        ));
    }

    #[test]
    fn ecies_secrets_differ_per_encapsulation() {
        let mut rng = StdRng::seed_from_u64(22);
        let pair = EciesKem::generate_keypair(&mut rng);

        let (_, a) = EciesKem.encapsulate(&pair.public, &mut rng).unwrap();
        let (_, b) = EciesKem.encapsulate(&pair.public, &mut rng).unwrap();

        assert_ne!(a.as_bytes(), b.as_bytes());
    }
}
