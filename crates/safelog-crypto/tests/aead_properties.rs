//! Property-based tests for the AEAD helper.
//!
//! Verifies round-trip correctness for arbitrary plaintexts and keys, and
//! that any single-bit corruption of a sealed box fails authentication
//! instead of yielding corrupted plaintext.

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use safelog_crypto::{CryptoError, open, seal};

proptest! {
    #[test]
    fn round_trip_for_any_plaintext(
        plaintext in prop::collection::vec(any::<u8>(), 0..2048),
        key in any::<[u8; 32]>(),
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let sealed = seal(&plaintext, &key, &mut rng);
        prop_assert_eq!(open(&sealed, &key).unwrap(), plaintext);
    }

    #[test]
    fn any_ciphertext_bit_flip_fails_authentication(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        key in any::<[u8; 32]>(),
        seed in any::<u64>(),
        flip in any::<proptest::sample::Index>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let sealed = seal(&plaintext, &key, &mut rng);

        let mut bytes = hex::decode(&sealed.ciphertext).unwrap();
        let bit = flip.index(bytes.len() * 8);
        bytes[bit / 8] ^= 1 << (bit % 8);

        let mut tampered = sealed.clone();
        tampered.ciphertext = hex::encode(bytes);

        prop_assert!(matches!(open(&tampered, &key), Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn any_nonce_bit_flip_fails_authentication(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        key in any::<[u8; 32]>(),
        seed in any::<u64>(),
        flip in 0usize..96,
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let sealed = seal(&plaintext, &key, &mut rng);

        let mut bytes = hex::decode(&sealed.nonce).unwrap();
        bytes[flip / 8] ^= 1 << (flip % 8);

        let mut tampered = sealed.clone();
        tampered.nonce = hex::encode(bytes);

        prop_assert!(matches!(open(&tampered, &key), Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn wrong_key_never_decrypts(
        plaintext in prop::collection::vec(any::<u8>(), 0..256),
        key_a in any::<[u8; 32]>(),
        key_b in any::<[u8; 32]>(),
        seed in any::<u64>(),
    ) {
        prop_assume!(key_a != key_b);
        let mut rng = StdRng::seed_from_u64(seed);
        let sealed = seal(&plaintext, &key_a, &mut rng);
        prop_assert!(open(&sealed, &key_b).is_err());
    }
}
