//! Key-wrap properties over the post-quantum suite.

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use safelog_core::keywrap::{self, SessionKey};
use safelog_crypto::PqKem;

proptest! {
    // Keypair generation dominates each case; a small case count still
    // covers the key space adequately.
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn wrap_then_unwrap_recovers_any_session_key(
        key_bytes in any::<[u8; 32]>(),
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let pair = PqKem::generate_keypair(&mut rng);
        let key = SessionKey::from(key_bytes);

        let wrapped =
            keywrap::wrap(&PqKem, &key, &hex::encode(&pair.public), &mut rng).unwrap();
        let recovered = keywrap::unwrap(&PqKem, &wrapped, &pair.private).unwrap();
        prop_assert_eq!(recovered.as_bytes(), key.as_bytes());
    }

    #[test]
    fn tampered_wrap_never_unwraps(
        key_bytes in any::<[u8; 32]>(),
        seed in any::<u64>(),
        flip in 0usize..16,
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let pair = PqKem::generate_keypair(&mut rng);
        let key = SessionKey::from(key_bytes);

        let mut wrapped =
            keywrap::wrap(&PqKem, &key, &hex::encode(&pair.public), &mut rng).unwrap();
        // Corrupt one byte of the AEAD-protected key blob
        let mut ct = hex::decode(&wrapped.ct).unwrap();
        let index = flip % ct.len();
        ct[index] ^= 0x01;
        wrapped.ct = hex::encode(ct);

        prop_assert!(keywrap::unwrap(&PqKem, &wrapped, &pair.private).is_err());
    }
}
