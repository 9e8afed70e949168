//! Password-based key derivation for the vault.
//!
//! PBKDF2-HMAC-SHA512 with a high iteration count. The cost is deliberate:
//! it throttles offline brute force against a stolen encrypted vault, and
//! every vault operation pays it because the vault re-derives the key per
//! operation instead of caching it.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use zeroize::Zeroizing;

/// Salt length stored alongside the encrypted vault.
pub const SALT_SIZE: usize = 16;

/// Default PBKDF2 iteration count for vault key derivation.
///
/// Tests may lower this through the vault's configuration; production
/// vaults must not.
pub const VAULT_KDF_ITERATIONS: u32 = 600_000;

/// Derive a 256-bit vault encryption key from a password and salt using
/// the default iteration count.
///
/// The returned key zeroizes on drop.
pub fn derive_vault_key(password: &str, salt: &[u8]) -> Zeroizing<[u8; 32]> {
    derive_vault_key_with_iterations(password, salt, VAULT_KDF_ITERATIONS)
}

/// Derive a vault key with an explicit iteration count.
pub fn derive_vault_key_with_iterations(
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2_hmac::<Sha512>(password.as_bytes(), salt, iterations, key.as_mut());
    key
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TEST_ITERS: u32 = 16;

    #[test]
    fn deterministic_for_same_inputs() {
        let a = derive_vault_key_with_iterations("hunter2", b"0123456789abcdef", TEST_ITERS);
        let b = derive_vault_key_with_iterations("hunter2", b"0123456789abcdef", TEST_ITERS);
        assert_eq!(*a, *b);
    }

    #[test]
    fn different_password_different_key() {
        let a = derive_vault_key_with_iterations("hunter2", b"0123456789abcdef", TEST_ITERS);
        let b = derive_vault_key_with_iterations("hunter3", b"0123456789abcdef", TEST_ITERS);
        assert_ne!(*a, *b);
    }

    #[test]
    fn different_salt_different_key() {
        let a = derive_vault_key_with_iterations("hunter2", b"0123456789abcdef", TEST_ITERS);
        let b = derive_vault_key_with_iterations("hunter2", b"fedcba9876543210", TEST_ITERS);
        assert_ne!(*a, *b);
    }

    #[test]
    fn iteration_count_changes_key() {
        let a = derive_vault_key_with_iterations("hunter2", b"0123456789abcdef", 16);
        let b = derive_vault_key_with_iterations("hunter2", b"0123456789abcdef", 17);
        assert_ne!(*a, *b);
    }
}
