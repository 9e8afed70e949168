//! The vault state machine and its password-gated operations.

use rand::{CryptoRng, RngCore};
use safelog_core::keywrap::{self, SessionKey};
use safelog_crypto::{EciesKem, Ed25519Signer, PqKem, PqSigner, SignatureScheme};
use safelog_proto::{LegacyCiphertext, WrappedKey};
use tracing::{debug, info};

use crate::account::{
    Account, AccountSummary, Suite, VaultData, decrypt_vault, encrypt_vault,
};
use crate::error::VaultError;
use crate::store::VaultStore;

/// Where the vault is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// No vault has been created.
    Uninitialized,
    /// A vault exists but is not unlocked.
    Locked,
    /// Unlocked; sanitized account data is readable.
    Unlocked,
}

/// A password-encrypted multi-account keystore.
///
/// Unlocking keeps only a sanitized copy (public keys, names, ids) in
/// memory. Every operation that touches a private key takes the password
/// again, decrypts the full vault into a local binding, performs the one
/// operation, and lets the plaintext drop at scope end. Compromising the
/// long-lived in-memory state never exposes private keys.
///
/// Owned by the application's composition root and passed by reference;
/// there is no global instance.
pub struct Vault<S: VaultStore> {
    store: S,
    kdf_iterations: u32,
    unlocked: Option<Vec<AccountSummary>>,
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl<S: VaultStore> Vault<S> {
    /// A vault over the given store with the production KDF cost.
    pub fn new(store: S) -> Self {
        Self::with_kdf_iterations(store, safelog_crypto::VAULT_KDF_ITERATIONS)
    }

    /// A vault with an explicit KDF iteration count.
    ///
    /// Exists for tests; production vaults use [`Vault::new`].
    pub fn with_kdf_iterations(store: S, kdf_iterations: u32) -> Self {
        Self { store, kdf_iterations, unlocked: None }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> VaultState {
        if self.unlocked.is_some() {
            VaultState::Unlocked
        } else if self.store.exists() {
            VaultState::Locked
        } else {
            VaultState::Uninitialized
        }
    }

    /// Create the vault with one fresh account and unlock it.
    pub fn setup<R: RngCore + CryptoRng>(
        &mut self,
        name: &str,
        password: &str,
        rng: &mut R,
    ) -> Result<AccountSummary, VaultError> {
        if self.store.exists() {
            return Err(VaultError::AlreadyInitialized);
        }

        let account = Account::generate(name, now_millis(), rng)?;
        let summary = AccountSummary::of(&account, Some(&account.id));
        let data = VaultData {
            active_account_id: Some(account.id.clone()),
            accounts: vec![account],
        };

        self.persist(&data, password, rng)?;
        self.refresh_sanitized(&data);
        info!("vault created");
        Ok(summary)
    }

    /// Decrypt the stored vault and keep a sanitized copy in memory.
    ///
    /// On a wrong password the vault stays locked and reports
    /// [`VaultError::IncorrectPassword`] with no further detail.
    pub fn unlock(&mut self, password: &str) -> Result<(), VaultError> {
        let data = self.open(password)?;
        self.refresh_sanitized(&data);
        debug!(accounts = data.accounts.len(), "vault unlocked");
        Ok(())
    }

    /// Discard the in-memory state.
    pub fn lock(&mut self) {
        self.unlocked = None;
    }

    /// Sanitized account list. Requires an unlocked vault.
    pub fn accounts(&self) -> Result<&[AccountSummary], VaultError> {
        self.unlocked.as_deref().ok_or(VaultError::Locked)
    }

    /// The sanitized active account. Requires an unlocked vault.
    pub fn active_account(&self) -> Result<&AccountSummary, VaultError> {
        self.accounts()?
            .iter()
            .find(|a| a.is_active)
            .ok_or(VaultError::NoActiveAccount)
    }

    /// Sign a message with the active account's signing key.
    pub fn sign(&self, message: &[u8], password: &str) -> Result<Vec<u8>, VaultError> {
        self.require_unlocked()?;
        let data = self.open(password)?;
        let account = data.active_account().ok_or(VaultError::NoActiveAccount)?;
        let private = decode_key(&account.signing.private_key)?;

        let signature = match account.suite {
            Suite::PostQuantum => PqSigner.sign(message, &private)?,
            Suite::Classical => Ed25519Signer.sign(message, &private)?,
        };
        Ok(signature)
    }

    /// Decrypt a direct-encrypted payload with the active account's KEM key.
    pub fn decrypt(
        &self,
        ciphertext: &LegacyCiphertext,
        password: &str,
    ) -> Result<Vec<u8>, VaultError> {
        self.require_unlocked()?;
        let data = self.open(password)?;
        let account = data.active_account().ok_or(VaultError::NoActiveAccount)?;
        let private = decode_key(&account.kem.private_key)?;

        let plaintext = match account.suite {
            Suite::PostQuantum => keywrap::open_direct(&PqKem, ciphertext, &private)?,
            Suite::Classical => keywrap::open_direct(&EciesKem, ciphertext, &private)?,
        };
        Ok(plaintext)
    }

    /// Unwrap a session key with the active account's KEM key.
    pub fn unwrap_session_key(
        &self,
        wrapped: &WrappedKey,
        password: &str,
    ) -> Result<SessionKey, VaultError> {
        self.require_unlocked()?;
        let data = self.open(password)?;
        let account = data.active_account().ok_or(VaultError::NoActiveAccount)?;
        let private = decode_key(&account.kem.private_key)?;

        let key = match account.suite {
            Suite::PostQuantum => keywrap::unwrap(&PqKem, wrapped, &private)?,
            Suite::Classical => keywrap::unwrap(&EciesKem, wrapped, &private)?,
        };
        Ok(key)
    }

    /// Unwrap a batch of session keys, isolating per-item failures.
    pub fn unwrap_many_session_keys(
        &self,
        wrapped: &[WrappedKey],
        password: &str,
    ) -> Result<Vec<Option<SessionKey>>, VaultError> {
        self.require_unlocked()?;
        let data = self.open(password)?;
        let account = data.active_account().ok_or(VaultError::NoActiveAccount)?;
        let private = decode_key(&account.kem.private_key)?;

        Ok(match account.suite {
            Suite::PostQuantum => keywrap::unwrap_many(&PqKem, wrapped, &private),
            Suite::Classical => keywrap::unwrap_many(&EciesKem, wrapped, &private),
        })
    }

    /// Add a fresh post-quantum account.
    pub fn add_account<R: RngCore + CryptoRng>(
        &mut self,
        name: &str,
        password: &str,
        rng: &mut R,
    ) -> Result<AccountSummary, VaultError> {
        self.require_unlocked()?;
        let mut data = self.open(password)?;
        let account = Account::generate(name, now_millis(), rng)?;
        let summary = AccountSummary::of(&account, data.active_account_id.as_deref());
        data.accounts.push(account);

        self.persist(&data, password, rng)?;
        self.refresh_sanitized(&data);
        Ok(summary)
    }

    /// Make another account active.
    pub fn switch_account<R: RngCore + CryptoRng>(
        &mut self,
        id: &str,
        password: &str,
        rng: &mut R,
    ) -> Result<(), VaultError> {
        self.require_unlocked()?;
        let mut data = self.open(password)?;
        if !data.accounts.iter().any(|a| a.id == id) {
            return Err(VaultError::AccountNotFound(id.to_string()));
        }
        data.active_account_id = Some(id.to_string());

        self.persist(&data, password, rng)?;
        self.refresh_sanitized(&data);
        debug!(id, "active account switched");
        Ok(())
    }

    /// Delete an account.
    ///
    /// Refuses to remove the last account. Deleting the active account
    /// promotes another one.
    pub fn delete_account<R: RngCore + CryptoRng>(
        &mut self,
        id: &str,
        password: &str,
        rng: &mut R,
    ) -> Result<(), VaultError> {
        self.require_unlocked()?;
        let mut data = self.open(password)?;
        if !data.accounts.iter().any(|a| a.id == id) {
            return Err(VaultError::AccountNotFound(id.to_string()));
        }
        if data.accounts.len() <= 1 {
            return Err(VaultError::LastAccount);
        }

        data.accounts.retain(|a| a.id != id);
        if data.active_account_id.as_deref() == Some(id) {
            data.active_account_id = data.accounts.first().map(|a| a.id.clone());
        }

        self.persist(&data, password, rng)?;
        self.refresh_sanitized(&data);
        info!(id, "account deleted");
        Ok(())
    }

    /// Export the full vault as plaintext JSON.
    ///
    /// The result contains unencrypted private keys. Callers own the
    /// handling of that material from here.
    pub fn export(&self, password: &str) -> Result<String, VaultError> {
        self.require_unlocked()?;
        let data = self.open(password)?;
        serde_json::to_string_pretty(&data).map_err(|_| VaultError::MalformedPayload)
    }

    /// Import accounts from an exported vault, merging by id.
    ///
    /// An imported account with an existing id replaces it; others append.
    /// The merged vault is re-encrypted under `password`.
    pub fn import<R: RngCore + CryptoRng>(
        &mut self,
        exported_json: &str,
        password: &str,
        rng: &mut R,
    ) -> Result<usize, VaultError> {
        self.require_unlocked()?;
        let incoming: VaultData =
            serde_json::from_str(exported_json).map_err(|_| VaultError::MalformedPayload)?;
        let mut data = self.open(password)?;

        let mut merged = 0;
        for account in incoming.accounts {
            if let Some(existing) =
                data.accounts.iter_mut().find(|a| a.id == account.id)
            {
                *existing = account;
            } else {
                data.accounts.push(account);
            }
            merged += 1;
        }

        self.persist(&data, password, rng)?;
        self.refresh_sanitized(&data);
        info!(merged, "vault import complete");
        Ok(merged)
    }

    fn require_unlocked(&self) -> Result<(), VaultError> {
        if self.unlocked.is_none() {
            return Err(VaultError::Locked);
        }
        Ok(())
    }

    /// Decrypt the stored vault into a caller-local binding.
    fn open(&self, password: &str) -> Result<VaultData, VaultError> {
        let encrypted = match self.store.load()? {
            Some(encrypted) => encrypted,
            None => return Err(VaultError::Uninitialized),
        };
        decrypt_vault(&encrypted, password, self.kdf_iterations)
    }

    fn persist<R: RngCore + CryptoRng>(
        &mut self,
        data: &VaultData,
        password: &str,
        rng: &mut R,
    ) -> Result<(), VaultError> {
        let encrypted = encrypt_vault(data, password, self.kdf_iterations, rng)?;
        self.store.store(&encrypted)?;
        Ok(())
    }

    fn refresh_sanitized(&mut self, data: &VaultData) {
        let active = data.active_account_id.as_deref();
        self.unlocked =
            Some(data.accounts.iter().map(|a| AccountSummary::of(a, active)).collect());
    }
}

fn decode_key(hex_key: &str) -> Result<Vec<u8>, VaultError> {
    hex::decode(hex_key).map_err(|_| VaultError::MalformedPayload)
}
