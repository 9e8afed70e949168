//! Vault storage backends.

use crate::account::EncryptedVault;
use crate::error::StoreError;

/// At-rest storage for the encrypted vault.
///
/// Implementations persist one [`EncryptedVault`] blob; they never see
/// plaintext. The production backend wraps whatever durable storage the
/// host provides; [`MemoryVaultStore`] serves tests.
pub trait VaultStore {
    /// Load the stored vault, `None` if nothing was ever stored.
    fn load(&self) -> Result<Option<EncryptedVault>, StoreError>;

    /// Store the vault, replacing any existing blob.
    fn store(&mut self, vault: &EncryptedVault) -> Result<(), StoreError>;

    /// Whether a vault blob exists.
    fn exists(&self) -> bool;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryVaultStore {
    vault: Option<EncryptedVault>,
}

impl MemoryVaultStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl VaultStore for MemoryVaultStore {
    fn load(&self) -> Result<Option<EncryptedVault>, StoreError> {
        Ok(self.vault.clone())
    }

    fn store(&mut self, vault: &EncryptedVault) -> Result<(), StoreError> {
        self.vault = Some(vault.clone());
        Ok(())
    }

    fn exists(&self) -> bool {
        self.vault.is_some()
    }
}
