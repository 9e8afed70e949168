//! Vault data model and at-rest encryption.

use rand::{CryptoRng, RngCore};
use safelog_crypto::{
    Ed25519Signer, EciesKem, PqKem, PqSigner, SALT_SIZE, SealedBox,
    derive_vault_key_with_iterations, open, seal,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VaultError;

/// A keypair as stored in the vault, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairHex {
    /// Public key, hex.
    pub public_key: String,
    /// Private key, hex. Plaintext only inside the decrypted vault.
    pub private_key: String,
}

impl KeyPairHex {
    fn from_pair(pair: &safelog_crypto::KeyPair) -> Self {
        Self { public_key: hex::encode(&pair.public), private_key: hex::encode(&pair.private) }
    }
}

/// Which primitive pair an account's keys belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suite {
    /// ML-KEM-768 + ML-DSA-44, locally generated.
    PostQuantum,
    /// X25519 + Ed25519, wallet-style key material.
    Classical,
}

/// One identity held by the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Random id assigned at generation.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Primitive suite the keys belong to.
    pub suite: Suite,
    /// KEM keypair.
    pub kem: KeyPairHex,
    /// Signature keypair.
    pub signing: KeyPairHex,
    /// Creation time, Unix milliseconds.
    pub created_at: u64,
}

impl Account {
    /// Generate a fresh post-quantum account.
    pub fn generate<R: RngCore + CryptoRng>(
        name: impl Into<String>,
        created_at: u64,
        rng: &mut R,
    ) -> Result<Self, VaultError> {
        let kem = PqKem::generate_keypair(rng);
        let signing = PqSigner::generate_keypair(rng)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            suite: Suite::PostQuantum,
            kem: KeyPairHex::from_pair(&kem),
            signing: KeyPairHex::from_pair(&signing),
            created_at,
        })
    }

    /// Generate a fresh classical account.
    pub fn generate_classical<R: RngCore + CryptoRng>(
        name: impl Into<String>,
        created_at: u64,
        rng: &mut R,
    ) -> Self {
        let kem = EciesKem::generate_keypair(rng);
        let signing = Ed25519Signer::generate_keypair(rng);
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            suite: Suite::Classical,
            kem: KeyPairHex::from_pair(&kem),
            signing: KeyPairHex::from_pair(&signing),
            created_at,
        }
    }
}

/// The plaintext vault contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultData {
    /// All held accounts.
    pub accounts: Vec<Account>,
    /// The currently selected account.
    pub active_account_id: Option<String>,
}

impl VaultData {
    /// The active account, if one is selected.
    pub fn active_account(&self) -> Option<&Account> {
        let id = self.active_account_id.as_deref()?;
        self.accounts.iter().find(|a| a.id == id)
    }
}

/// The at-rest encoding of [`VaultData`]. All fields hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedVault {
    /// KDF salt.
    pub salt: String,
    /// AEAD nonce.
    pub nonce: String,
    /// AEAD ciphertext of the JSON-encoded vault data.
    pub ciphertext: String,
}

/// Public-keys-only view of an account, safe to hold while unlocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    /// Account id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Primitive suite.
    pub suite: Suite,
    /// KEM public key, hex.
    pub kem_public_key: String,
    /// Signature public key, hex.
    pub signature_public_key: String,
    /// Whether this is the active account.
    pub is_active: bool,
    /// Creation time, Unix milliseconds.
    pub created_at: u64,
}

impl AccountSummary {
    /// Sanitize one account.
    pub fn of(account: &Account, active_id: Option<&str>) -> Self {
        Self {
            id: account.id.clone(),
            name: account.name.clone(),
            suite: account.suite,
            kem_public_key: account.kem.public_key.clone(),
            signature_public_key: account.signing.public_key.clone(),
            is_active: Some(account.id.as_str()) == active_id,
            created_at: account.created_at,
        }
    }
}

/// Encrypt vault contents under a password-derived key.
pub fn encrypt_vault<R: RngCore + CryptoRng>(
    data: &VaultData,
    password: &str,
    kdf_iterations: u32,
    rng: &mut R,
) -> Result<EncryptedVault, VaultError> {
    let plaintext = serde_json::to_vec(data).map_err(|_| VaultError::MalformedPayload)?;

    let mut salt = [0u8; SALT_SIZE];
    rng.fill_bytes(&mut salt);
    let key = derive_vault_key_with_iterations(password, &salt, kdf_iterations);
    let sealed = seal(&plaintext, &key, rng);

    Ok(EncryptedVault {
        salt: hex::encode(salt),
        nonce: sealed.nonce,
        ciphertext: sealed.ciphertext,
    })
}

/// Decrypt an at-rest vault.
///
/// A wrong password and a corrupted store are indistinguishable here; both
/// fail the AEAD tag and surface as [`VaultError::IncorrectPassword`].
pub fn decrypt_vault(
    encrypted: &EncryptedVault,
    password: &str,
    kdf_iterations: u32,
) -> Result<VaultData, VaultError> {
    let salt = hex::decode(&encrypted.salt).map_err(|_| VaultError::MalformedPayload)?;
    let key = derive_vault_key_with_iterations(password, &salt, kdf_iterations);

    let sealed = SealedBox {
        nonce: encrypted.nonce.clone(),
        ciphertext: encrypted.ciphertext.clone(),
    };
    let plaintext = open(&sealed, &key).map_err(|_| VaultError::IncorrectPassword)?;

    serde_json::from_slice(&plaintext).map_err(|_| VaultError::MalformedPayload)
}
