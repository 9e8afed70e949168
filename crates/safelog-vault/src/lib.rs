//! Password-encrypted key custody for safelog accounts.
//!
//! The crate has two layers. [`Vault`] is the storage core: a multi-account
//! keystore sealed under a password-derived key, persisted through a
//! [`VaultStore`]. [`CustodyService`] sits in front of it and mediates
//! access for external origins: every privileged operation parks as a
//! pending request until a human approves or rejects it.
//!
//! Private keys never live in long-running state. The vault holds only a
//! sanitized account listing while unlocked; each signing or decryption
//! call re-derives the vault key from the password, does its one operation,
//! and drops the plaintext.

#![forbid(unsafe_code)]

mod account;
mod error;
mod service;
mod store;
mod vault;

pub use account::{Account, AccountSummary, EncryptedVault, KeyPairHex, Suite, VaultData};
pub use error::{ServiceError, StoreError, VaultError};
pub use service::{
    CustodyService, PendingDescriptor, Request, Response, SESSION_TTL, Ticket,
};
pub use store::{MemoryVaultStore, VaultStore};
pub use vault::{Vault, VaultState};
