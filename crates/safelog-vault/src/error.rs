//! Vault and custody-service errors.

use safelog_crypto::CryptoError;
use thiserror::Error;

/// A storage backend failure.
#[derive(Debug, Error)]
#[error("vault store failure: {0}")]
pub struct StoreError(pub String);

/// Errors from the vault state machine and its operations.
///
/// Vault errors always propagate to the caller; they gate access to every
/// other operation and are never silently swallowed.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No vault exists yet; run setup first.
    #[error("vault is not initialized")]
    Uninitialized,

    /// A vault already exists; setup refuses to overwrite it.
    #[error("vault is already initialized")]
    AlreadyInitialized,

    /// The operation needs an unlocked vault.
    #[error("vault is locked")]
    Locked,

    /// Decryption failed. A wrong password and a corrupted store are
    /// indistinguishable.
    #[error("incorrect password")]
    IncorrectPassword,

    /// No account with the requested id.
    #[error("no account with id {0}")]
    AccountNotFound(String),

    /// The last remaining account cannot be deleted.
    #[error("cannot delete the last account")]
    LastAccount,

    /// No active account is selected.
    #[error("no active account")]
    NoActiveAccount,

    /// The vault payload failed to encode or decode.
    #[error("malformed vault payload")]
    MalformedPayload,

    /// Storage backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A crypto operation outside vault decryption failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A key-wrap or direct-decryption operation failed.
    #[error(transparent)]
    Session(#[from] safelog_core::SessionError),
}

/// Errors from the custody service around the vault.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The origin has not been approved via connect.
    #[error("origin {0} is not connected")]
    PermissionDenied(String),

    /// The approval was rejected, or its requester went away.
    #[error("request rejected")]
    Rejected,

    /// No pending request with that id.
    #[error("unknown request id {0}")]
    UnknownRequest(String),

    /// No cached session password; the user must unlock.
    #[error("no active session")]
    NoSession,

    /// The underlying vault operation failed.
    #[error(transparent)]
    Vault(#[from] VaultError),
}
