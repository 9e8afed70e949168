//! Protocol errors.

use safelog_crypto::CryptoError;
use safelog_proto::{Address, ProtoError};
use thiserror::Error;

/// Errors from the session and key-wrap layers.
///
/// [`SessionError::KeyNotFound`] is recoverable: the envelope may be
/// decryptable later, once key material arrives in another message. Callers
/// that render conversations should treat it as a deferred state, not a
/// failure. All other variants are hard failures for the message at hand.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No wrapped key addressed to this party and no cached session key.
    #[error("no session key available for this party")]
    KeyNotFound,

    /// The wrap target has no published KEM public key.
    #[error("{0} has no KEM public key")]
    MissingPublicKey(Address),

    /// A KEM or AEAD operation failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The transport content could not be decoded.
    #[error(transparent)]
    Proto(#[from] ProtoError),
}

/// Errors from the multisig release protocol.
#[derive(Debug, Error)]
pub enum MultisigError {
    /// The caller is not a registered signer of this workflow.
    #[error("{0} is not a signer of this workflow")]
    UnknownSigner(Address),

    /// The caller already signed.
    #[error("{0} has already signed")]
    AlreadySigned(Address),

    /// The workflow already completed; signatures are immutable.
    #[error("workflow is already completed")]
    Completed,

    /// The final-signer release failed for at least one recipient, so the
    /// whole sign call was rolled back.
    #[error("release failed for recipient {address}; no state was changed")]
    PartialReleaseRejected {
        /// The recipient whose key wrap failed.
        address: Address,
    },

    /// A KEM or AEAD operation failed outside the release fan-out.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
