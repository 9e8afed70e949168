//! N-of-N multisig release protocol.
//!
//! A [`Workflow`] gates a secret behind every registered signer's
//! signature. The signature that completes the set also performs the
//! release: the signer re-encrypts the agreed plaintext for every
//! recipient through the direct key-wrap path and the workflow flips to
//! completed in the same call.
//!
//! The release is all-or-nothing. Recipient ciphertexts are staged into a
//! local buffer before any state changes; a failure for one recipient
//! aborts the whole sign call, the triggering signature included, and the
//! signer retries once the recipient's key material is fixed. A workflow is
//! single-writer, so the completion check runs against post-insert state
//! and two near-simultaneous final signers cannot both release.

use rand::{CryptoRng, RngCore};
use safelog_crypto::{KeyEncapsulation, SignatureScheme};
use safelog_proto::{Address, LegacyCiphertext};
use tracing::{debug, info};

use crate::error::MultisigError;
use crate::keywrap;

/// One registered signer and their recorded signature.
#[derive(Debug, Clone)]
pub struct Signer {
    /// Signer address.
    pub address: Address,
    /// Hex signature over the canonical content, once signed.
    pub signature: Option<String>,
}

impl Signer {
    /// Whether this signer has signed.
    pub fn has_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// One release recipient.
#[derive(Debug, Clone)]
pub struct Recipient {
    /// Recipient address.
    pub address: Address,
    /// KEM public key to release against, hex.
    pub kem_public_key: Option<String>,
    /// The released ciphertext; absent until the workflow completes,
    /// immutable afterwards.
    pub encrypted_key: Option<LegacyCiphertext>,
}

/// Workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Waiting on at least one signature.
    Pending,
    /// Every signer signed and the release fan-out succeeded.
    Completed,
}

/// An N-of-N signature-gated release.
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Workflow id.
    pub id: String,
    /// Creator address.
    pub owner: Address,
    /// The secret record this workflow gates.
    pub secret_id: String,
    signers: Vec<Signer>,
    recipients: Vec<Recipient>,
    status: Status,
}

impl Workflow {
    /// A pending workflow over the given signers and recipients.
    pub fn new(
        id: impl Into<String>,
        owner: Address,
        secret_id: impl Into<String>,
        signers: impl IntoIterator<Item = Address>,
        recipients: impl IntoIterator<Item = (Address, Option<String>)>,
    ) -> Self {
        Self {
            id: id.into(),
            owner,
            secret_id: secret_id.into(),
            signers: signers
                .into_iter()
                .map(|address| Signer { address, signature: None })
                .collect(),
            recipients: recipients
                .into_iter()
                .map(|(address, kem_public_key)| Recipient {
                    address,
                    kem_public_key,
                    encrypted_key: None,
                })
                .collect(),
            status: Status::Pending,
        }
    }

    /// Current status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Registered signers.
    pub fn signers(&self) -> &[Signer] {
        &self.signers
    }

    /// Release recipients.
    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    /// Replace a recipient's KEM public key before completion.
    ///
    /// Used to retry a release that failed on bad recipient key material.
    pub fn set_recipient_key(
        &mut self,
        address: &Address,
        kem_public_key: String,
    ) -> Result<(), MultisigError> {
        if self.status == Status::Completed {
            return Err(MultisigError::Completed);
        }
        for recipient in &mut self.recipients {
            if &recipient.address == address {
                recipient.kem_public_key = Some(kem_public_key);
                return Ok(());
            }
        }
        Err(MultisigError::PartialReleaseRejected { address: address.clone() })
    }

    /// Record a signature; the final one also performs the release.
    ///
    /// `plaintext` is the content the signer decrypted and signed; the
    /// final call re-encrypts it per recipient. On a release failure
    /// nothing is mutated, the signature included.
    pub fn sign<K: KeyEncapsulation, R: RngCore + CryptoRng>(
        &mut self,
        kem: &K,
        signer_address: &Address,
        signature: String,
        plaintext: &[u8],
        rng: &mut R,
    ) -> Result<Status, MultisigError> {
        if self.status == Status::Completed {
            return Err(MultisigError::Completed);
        }
        let index = self
            .signers
            .iter()
            .position(|s| &s.address == signer_address)
            .ok_or_else(|| MultisigError::UnknownSigner(signer_address.clone()))?;
        if self.signers[index].has_signed() {
            return Err(MultisigError::AlreadySigned(signer_address.clone()));
        }

        let is_final = self.signers.iter().enumerate().all(|(i, s)| i == index || s.has_signed());
        if !is_final {
            self.signers[index].signature = Some(signature);
            debug!(workflow = self.id, signer = %signer_address, "signature recorded");
            return Ok(Status::Pending);
        }

        // Stage the full release before touching any state.
        let mut staged: Vec<LegacyCiphertext> = Vec::with_capacity(self.recipients.len());
        for recipient in &self.recipients {
            let Some(public) = recipient.kem_public_key.as_deref() else {
                return Err(MultisigError::PartialReleaseRejected {
                    address: recipient.address.clone(),
                });
            };
            match keywrap::seal_direct(kem, plaintext, public, rng) {
                Ok(ciphertext) => staged.push(ciphertext),
                Err(_) => {
                    return Err(MultisigError::PartialReleaseRejected {
                        address: recipient.address.clone(),
                    });
                }
            }
        }

        self.signers[index].signature = Some(signature);
        for (recipient, ciphertext) in self.recipients.iter_mut().zip(staged) {
            recipient.encrypted_key = Some(ciphertext);
        }
        self.status = Status::Completed;
        info!(
            workflow = self.id,
            signer = %signer_address,
            recipients = self.recipients.len(),
            "workflow completed, keys released"
        );
        Ok(Status::Completed)
    }
}

/// Canonical serialization of signed content.
///
/// JSON content is parsed and re-serialized compactly so whitespace and
/// formatting drift between the creator's copy and a signer's re-derived
/// copy cannot break verification. Non-JSON content is signed as-is.
pub fn canonicalize(content: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(value) => value.to_string(),
        Err(_) => content.to_string(),
    }
}

/// Verify a recorded signature against the canonical content.
pub fn verify_signer<S: SignatureScheme>(
    scheme: &S,
    signer: &Signer,
    content: &str,
    signature_public_key_hex: &str,
) -> Result<bool, MultisigError> {
    let Some(signature_hex) = signer.signature.as_deref() else {
        return Ok(false);
    };
    let Ok(signature) = hex::decode(signature_hex) else {
        return Ok(false);
    };
    let Ok(public) = hex::decode(signature_public_key_hex) else {
        return Ok(false);
    };
    Ok(scheme.verify(canonicalize(content).as_bytes(), &signature, &public)?)
}
