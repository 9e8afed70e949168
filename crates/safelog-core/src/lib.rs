//! Protocol core: session-key lifecycle, key wrapping, secret envelopes and
//! the multisig release workflow.
//!
//! Everything is generic over [`safelog_crypto::KeyEncapsulation`], so
//! wallet-bound classical identities and locally generated post-quantum
//! identities run the same protocol code. State lives in plain structs
//! owned by the caller; there are no globals and no interior mutability,
//! matching the single-writer concurrency model of the clients that embed
//! this crate.

#![forbid(unsafe_code)]

mod directory;
mod error;
pub mod keywrap;
mod multisig;
pub mod secret;
mod session;

pub use directory::{Directory, MemoryDirectory};
pub use error::{MultisigError, SessionError};
pub use keywrap::{SESSION_KEY_SIZE, SessionKey, unwrap, unwrap_many, wrap};
pub use multisig::{Recipient, Signer, Status, Workflow, canonicalize, verify_signer};
pub use session::{Decrypted, IncomingMessage, Messenger, PeerId};
