//! Wire decoding errors.

use thiserror::Error;

/// Errors produced while decoding wire payloads.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtoError {
    /// The envelope declared a version this implementation does not speak.
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u64),

    /// The payload is not valid JSON or has the wrong shape for its version.
    #[error("malformed payload: {context}")]
    Malformed {
        /// What was being decoded when the shape check failed.
        context: &'static str,
    },
}
