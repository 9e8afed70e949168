//! Envelope-encrypted secret records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::envelope::WrappedKey;

/// An envelope-encrypted secret as stored by the backend.
///
/// One random content key seals the payload; the content key is wrapped
/// once per grantee through the direct key-wrap path. Secrets are not
/// conversational, so no session id is involved. `encrypted_data` holds a
/// JSON-encoded sealed box; the backend treats it as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    /// Record id assigned by the backend.
    pub id: String,
    /// JSON-encoded `SealedBox` of the secret payload under the content key.
    pub encrypted_data: String,
    /// Content key wrapped for each grantee, keyed by normalized address.
    pub encrypted_key_per_grantee: BTreeMap<Address, WrappedKey>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trips_with_grantee_map() {
        let mut grantees = BTreeMap::new();
        grantees.insert(
            Address::new("Alice"),
            WrappedKey { kem: "00".into(), nonce: "11".into(), ct: "22".into() },
        );
        let record = SecretRecord {
            id: "sec-1".into(),
            encrypted_data: r#"{"nonce":"aa","ciphertext":"bb"}"#.into(),
            encrypted_key_per_grantee: grantees,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"alice\""));
        let back: SecretRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
