use crate::types::{EntityId, EntityType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ulid::Ulid;

///
/// PasswordHash
///
/// Salted sha2 digest. Raw passwords are hashed at the boundary and never
/// stored or compared in cleartext anywhere in the runtime.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PasswordHash {
    salt: String,
    digest: String,
}

impl PasswordHash {
    /// Hash a raw password under a fresh random salt.
    #[must_use]
    pub fn new(password: &str) -> Self {
        // A ULID is 80 bits of randomness plus a timestamp; ample as a
        // per-credential salt without pulling in a second entropy source.
        let salt = hex(&Ulid::new().to_bytes());

        Self::with_salt(password, &salt)
    }

    /// Hash under a known salt. Fixtures and re-verification only.
    #[must_use]
    pub fn with_salt(password: &str, salt: &str) -> Self {
        Self {
            salt: salt.to_string(),
            digest: digest_hex(salt, password),
        }
    }

    /// Compare a submitted password against this hash.
    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        // Recompute under our salt; digests are fixed-length hex, so a
        // plain equality check does not leak length information.
        digest_hex(&self.salt, password) == self.digest
    }
}

fn digest_hex(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());

    hex(&hasher.finalize())
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

///
/// CredentialRecord
///
/// Login-lookup projection of a canonical record, replicated under both
/// the id key and the email key. `updated_at_ms` breaks ties between
/// copies: readers prefer the freshest one.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CredentialRecord {
    pub id: EntityId,
    pub email: String,
    pub password: PasswordHash,
    pub role: EntityType,
    pub is_active: bool,
    pub updated_at_ms: u64,
}

impl CredentialRecord {
    /// The fresher of two copies; `self` wins ties.
    #[must_use]
    pub fn freshest(self, other: Self) -> Self {
        if other.updated_at_ms > self.updated_at_ms {
            other
        } else {
            self
        }
    }
}
