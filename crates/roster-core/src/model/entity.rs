use crate::{
    model::{
        credential::{CredentialRecord, PasswordHash},
        status::Status,
        summary::SummaryEntry,
    },
    types::{EntityId, EntityType},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// EntityRecord
///
/// The canonical document for one account. Owned exclusively by whichever
/// coordinator last wrote it; projections are derived, never edited in
/// place by other components.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub entity_type: EntityType,
    /// Display name, trimmed, original casing.
    pub name: String,
    /// Normalized email.
    pub email: String,
    pub status: Status,
    pub password: PasswordHash,
    /// External correlation id (e.g. a payment session) recorded at
    /// creation; drives idempotent replay.
    pub correlation_id: Option<String>,
    /// Free-form profile attributes (bio, location, categories, ...).
    pub profile: BTreeMap<String, String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl EntityRecord {
    /// Projection stored in the per-type summary list.
    #[must_use]
    pub fn summary(&self) -> SummaryEntry {
        SummaryEntry {
            id: self.id,
            entity_type: self.entity_type,
            name: self.name.clone(),
            email: self.email.clone(),
            status: self.status,
        }
    }

    /// Projection stored in the login-lookup locations.
    #[must_use]
    pub fn credential(&self) -> CredentialRecord {
        CredentialRecord {
            id: self.id,
            email: self.email.clone(),
            password: self.password.clone(),
            role: self.entity_type,
            is_active: self.status.is_active(),
            updated_at_ms: self.updated_at_ms,
        }
    }

    /// Apply a status transition, refreshing the update timestamp.
    pub fn set_status(&mut self, status: Status, now_ms: u64) {
        self.status = status;
        self.updated_at_ms = now_ms;
    }

    /// Replace the password hash, refreshing the update timestamp.
    pub fn set_password(&mut self, password: PasswordHash, now_ms: u64) {
        self.password = password;
        self.updated_at_ms = now_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> EntityRecord {
        EntityRecord {
            id: EntityId::from_parts(7, 7),
            entity_type: EntityType::Company,
            name: "Acme Media".to_string(),
            email: "acme@x.com".to_string(),
            status: Status::Pending,
            password: PasswordHash::with_salt("secret-secret", "s"),
            correlation_id: Some("sess_1".to_string()),
            profile: BTreeMap::new(),
            created_at_ms: 1_000,
            updated_at_ms: 1_000,
        }
    }

    #[test]
    fn summary_reflects_the_record() {
        let record = record();
        let summary = record.summary();

        assert_eq!(summary.id, record.id);
        assert_eq!(summary.name, "Acme Media");
        assert_eq!(summary.email, "acme@x.com");
        assert_eq!(summary.status, Status::Pending);
    }

    #[test]
    fn credential_activity_follows_status() {
        let mut record = record();
        assert!(!record.credential().is_active);

        record.set_status(Status::Approved, 2_000);
        let credential = record.credential();

        assert!(credential.is_active);
        assert_eq!(credential.updated_at_ms, 2_000);
        assert_eq!(credential.role, EntityType::Company);
    }

    #[test]
    fn set_password_touches_timestamp() {
        let mut record = record();
        record.set_password(PasswordHash::with_salt("next-secret", "s"), 3_000);

        assert_eq!(record.updated_at_ms, 3_000);
        assert!(record.password.verify("next-secret"));
    }
}
