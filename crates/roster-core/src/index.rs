//! Index maintenance: the per-type summary lists and the replicated
//! credential locations. Projections are created and destroyed in
//! lockstep with the canonical record; because the store has no
//! transactions, brief divergence windows are tolerated and the read
//! path is defined to mask them.

use crate::{
    error::{Error, VerificationMismatch},
    keyspace,
    model::{credential::CredentialRecord, entity::EntityRecord, summary::SummaryEntry},
    obs::sink::{self, MetricsEvent},
    serialize::{deserialize, serialize},
    types::{EntityId, EntityType},
};
use roster_store::KeyValueStore;

///
/// IndexSynchronizer
///

pub struct IndexSynchronizer<'a, S> {
    store: &'a S,
}

impl<'a, S: KeyValueStore> IndexSynchronizer<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    // ─────────────────────────────────────────────
    // Summary list
    // ─────────────────────────────────────────────

    /// Load a per-type summary list; absent means empty.
    pub fn load_list(&self, entity_type: EntityType) -> Result<Vec<SummaryEntry>, Error> {
        let key = keyspace::list(entity_type);
        match self.store.get(&key)? {
            Some(bytes) => Ok(deserialize(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    fn store_list(&self, entity_type: EntityType, list: Vec<SummaryEntry>) -> Result<(), Error> {
        let key = keyspace::list(entity_type);
        self.store.set(&key, serialize(&list)?)?;

        Ok(())
    }

    /// Insert or replace the entity's summary entry in its type's list.
    pub fn upsert_entry(&self, entity: &EntityRecord) -> Result<(), Error> {
        let mut list = self.load_list(entity.entity_type)?;
        let before = list.len();
        list.retain(|entry| entry.id != entity.id);
        let removed = u64::try_from(before - list.len()).unwrap_or(u64::MAX);
        list.push(entity.summary());
        self.store_list(entity.entity_type, list)?;

        sink::record(MetricsEvent::SummaryDelta {
            inserts: 1,
            removes: removed,
        });

        Ok(())
    }

    /// Remove the entity's summary entry. Returns whether one was present.
    pub fn remove_entry(&self, entity_type: EntityType, id: EntityId) -> Result<bool, Error> {
        let mut list = self.load_list(entity_type)?;
        let before = list.len();
        list.retain(|entry| entry.id != id);
        if list.len() == before {
            return Ok(false);
        }
        let removed = u64::try_from(before - list.len()).unwrap_or(u64::MAX);
        self.store_list(entity_type, list)?;

        sink::record(MetricsEvent::SummaryDelta {
            inserts: 0,
            removes: removed,
        });

        Ok(true)
    }

    // ─────────────────────────────────────────────
    // Credential replication
    // ─────────────────────────────────────────────

    /// Populate every projection for a freshly created entity: summary
    /// entry plus all credential locations. Fail-fast; the caller owns
    /// cleanup of any partial state.
    pub fn create_projections(&self, entity: &EntityRecord) -> Result<(), Error> {
        self.upsert_entry(entity)?;
        self.write_credential_locations(entity)
    }

    /// Fan a changed credential out to every redundant location:
    /// canonical record, credential-by-id, credential-by-email, and the
    /// password shortcut cache. Succeeds only if all writes succeeded;
    /// a partial write is surfaced as divergence, not retried; the read
    /// path prefers the freshest copy until the next successful fan-out.
    pub fn propagate_credential_change(&self, entity: &EntityRecord) -> Result<(), Error> {
        let canonical = (keyspace::entity(entity.id), serialize(entity)?);
        let credential = entity.credential();
        let credential_bytes = serialize(&credential)?;
        let cache_bytes = serialize(&credential.password)?;

        let targets = [
            canonical,
            (keyspace::credential(entity.id), credential_bytes.clone()),
            (keyspace::credential_email(&entity.email), credential_bytes),
            (keyspace::password_cache(entity.id), cache_bytes),
        ];

        let mut failed = Vec::new();
        let mut writes = 0u64;
        for (key, bytes) in targets {
            if self.store.set(&key, bytes).is_ok() {
                writes += 1;
            } else {
                failed.push(key);
            }
        }

        sink::record(MetricsEvent::CredentialFanout {
            writes,
            failures: u64::try_from(failed.len()).unwrap_or(u64::MAX),
        });

        if failed.is_empty() {
            Ok(())
        } else {
            Err(VerificationMismatch {
                id: entity.id,
                locations: failed,
            }
            .into())
        }
    }

    fn write_credential_locations(&self, entity: &EntityRecord) -> Result<(), Error> {
        let credential = entity.credential();
        let bytes = serialize(&credential)?;

        self.store.set(&keyspace::credential(entity.id), bytes.clone())?;
        self.store
            .set(&keyspace::credential_email(&entity.email), bytes)?;
        self.store.set(
            &keyspace::password_cache(entity.id),
            serialize(&credential.password)?,
        )?;

        sink::record(MetricsEvent::CredentialFanout {
            writes: 3,
            failures: 0,
        });

        Ok(())
    }

    // ─────────────────────────────────────────────
    // Read path
    // ─────────────────────────────────────────────

    /// Credential projection by id.
    pub fn credential_by_id(&self, id: EntityId) -> Result<Option<CredentialRecord>, Error> {
        match self.store.get(&keyspace::credential(id))? {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Credential lookup by normalized email. Consults the email copy,
    /// cross-reads the id copy, and returns the freshest of the two so a
    /// partially propagated change never surfaces an older password than
    /// the canonical one for long.
    pub fn credential_by_email(&self, email: &str) -> Result<Option<CredentialRecord>, Error> {
        let by_email = match self.store.get(&keyspace::credential_email(email))? {
            Some(bytes) => Some(deserialize::<CredentialRecord>(&bytes)?),
            None => None,
        };

        let Some(by_email) = by_email else {
            // Email copy missing (e.g. a failed fan-out): fall back to the
            // canonical route via the summary lists.
            return self.credential_via_summary(email);
        };

        match self.credential_by_id(by_email.id)? {
            Some(by_id) => Ok(Some(by_email.freshest(by_id))),
            None => Ok(Some(by_email)),
        }
    }

    fn credential_via_summary(&self, email: &str) -> Result<Option<CredentialRecord>, Error> {
        for entity_type in EntityType::ALL {
            let list = self.load_list(entity_type)?;
            if let Some(entry) = list.iter().find(|entry| entry.matches_email(email)) {
                return self.credential_by_id(entry.id);
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{credential::PasswordHash, status::Status};
    use roster_store::{FaultKind, FaultRule, FaultStore, MemoryStore};
    use std::collections::BTreeMap;

    fn record(n: u64, email: &str, name: &str) -> EntityRecord {
        EntityRecord {
            id: EntityId::from_parts(n, u128::from(n)),
            entity_type: EntityType::Company,
            name: name.to_string(),
            email: email.to_string(),
            status: Status::Pending,
            password: PasswordHash::with_salt("first-password", "salt"),
            correlation_id: None,
            profile: BTreeMap::new(),
            created_at_ms: n,
            updated_at_ms: n,
        }
    }

    #[test]
    fn upsert_is_idempotent_per_id() {
        let store = MemoryStore::new();
        let index = IndexSynchronizer::new(&store);
        let entity = record(1, "a@x.com", "Acme");

        index.upsert_entry(&entity).unwrap();
        index.upsert_entry(&entity).unwrap();

        let list = index.load_list(EntityType::Company).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, entity.id);
    }

    #[test]
    fn remove_entry_reports_presence() {
        let store = MemoryStore::new();
        let index = IndexSynchronizer::new(&store);
        let entity = record(1, "a@x.com", "Acme");

        index.upsert_entry(&entity).unwrap();
        assert!(index.remove_entry(EntityType::Company, entity.id).unwrap());
        assert!(!index.remove_entry(EntityType::Company, entity.id).unwrap());
        assert!(index.load_list(EntityType::Company).unwrap().is_empty());
    }

    #[test]
    fn projections_land_in_all_credential_locations() {
        let store = MemoryStore::new();
        let index = IndexSynchronizer::new(&store);
        let entity = record(2, "b@x.com", "Beta");

        index.create_projections(&entity).unwrap();

        assert!(store.get(&keyspace::credential(entity.id)).unwrap().is_some());
        assert!(store
            .get(&keyspace::credential_email("b@x.com"))
            .unwrap()
            .is_some());
        assert!(store
            .get(&keyspace::password_cache(entity.id))
            .unwrap()
            .is_some());
    }

    #[test]
    fn fanout_reaches_both_lookup_routes() {
        let store = MemoryStore::new();
        let index = IndexSynchronizer::new(&store);
        let mut entity = record(3, "c@x.com", "Gamma");
        index.create_projections(&entity).unwrap();

        entity.set_password(PasswordHash::with_salt("second-password", "salt"), 9_000);
        index.propagate_credential_change(&entity).unwrap();

        let by_id = index.credential_by_id(entity.id).unwrap().unwrap();
        let by_email = index.credential_by_email("c@x.com").unwrap().unwrap();

        assert!(by_id.password.verify("second-password"));
        assert!(by_email.password.verify("second-password"));
    }

    #[test]
    fn partial_fanout_surfaces_divergence_and_read_path_masks_it() {
        let store = FaultStore::new(MemoryStore::new());
        let index = IndexSynchronizer::new(&store);
        let mut entity = record(4, "d@x.com", "Delta");
        index.create_projections(&entity).unwrap();

        // The email copy write fails; id copy and canonical get the change.
        store.push_rule(FaultRule::new("credential_email:", FaultKind::Unavailable));
        entity.set_password(PasswordHash::with_salt("rotated-password", "salt"), 9_000);

        let err = index.propagate_credential_change(&entity).unwrap_err();
        match err {
            Error::Mismatch(mismatch) => {
                assert_eq!(mismatch.locations, vec![keyspace::credential_email("d@x.com")]);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }

        // Stale email copy, fresh id copy: the reader prefers the fresh one.
        let seen = index.credential_by_email("d@x.com").unwrap().unwrap();
        assert!(seen.password.verify("rotated-password"));
    }

    #[test]
    fn email_lookup_falls_back_through_the_summary_list() {
        let store = MemoryStore::new();
        let index = IndexSynchronizer::new(&store);
        let entity = record(5, "e@x.com", "Epsilon");
        index.create_projections(&entity).unwrap();

        // Simulate a lost email copy.
        store.delete(&keyspace::credential_email("e@x.com")).unwrap();

        let seen = index.credential_by_email("e@x.com").unwrap().unwrap();
        assert_eq!(seen.id, entity.id);
    }
}
