//! The caller-facing handle. `Registry` composes the coordinators over
//! one store, clock, config, and notification sink; the marketplace glue
//! talks only to this surface.

use crate::{
    clock::Clock,
    config::RegistryConfig,
    deletion::{DeletionCoordinator, DeletionReport},
    error::Error,
    index::IndexSynchronizer,
    keyspace,
    model::{credential::PasswordHash, entity::EntityRecord, status::Status, summary::SummaryEntry},
    notify::{self, Notification, NotificationSink},
    obs::{self, MetricsReport},
    registration::{Candidate, Registered, RegistrationCoordinator},
    sanitize::normalize_email,
    serialize::{deserialize, serialize},
    types::{EntityId, EntityType},
    validate::validate_password,
    verify::{ComplianceReport, VerificationProbe},
};
use roster_store::{KeyValueStore, RetryStore};

///
/// Registry
///
/// One per process lifetime. No global state: store, clock, config, and
/// sink are explicit dependencies so tests substitute fakes freely.
///

pub struct Registry<S, C, N> {
    store: S,
    clock: C,
    config: RegistryConfig,
    sink: N,
    debug: bool,
}

impl<S, C, N> Registry<S, C, N>
where
    S: KeyValueStore,
    C: Clock,
    N: NotificationSink,
{
    #[must_use]
    pub const fn new(store: S, clock: C, config: RegistryConfig, sink: N) -> Self {
        Self {
            store,
            clock,
            config,
            sink,
            debug: false,
        }
    }

    /// Enable `[debug]` logging on the coordinators.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Wrap the store in the bounded-retry layer so transient faults are
    /// retried `store_retry_attempts` times before surfacing.
    #[must_use]
    pub fn with_retries(
        store: S,
        clock: C,
        config: RegistryConfig,
        sink: N,
    ) -> Registry<RetryStore<S>, C, N> {
        Registry::new(
            RetryStore::new(store, config.store_retry_attempts),
            clock,
            config,
            sink,
        )
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    // ─────────────────────────────────────────────
    // Protocol surface
    // ─────────────────────────────────────────────

    /// Idempotent account creation.
    pub fn register(&self, candidate: Candidate) -> Result<Registered, Error> {
        RegistrationCoordinator::new(&self.store, &self.clock, self.config, &self.sink, self.debug)
            .register(candidate)
    }

    /// Cascading, best-effort deletion with a structured report.
    pub fn delete_entity(&self, id: EntityId) -> Result<DeletionReport, Error> {
        DeletionCoordinator::new(&self.store, &self.clock, self.config, &self.sink, self.debug)
            .delete_entity(id)
    }

    /// Independent GDPR compliance check, runnable long after deletion.
    pub fn audit_deletion(&self, email: &str, id: EntityId) -> Result<ComplianceReport, Error> {
        let email = normalize_email(email);

        VerificationProbe::new(&self.store).audit_deletion(&email, id)
    }

    // ─────────────────────────────────────────────
    // Lifecycle operations
    // ─────────────────────────────────────────────

    /// Approve a pending account; its credentials become active.
    pub fn approve(&self, id: EntityId) -> Result<EntityRecord, Error> {
        self.set_status(id, Status::Approved)
    }

    pub fn reject(&self, id: EntityId) -> Result<EntityRecord, Error> {
        self.set_status(id, Status::Rejected)
    }

    pub fn suspend(&self, id: EntityId) -> Result<EntityRecord, Error> {
        self.set_status(id, Status::Suspended)
    }

    // A status change touches the canonical record, the summary entry,
    // and every credential copy (`is_active` mirrors the status), in
    // that order. The fan-out reuses the credential-change path so a
    // partial write surfaces as divergence.
    fn set_status(&self, id: EntityId, status: Status) -> Result<EntityRecord, Error> {
        let mut entity = self.load(id)?.ok_or(Error::UnknownEntity(id))?;
        entity.set_status(status, self.clock.now_ms());

        let index = IndexSynchronizer::new(&self.store);
        index.propagate_credential_change(&entity)?;
        index.upsert_entry(&entity)?;

        notify::dispatch(
            &self.sink,
            &Notification::StatusChanged {
                id,
                email: entity.email.clone(),
                status,
            },
        );

        Ok(entity)
    }

    /// Hash a new password and fan it out to every redundant location.
    pub fn change_password(&self, id: EntityId, new_password: &str) -> Result<(), Error> {
        validate_password(new_password)?;

        let mut entity = self.load(id)?.ok_or(Error::UnknownEntity(id))?;
        entity.set_password(PasswordHash::new(new_password), self.clock.now_ms());

        IndexSynchronizer::new(&self.store).propagate_credential_change(&entity)
    }

    /// Compare a submitted password against the freshest credential
    /// copy. Digest comparison only; raw values are never stored.
    pub fn verify_password(&self, email: &str, password: &str) -> Result<bool, Error> {
        let email = normalize_email(email);
        let Some(credential) =
            IndexSynchronizer::new(&self.store).credential_by_email(&email)?
        else {
            return Ok(false);
        };

        Ok(credential.password.verify(password))
    }

    // ─────────────────────────────────────────────
    // Read surface
    // ─────────────────────────────────────────────

    /// Canonical record by id.
    pub fn load(&self, id: EntityId) -> Result<Option<EntityRecord>, Error> {
        match self.store.get(&keyspace::entity(id))? {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Canonical record by email, routed through the credential index.
    pub fn lookup_by_email(&self, email: &str) -> Result<Option<EntityRecord>, Error> {
        let email = normalize_email(email);
        let Some(credential) =
            IndexSynchronizer::new(&self.store).credential_by_email(&email)?
        else {
            return Ok(None);
        };

        self.load(credential.id)
    }

    /// Summary list for one entity type.
    pub fn list(&self, entity_type: EntityType) -> Result<Vec<SummaryEntry>, Error> {
        IndexSynchronizer::new(&self.store).load_list(entity_type)
    }

    /// Snapshot of the runtime counters.
    #[expect(clippy::unused_self, reason = "counters are process-local state")]
    #[must_use]
    pub fn metrics_report(&self) -> MetricsReport {
        obs::metrics_report()
    }

    // Test seam: plant a canonical record without going through
    // registration (used to provision admin accounts in fixtures).
    #[doc(hidden)]
    pub fn plant(&self, entity: &EntityRecord) -> Result<(), Error> {
        self.store
            .set(&keyspace::entity(entity.id), serialize(entity)?)?;
        let index = IndexSynchronizer::new(&self.store);
        index.create_projections(entity)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, notify::MemorySink};
    use roster_store::MemoryStore;
    use std::collections::BTreeMap;

    fn registry() -> Registry<MemoryStore, ManualClock, MemorySink> {
        Registry::new(
            MemoryStore::new(),
            ManualClock::new(1_000),
            RegistryConfig::default(),
            MemorySink::new(),
        )
    }

    fn candidate(name: &str, email: &str) -> Candidate {
        Candidate {
            entity_type: EntityType::Influencer,
            name: name.to_string(),
            email: email.to_string(),
            password: "long enough secret".to_string(),
            correlation_id: None,
            profile: BTreeMap::new(),
        }
    }

    #[test]
    fn approval_activates_credentials_and_mirrors_the_summary() {
        let registry = registry();
        let id = registry
            .register(candidate("Jane", "jane@x.com"))
            .unwrap()
            .entity
            .id;

        assert!(registry.verify_password("jane@x.com", "long enough secret").unwrap());

        let approved = registry.approve(id).unwrap();
        assert_eq!(approved.status, Status::Approved);

        let list = registry.list(EntityType::Influencer).unwrap();
        assert_eq!(list[0].status, Status::Approved);

        let credential = IndexSynchronizer::new(registry.store())
            .credential_by_email("jane@x.com")
            .unwrap()
            .unwrap();
        assert!(credential.is_active);
    }

    #[test]
    fn status_changes_notify() {
        let registry = registry();
        let id = registry
            .register(candidate("Jane", "jane@x.com"))
            .unwrap()
            .entity
            .id;

        registry.suspend(id).unwrap();

        let sent = registry.sink.sent();
        assert!(sent.iter().any(|n| matches!(
            n,
            Notification::StatusChanged {
                status: Status::Suspended,
                ..
            }
        )));
    }

    #[test]
    fn password_change_converges_on_both_lookup_routes() {
        let registry = registry();
        let id = registry
            .register(candidate("Jane", "jane@x.com"))
            .unwrap()
            .entity
            .id;

        registry.change_password(id, "rotated long secret").unwrap();

        assert!(registry
            .verify_password("JANE@x.com", "rotated long secret")
            .unwrap());
        assert!(!registry
            .verify_password("jane@x.com", "long enough secret")
            .unwrap());

        let by_id = IndexSynchronizer::new(registry.store())
            .credential_by_id(id)
            .unwrap()
            .unwrap();
        assert!(by_id.password.verify("rotated long secret"));
    }

    #[test]
    fn status_ops_on_unknown_ids_fail() {
        let registry = registry();
        let missing = EntityId::from_parts(5, 5);

        assert!(matches!(
            registry.approve(missing).unwrap_err(),
            Error::UnknownEntity(id) if id == missing
        ));
        assert!(matches!(
            registry.change_password(missing, "whatever secret").unwrap_err(),
            Error::UnknownEntity(_)
        ));
    }

    #[test]
    fn lookup_by_email_returns_the_canonical_record() {
        let registry = registry();
        let id = registry
            .register(candidate("Jane", "jane@x.com"))
            .unwrap()
            .entity
            .id;

        let found = registry.lookup_by_email(" Jane@X.COM ").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert!(registry.lookup_by_email("ghost@x.com").unwrap().is_none());
    }

    #[test]
    fn verify_password_is_false_for_unknown_emails() {
        let registry = registry();
        assert!(!registry.verify_password("ghost@x.com", "anything").unwrap());
    }
}
