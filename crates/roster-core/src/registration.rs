//! Idempotent account creation.
//!
//! The store cannot make "check then create" atomic, so the coordinator
//! layers three defenses: ordered duplicate checks across every index
//! that could hold the email, an advisory lock token per normalized
//! email, and a re-check under the token before the canonical write.
//! The residual race window (two callers observing "no live token" in
//! the same instant) is a documented gap, acceptable at human
//! registration rates.

use crate::{
    clock::Clock,
    config::RegistryConfig,
    error::{DuplicateConflict, DuplicateReason, Error, LockTimeout},
    index::IndexSynchronizer,
    keyspace,
    model::{credential::{CredentialRecord, PasswordHash}, entity::EntityRecord, lock::LockToken, status::Status},
    notify::{self, Notification, NotificationSink},
    obs::sink::{self, MetricsEvent},
    sanitize::{normalize_email, normalize_name, trim_name},
    serialize::{deserialize, serialize},
    types::{EntityId, EntityType},
    validate::{validate_email, validate_name, validate_password, validate_registrable},
    verify::VerificationProbe,
};
use roster_store::{KeyValueStore, StoreError};
use std::collections::BTreeMap;

///
/// Candidate
///
/// A registration request as submitted. Nothing here is normalized yet.
///

#[derive(Clone, Debug)]
pub struct Candidate {
    pub entity_type: EntityType,
    pub name: String,
    pub email: String,
    pub password: String,
    /// External correlation id, e.g. the payment session that funded the
    /// registration. Drives idempotent replay.
    pub correlation_id: Option<String>,
    pub profile: BTreeMap<String, String>,
}

///
/// Registered
///

#[derive(Clone, Debug)]
pub struct Registered {
    pub entity: EntityRecord,
    /// False when the call was an idempotent replay of a completed
    /// registration.
    pub created: bool,
}

///
/// RegistrationCoordinator
///

pub struct RegistrationCoordinator<'a, S, C> {
    store: &'a S,
    clock: &'a C,
    config: RegistryConfig,
    sink: &'a dyn NotificationSink,
    debug: bool,
}

impl<'a, S, C> RegistrationCoordinator<'a, S, C>
where
    S: KeyValueStore,
    C: Clock,
{
    #[must_use]
    pub const fn new(
        store: &'a S,
        clock: &'a C,
        config: RegistryConfig,
        sink: &'a dyn NotificationSink,
        debug: bool,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            sink,
            debug,
        }
    }

    fn debug_log(&self, s: impl Into<String>) {
        if self.debug {
            println!("[debug] {}", s.into());
        }
    }

    /// Create an account exactly once.
    pub fn register(&self, candidate: Candidate) -> Result<Registered, Error> {
        sink::record(MetricsEvent::RegistrationStart);

        // Validation fails fast; nothing below this point runs on
        // malformed input and nothing above it touches the store.
        validate_registrable(candidate.entity_type)?;
        let name = trim_name(&candidate.name);
        validate_name(&name)?;
        let email = normalize_email(&candidate.email);
        validate_email(&email)?;
        validate_password(&candidate.password)?;
        let name_norm = normalize_name(&name);
        let correlation = candidate.correlation_id.as_deref();

        // Pre-lock duplicate pass: cheap fail-fast without a token write.
        if let Some((reason, existing)) = self.find_duplicate(&email, &name_norm, correlation)? {
            return self.conclude_duplicate(reason, existing, correlation);
        }

        self.acquire_lock(&email)?;
        let result = self.register_locked(&email, name, name_norm, candidate);
        self.release_lock(&email);

        let registered = result?;
        if registered.created {
            sink::record(MetricsEvent::RegistrationCreated);
            notify::dispatch(
                self.sink,
                &Notification::Welcome {
                    id: registered.entity.id,
                    entity_type: registered.entity.entity_type,
                    name: registered.entity.name.clone(),
                    email: registered.entity.email.clone(),
                },
            );
        }

        Ok(registered)
    }

    // The authoritative path: checks re-run with the token held, then the
    // canonical write and projection fan-out.
    fn register_locked(
        &self,
        email: &str,
        name: String,
        name_norm: String,
        candidate: Candidate,
    ) -> Result<Registered, Error> {
        let correlation = candidate.correlation_id.as_deref();
        if let Some((reason, existing)) = self.find_duplicate(email, &name_norm, correlation)? {
            return self.conclude_duplicate(reason, existing, correlation);
        }

        // Checks passed; advertise the mutation phase before writing.
        let now = self.clock.now_ms();
        let token = LockToken::checking(email, now).into_processing(now);
        self.store
            .set(&keyspace::lock(email), serialize(&token)?)?;
        let entity = EntityRecord {
            id: EntityId::generate(),
            entity_type: candidate.entity_type,
            name,
            email: email.to_string(),
            status: Status::Pending,
            password: PasswordHash::new(&candidate.password),
            correlation_id: candidate.correlation_id.clone(),
            profile: candidate.profile,
            created_at_ms: now,
            updated_at_ms: now,
        };

        let entity_key = keyspace::entity(entity.id);
        self.store.set(&entity_key, serialize(&entity)?)?;
        self.debug_log(format!("canonical record written ({entity_key})"));

        IndexSynchronizer::new(self.store).create_projections(&entity)?;
        if let Some(correlation_id) = candidate.correlation_id.as_deref() {
            self.store.set(
                &keyspace::correlation(correlation_id),
                serialize(&entity.id)?,
            )?;
        }

        // Final gate: the canonical record must actually be readable.
        if !VerificationProbe::new(self.store).assert_present(&entity_key)? {
            return Err(StoreError::unavailable(
                "verify",
                entity_key,
                "canonical record absent after write",
            )
            .into());
        }
        self.debug_log(format!("registration committed for {}", entity.id));

        Ok(Registered {
            entity,
            created: true,
        })
    }

    // ─────────────────────────────────────────────
    // Duplicate detection
    // ─────────────────────────────────────────────

    // Fixed order; the first hit wins as the reported reason. Hits whose
    // canonical record no longer exists are stale projections and are
    // ignored: a cleanly deleted entity frees its email and name.
    fn find_duplicate(
        &self,
        email: &str,
        name_norm: &str,
        correlation: Option<&str>,
    ) -> Result<Option<(DuplicateReason, EntityRecord)>, Error> {
        if let Some(credential) = self.credential_by_email(email)? {
            if let Some(existing) = self.load_entity(credential.id)? {
                return Ok(Some((DuplicateReason::CredentialEmail, existing)));
            }
        }

        let index = IndexSynchronizer::new(self.store);
        for entity_type in EntityType::ALL {
            let list = index.load_list(entity_type)?;
            if let Some(entry) = list.iter().find(|entry| entry.matches_email(email)) {
                if let Some(existing) = self.load_entity(entry.id)? {
                    return Ok(Some((DuplicateReason::ListedEmail, existing)));
                }
            }
        }

        for entity_type in EntityType::ALL {
            let list = index.load_list(entity_type)?;
            if let Some(entry) = list.iter().find(|entry| entry.matches_name(name_norm)) {
                if let Some(existing) = self.load_entity(entry.id)? {
                    return Ok(Some((DuplicateReason::ListedName, existing)));
                }
            }
        }

        if let Some(correlation_id) = correlation {
            if let Some(bytes) = self.store.get(&keyspace::correlation(correlation_id))? {
                let id: EntityId = deserialize(&bytes)?;
                if let Some(existing) = self.load_entity(id)? {
                    return Ok(Some((DuplicateReason::Correlation, existing)));
                }
            }
        }

        Ok(None)
    }

    // A hit is a replay when the existing entity completed registration
    // under the same correlation id; otherwise it is a conflict.
    fn conclude_duplicate(
        &self,
        reason: DuplicateReason,
        existing: EntityRecord,
        correlation: Option<&str>,
    ) -> Result<Registered, Error> {
        let replay = match (existing.correlation_id.as_deref(), correlation) {
            (Some(prior), Some(submitted)) => prior == submitted,
            _ => false,
        };

        if replay {
            sink::record(MetricsEvent::RegistrationReplayed);
            self.debug_log(format!("replayed registration of {}", existing.id));

            return Ok(Registered {
                entity: existing,
                created: false,
            });
        }

        sink::record(MetricsEvent::DuplicateConflict);

        Err(DuplicateConflict {
            reason,
            existing: existing.summary(),
        }
        .into())
    }

    // ─────────────────────────────────────────────
    // Advisory lock
    // ─────────────────────────────────────────────

    fn acquire_lock(&self, email: &str) -> Result<(), Error> {
        let key = keyspace::lock(email);
        let now = self.clock.now_ms();

        if let Some(bytes) = self.store.get(&key)? {
            match deserialize::<LockToken>(&bytes) {
                Ok(token) if !token.is_stale(now, self.config.lock_stale_after_ms) => {
                    sink::record(MetricsEvent::LockContention);

                    return Err(LockTimeout {
                        email: email.to_string(),
                        retry_after_ms: self.config.lock_retry_after_ms,
                    }
                    .into());
                }
                Ok(_) => {
                    // Abandoned by a dead caller; overwrite, don't honour.
                    sink::record(MetricsEvent::LockTakeover);
                    self.debug_log(format!("stale lock token overwritten for '{email}'"));
                }
                Err(_) => {
                    // An unreadable token cannot be honoured either.
                    sink::record(MetricsEvent::LockTakeover);
                    self.debug_log(format!("undecodable lock token overwritten for '{email}'"));
                }
            }
        }

        self.store
            .set(&key, serialize(&LockToken::checking(email, now))?)?;

        Ok(())
    }

    // Best-effort: a failed delete leaves a token that expires after the
    // staleness window, which the next caller overwrites.
    fn release_lock(&self, email: &str) {
        if self.store.delete(&keyspace::lock(email)).is_err() {
            self.debug_log(format!(
                "lock release failed for '{email}'; token will expire"
            ));
        }
    }

    // ─────────────────────────────────────────────
    // Store reads
    // ─────────────────────────────────────────────

    fn load_entity(&self, id: EntityId) -> Result<Option<EntityRecord>, Error> {
        match self.store.get(&keyspace::entity(id))? {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn credential_by_email(&self, email: &str) -> Result<Option<CredentialRecord>, Error> {
        match self.store.get(&keyspace::credential_email(email))? {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, notify::NullSink, obs};
    use roster_store::{FaultKind, FaultRule, FaultStore, MemoryStore};

    fn candidate(name: &str, email: &str, correlation: Option<&str>) -> Candidate {
        Candidate {
            entity_type: EntityType::Company,
            name: name.to_string(),
            email: email.to_string(),
            password: "long enough secret".to_string(),
            correlation_id: correlation.map(str::to_string),
            profile: BTreeMap::new(),
        }
    }

    fn coordinator<'a, S: KeyValueStore>(
        store: &'a S,
        clock: &'a ManualClock,
        sink: &'a NullSink,
    ) -> RegistrationCoordinator<'a, S, ManualClock> {
        RegistrationCoordinator::new(store, clock, RegistryConfig::default(), sink, false)
    }

    #[test]
    fn registration_writes_canonical_and_projections() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(1_000);
        let sink = NullSink;
        let reg = coordinator(&store, &clock, &sink);

        let registered = reg
            .register(candidate("Acme", "  ACME@X.com ", Some("sess_1")))
            .unwrap();

        assert!(registered.created);
        let entity = &registered.entity;
        assert_eq!(entity.email, "acme@x.com");
        assert_eq!(entity.name, "Acme");
        assert_eq!(entity.status, Status::Pending);

        assert!(store.get(&keyspace::entity(entity.id)).unwrap().is_some());
        assert!(store.get(&keyspace::credential(entity.id)).unwrap().is_some());
        assert!(store
            .get(&keyspace::credential_email("acme@x.com"))
            .unwrap()
            .is_some());
        assert!(store
            .get(&keyspace::correlation("sess_1"))
            .unwrap()
            .is_some());
        // No orphaned lock survives success.
        assert!(store.get(&keyspace::lock("acme@x.com")).unwrap().is_none());
    }

    #[test]
    fn same_correlation_id_replays_instead_of_duplicating() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(1_000);
        let sink = NullSink;
        let reg = coordinator(&store, &clock, &sink);

        let first = reg
            .register(candidate("Acme", "a@x.com", Some("sess_1")))
            .unwrap();
        let second = reg
            .register(candidate("Acme", "a@x.com", Some("sess_1")))
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.entity.id, second.entity.id);
        assert_eq!(store.list_keys(keyspace::ENTITY_PREFIX).unwrap().len(), 1);
    }

    #[test]
    fn same_email_different_correlation_conflicts() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(1_000);
        let sink = NullSink;
        let reg = coordinator(&store, &clock, &sink);

        let first = reg
            .register(candidate("Acme", "a@x.com", Some("sess_1")))
            .unwrap();
        let err = reg
            .register(candidate("Other", "a@x.com", Some("sess_2")))
            .unwrap_err();

        match err {
            Error::Duplicate(conflict) => {
                assert_eq!(conflict.reason, DuplicateReason::CredentialEmail);
                assert_eq!(conflict.existing.id, first.entity.id);
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[test]
    fn display_name_collision_conflicts_across_types() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(1_000);
        let sink = NullSink;
        let reg = coordinator(&store, &clock, &sink);

        reg.register(candidate("Acme Media", "a@x.com", None)).unwrap();

        let mut other = candidate("  acme media ", "b@y.com", None);
        other.entity_type = EntityType::Influencer;
        let err = reg.register(other).unwrap_err();

        match err {
            Error::Duplicate(conflict) => {
                assert_eq!(conflict.reason, DuplicateReason::ListedName);
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[test]
    fn live_lock_token_times_out_with_retry_hint() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(10_000);
        let sink = NullSink;
        let reg = coordinator(&store, &clock, &sink);

        // A concurrent registration holds the token.
        let token = LockToken::checking("a@x.com", 9_000);
        store
            .set(&keyspace::lock("a@x.com"), serialize(&token).unwrap())
            .unwrap();

        let err = reg.register(candidate("Acme", "a@x.com", None)).unwrap_err();
        assert_eq!(err.retry_after_ms(), Some(2_000));
        // The in-flight token is left alone.
        assert!(store.get(&keyspace::lock("a@x.com")).unwrap().is_some());
    }

    #[test]
    fn stale_lock_token_is_overwritten() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(1_000_000);
        let sink = NullSink;
        let reg = coordinator(&store, &clock, &sink);

        let token = LockToken::checking("a@x.com", 1_000);
        store
            .set(&keyspace::lock("a@x.com"), serialize(&token).unwrap())
            .unwrap();

        let registered = reg.register(candidate("Acme", "a@x.com", None)).unwrap();
        assert!(registered.created);
        assert!(store.get(&keyspace::lock("a@x.com")).unwrap().is_none());
    }

    #[test]
    fn failed_registration_releases_the_lock() {
        let store = FaultStore::new(MemoryStore::new());
        let clock = ManualClock::new(1_000);
        let sink = NullSink;
        let reg = coordinator(&store, &clock, &sink);

        // The canonical write fails after the token is taken.
        store.push_rule(FaultRule::new("entity:", FaultKind::Unavailable));

        let err = reg.register(candidate("Acme", "a@x.com", None)).unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(store.get(&keyspace::lock("a@x.com")).unwrap().is_none());
    }

    #[test]
    fn silently_dropped_canonical_write_fails_the_final_gate() {
        let store = FaultStore::new(MemoryStore::new());
        let clock = ManualClock::new(1_000);
        let sink = NullSink;
        let reg = coordinator(&store, &clock, &sink);

        store.push_rule(FaultRule::new("entity:", FaultKind::SilentDrop));

        let err = reg.register(candidate("Acme", "a@x.com", None)).unwrap_err();
        match err {
            Error::Store(StoreError::Unavailable { op, .. }) => assert_eq!(op, "verify"),
            other => panic!("expected store error, got {other:?}"),
        }
        assert!(store.get(&keyspace::lock("a@x.com")).unwrap().is_none());
    }

    #[test]
    fn validation_failures_touch_nothing() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(1_000);
        let sink = NullSink;
        let reg = coordinator(&store, &clock, &sink);

        let mut bad = candidate("Acme", "not-an-email", None);
        assert!(matches!(
            reg.register(bad.clone()).unwrap_err(),
            Error::Validation(_)
        ));

        bad = candidate("Acme", "a@x.com", None);
        bad.password = "short".to_string();
        assert!(matches!(
            reg.register(bad).unwrap_err(),
            Error::Validation(_)
        ));

        bad = candidate("Admin", "root@x.com", None);
        bad.entity_type = EntityType::Admin;
        assert!(matches!(
            reg.register(bad).unwrap_err(),
            Error::Validation(_)
        ));

        assert!(store.is_empty());
    }

    #[test]
    fn duplicate_metrics_are_counted() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(1_000);
        let sink = NullSink;
        let reg = coordinator(&store, &clock, &sink);

        obs::metrics_reset_all();
        reg.register(candidate("Acme", "a@x.com", None)).unwrap();
        let _ = reg.register(candidate("Other", "a@x.com", None));

        let report = obs::metrics_report();
        assert_eq!(report.registrations_started, 2);
        assert_eq!(report.registrations_created, 1);
        assert_eq!(report.duplicate_conflicts, 1);
        obs::metrics_reset_all();
    }
}
