//! Post-condition verification. Strictly read-only: the probe confirms
//! what the store actually holds, it never repairs anything. Both
//! coordinators use it as the final gate before reporting success, and
//! callers can run the compliance audit independently later.

use crate::{
    error::Error,
    keyspace,
    model::{request::CollabRequest, summary::SummaryEntry},
    obs::sink::{self, MetricsEvent},
    serialize::deserialize,
    types::{EntityId, EntityType},
};
use roster_store::KeyValueStore;

///
/// Verification
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Verification {
    pub clean: bool,
    /// Keys that were expected absent but are still present.
    pub remaining: Vec<String>,
}

///
/// ComplianceReport
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ComplianceReport {
    pub compliant: bool,
    pub findings: Vec<String>,
}

///
/// VerificationProbe
///

pub struct VerificationProbe<'a, S> {
    store: &'a S,
}

impl<'a, S: KeyValueStore> VerificationProbe<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Re-read every key and confirm absence.
    pub fn assert_absent(&self, keys: &[String]) -> Result<Verification, Error> {
        sink::record(MetricsEvent::ProbeReads {
            keys: u64::try_from(keys.len()).unwrap_or(u64::MAX),
        });

        let mut remaining = Vec::new();
        for key in keys {
            if self.store.get(key)?.is_some() {
                remaining.push(key.clone());
            }
        }

        Ok(Verification {
            clean: remaining.is_empty(),
            remaining,
        })
    }

    /// Confirm a single key is present.
    pub fn assert_present(&self, key: &str) -> Result<bool, Error> {
        sink::record(MetricsEvent::ProbeReads { keys: 1 });

        Ok(self.store.get(key)?.is_some())
    }

    /// Independent GDPR compliance check: recompute every location the
    /// entity could occupy and report anything still present. Intended to
    /// run well after the deletion call itself.
    pub fn audit_deletion(&self, email: &str, id: EntityId) -> Result<ComplianceReport, Error> {
        let mut findings = Vec::new();

        let direct = [
            keyspace::entity(id),
            keyspace::credential(id),
            keyspace::credential_email(email),
            keyspace::password_cache(id),
            keyspace::lock(email),
            keyspace::subscription(id),
            keyspace::billing(id),
        ];
        let present = self.assert_absent(&direct)?;
        for key in present.remaining {
            findings.push(format!("key still present: {key}"));
        }

        for key in self.store.list_keys(&keyspace::attachment_prefix(id))? {
            findings.push(format!("attachment still present: {key}"));
        }

        for entity_type in EntityType::ALL {
            for entry in self.load_list(entity_type)? {
                if entry.id == id || entry.matches_email(email) {
                    findings.push(format!(
                        "summary list '{entity_type}' still contains {}",
                        entry.id
                    ));
                }
            }
        }

        for key in self.store.list_keys(keyspace::CORRELATION_PREFIX)? {
            if let Some(bytes) = self.store.get(&key)? {
                if deserialize::<EntityId>(&bytes).is_ok_and(|target| target == id) {
                    findings.push(format!("correlation pointer still maps to entity: {key}"));
                }
            }
        }

        for key in self.store.list_keys(keyspace::REQUEST_PREFIX)? {
            if let Some(bytes) = self.store.get(&key)? {
                // Foreign records may predate this schema; undecodable
                // requests are someone else's problem, not a finding.
                if deserialize::<CollabRequest>(&bytes).is_ok_and(|req| req.references(id)) {
                    findings.push(format!("collaboration request still references entity: {key}"));
                }
            }
        }

        Ok(ComplianceReport {
            compliant: findings.is_empty(),
            findings,
        })
    }

    fn load_list(&self, entity_type: EntityType) -> Result<Vec<SummaryEntry>, Error> {
        match self.store.get(&keyspace::list(entity_type))? {
            Some(bytes) => Ok(deserialize(&bytes)?),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::serialize;
    use roster_store::MemoryStore;

    #[test]
    fn assert_absent_reports_survivors() {
        let store = MemoryStore::new();
        store.set("entity:x", vec![1]).unwrap();

        let probe = VerificationProbe::new(&store);
        let keys = vec!["entity:x".to_string(), "entity:y".to_string()];
        let verification = probe.assert_absent(&keys).unwrap();

        assert!(!verification.clean);
        assert_eq!(verification.remaining, vec!["entity:x".to_string()]);
    }

    #[test]
    fn assert_absent_is_clean_on_empty_store() {
        let store = MemoryStore::new();
        let probe = VerificationProbe::new(&store);

        let verification = probe
            .assert_absent(&["entity:x".to_string()])
            .unwrap();
        assert!(verification.clean);
        assert!(verification.remaining.is_empty());
    }

    #[test]
    fn audit_flags_replanted_copies() {
        let store = MemoryStore::new();
        let probe = VerificationProbe::new(&store);
        let id = EntityId::from_parts(1, 1);

        assert!(probe.audit_deletion("a@x.com", id).unwrap().compliant);

        store
            .set(&keyspace::credential_email("a@x.com"), vec![1])
            .unwrap();
        store
            .set(
                &keyspace::correlation("sess_9"),
                serialize(&id).unwrap(),
            )
            .unwrap();

        let report = probe.audit_deletion("a@x.com", id).unwrap();
        assert!(!report.compliant);
        assert_eq!(report.findings.len(), 2);
        assert!(report.findings[0].contains("credential_email:a@x.com"));
        assert!(report.findings[1].contains("correlation:sess_9"));
    }

    #[test]
    fn audit_ignores_undecodable_foreign_requests() {
        let store = MemoryStore::new();
        store.set("request:junk", vec![0xde, 0xad]).unwrap();

        let probe = VerificationProbe::new(&store);
        let report = probe
            .audit_deletion("a@x.com", EntityId::from_parts(2, 2))
            .unwrap();

        assert!(report.compliant);
    }
}
