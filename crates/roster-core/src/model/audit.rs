use crate::types::EntityId;
use serde::{Deserialize, Serialize};

///
/// DeletionPhase
///
/// The fixed, ordered phase list of a cascading deletion. Order matters:
/// login capability dies first, verification runs last.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPhase {
    RevokeCredentials,
    DeleteCanonical,
    RemoveSummary,
    CancelDependents,
    SweepReferences,
    Verify,
}

impl DeletionPhase {
    pub const ORDERED: [Self; 6] = [
        Self::RevokeCredentials,
        Self::DeleteCanonical,
        Self::RemoveSummary,
        Self::CancelDependents,
        Self::SweepReferences,
        Self::Verify,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RevokeCredentials => "revoke_credentials",
            Self::DeleteCanonical => "delete_canonical",
            Self::RemoveSummary => "remove_summary",
            Self::CancelDependents => "cancel_dependents",
            Self::SweepReferences => "sweep_references",
            Self::Verify => "verify",
        }
    }
}

impl std::fmt::Display for DeletionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// PhaseRecord
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PhaseRecord {
    pub phase: DeletionPhase,
    pub ok: bool,
    /// Failure detail; absent on success.
    pub detail: Option<String>,
}

impl PhaseRecord {
    #[must_use]
    pub const fn ok(phase: DeletionPhase) -> Self {
        Self {
            phase,
            ok: true,
            detail: None,
        }
    }

    #[must_use]
    pub fn failed(phase: DeletionPhase, detail: impl Into<String>) -> Self {
        Self {
            phase,
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

///
/// DeletionAuditEntry
///
/// Append-only record of one deletion attempt: what ran, what failed,
/// and whether verification confirmed completeness. Never mutated after
/// creation.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DeletionAuditEntry {
    pub entity_id: EntityId,
    /// Normalized email when it could still be recovered at deletion time.
    pub email: Option<String>,
    pub at_ms: u64,
    pub phases: Vec<PhaseRecord>,
    pub verified_clean: bool,
    /// Keys still present after verification.
    pub remaining: Vec<String>,
}

/// Append to a capped log, dropping oldest entries first.
pub fn push_capped(log: &mut Vec<DeletionAuditEntry>, entry: DeletionAuditEntry, cap: usize) {
    log.push(entry);
    if log.len() > cap {
        let excess = log.len() - cap;
        log.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: u64) -> DeletionAuditEntry {
        DeletionAuditEntry {
            entity_id: EntityId::from_parts(n, 0),
            email: None,
            at_ms: n,
            phases: vec![PhaseRecord::ok(DeletionPhase::RevokeCredentials)],
            verified_clean: true,
            remaining: Vec::new(),
        }
    }

    #[test]
    fn phase_order_is_fixed() {
        assert_eq!(DeletionPhase::ORDERED[0], DeletionPhase::RevokeCredentials);
        assert_eq!(DeletionPhase::ORDERED[5], DeletionPhase::Verify);
        assert_eq!(DeletionPhase::ORDERED.len(), 6);
    }

    #[test]
    fn capped_log_drops_oldest_first() {
        let mut log = Vec::new();
        for n in 0..5 {
            push_capped(&mut log, entry(n), 3);
        }

        assert_eq!(log.len(), 3);
        assert_eq!(log[0].at_ms, 2);
        assert_eq!(log[2].at_ms, 4);
    }

    #[test]
    fn failed_record_carries_detail() {
        let record = PhaseRecord::failed(DeletionPhase::CancelDependents, "store unavailable");

        assert!(!record.ok);
        assert_eq!(record.detail.as_deref(), Some("store unavailable"));
    }
}
