//! Business-level error taxonomy. Infrastructure failures
//! ([`StoreError`], [`SerializeError`]) stay distinct from the business
//! kinds so callers can tell "already exists" from "store down".

use crate::{
    model::summary::SummaryEntry,
    serialize::SerializeError,
    types::EntityId,
    validate::ValidationError,
};
use roster_store::StoreError;
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Duplicate(#[from] DuplicateConflict),

    #[error(transparent)]
    Lock(#[from] LockTimeout),

    #[error(transparent)]
    PartialDeletion(#[from] PartialDeletionFailure),

    #[error(transparent)]
    Mismatch(#[from] VerificationMismatch),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    /// A status or credential operation addressed an id with no
    /// canonical record.
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),
}

impl Error {
    /// True when an equivalent entity already exists; callers treat this
    /// as an outcome, not a system failure.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    /// Suggested retry delay, present only for lock contention.
    #[must_use]
    pub const fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::Lock(lock) => Some(lock.retry_after_ms),
            _ => None,
        }
    }
}

///
/// DuplicateReason
///
/// Which duplicate check matched. Checks run in a fixed order and the
/// first hit wins as the reported reason.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DuplicateReason {
    /// Normalized email found in the credential email index.
    CredentialEmail,
    /// Normalized email found in a summary list.
    ListedEmail,
    /// Normalized display name found in a summary list.
    ListedName,
    /// Correlation id already mapped to an entity.
    Correlation,
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CredentialEmail => "email already has credentials",
            Self::ListedEmail => "email already registered",
            Self::ListedName => "display name already taken",
            Self::Correlation => "correlation id already used",
        };
        f.write_str(label)
    }
}

///
/// DuplicateConflict
///
/// Carries the existing entity's summary so idempotent callers can use
/// the prior result instead of treating the collision as fatal.
///

#[derive(Clone, Debug, ThisError)]
#[error("duplicate registration ({reason}): existing entity {}", existing.id)]
pub struct DuplicateConflict {
    pub reason: DuplicateReason,
    pub existing: SummaryEntry,
}

///
/// LockTimeout
///

#[derive(Clone, Debug, ThisError)]
#[error("registration already in flight for '{email}'; retry in {retry_after_ms}ms")]
pub struct LockTimeout {
    pub email: String,
    pub retry_after_ms: u64,
}

///
/// PartialDeletionFailure
///
/// One or more deletion phases did not verify clean. Carries the keys
/// still present so the caller can re-run the sweep. Recorded in the
/// deletion audit log as well; not fatal to the calling flow.
///

#[derive(Clone, Debug, ThisError)]
#[error("deletion of {id} left {} key(s) behind", remaining.len())]
pub struct PartialDeletionFailure {
    pub id: EntityId,
    pub remaining: Vec<String>,
}

///
/// VerificationMismatch
///
/// Drift between redundant credential copies, found by an audit or by a
/// partially failed fan-out.
///

#[derive(Clone, Debug, ThisError)]
#[error("credential copies diverged for {id}: {}", locations.join(", "))]
pub struct VerificationMismatch {
    pub id: EntityId,
    pub locations: Vec<String>,
}
