//! Persisted key layout. The layout is a stable contract: other tooling
//! (compliance audits, migrations) addresses the same keys, so changes
//! here are wire-format changes.
//!
//! Emails embedded in keys are always the normalized form.

use crate::types::{EntityId, EntityType};

pub const ENTITY_PREFIX: &str = "entity:";
pub const LIST_PREFIX: &str = "list:";
pub const CREDENTIAL_PREFIX: &str = "credential:";
pub const CREDENTIAL_EMAIL_PREFIX: &str = "credential_email:";
pub const PASSWORD_CACHE_PREFIX: &str = "password_cache:";
pub const LOCK_PREFIX: &str = "lock:";
pub const CORRELATION_PREFIX: &str = "correlation:";
pub const ATTACHMENT_PREFIX: &str = "attachment:";
pub const SUBSCRIPTION_PREFIX: &str = "subscription:";
pub const BILLING_PREFIX: &str = "billing:";
pub const REQUEST_PREFIX: &str = "request:";

/// Capped append-only deletion audit log.
pub const AUDIT_DELETIONS_KEY: &str = "audit:deletions";

/// Canonical record.
#[must_use]
pub fn entity(id: EntityId) -> String {
    format!("{ENTITY_PREFIX}{id}")
}

/// Per-type summary list.
#[must_use]
pub fn list(entity_type: EntityType) -> String {
    format!("{LIST_PREFIX}{entity_type}")
}

/// Credential projection keyed by id.
#[must_use]
pub fn credential(id: EntityId) -> String {
    format!("{CREDENTIAL_PREFIX}{id}")
}

/// Credential projection keyed by normalized email.
#[must_use]
pub fn credential_email(email: &str) -> String {
    format!("{CREDENTIAL_EMAIL_PREFIX}{email}")
}

/// Bare password-hash shortcut for the hot login path.
#[must_use]
pub fn password_cache(id: EntityId) -> String {
    format!("{PASSWORD_CACHE_PREFIX}{id}")
}

/// Advisory registration lock, one per normalized email.
#[must_use]
pub fn lock(email: &str) -> String {
    format!("{LOCK_PREFIX}{email}")
}

/// Idempotency pointer from an external correlation id to an entity id.
#[must_use]
pub fn correlation(correlation_id: &str) -> String {
    format!("{CORRELATION_PREFIX}{correlation_id}")
}

/// Side-stored attachment, e.g. a profile-image backup.
#[must_use]
pub fn attachment(id: EntityId, name: &str) -> String {
    format!("{ATTACHMENT_PREFIX}{id}:{name}")
}

/// Prefix covering every attachment of one entity.
#[must_use]
pub fn attachment_prefix(id: EntityId) -> String {
    format!("{ATTACHMENT_PREFIX}{id}:")
}

/// Dependent subscription record.
#[must_use]
pub fn subscription(id: EntityId) -> String {
    format!("{SUBSCRIPTION_PREFIX}{id}")
}

/// Dependent scheduled-billing record.
#[must_use]
pub fn billing(id: EntityId) -> String {
    format!("{BILLING_PREFIX}{id}")
}

/// Pending collaboration request.
#[must_use]
pub fn request(request_id: &str) -> String {
    format!("{REQUEST_PREFIX}{request_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn layout_is_stable() {
        let id = EntityId::from_parts(1, 1);

        assert_eq!(entity(id), format!("entity:{id}"));
        assert_eq!(list(EntityType::Company), "list:company");
        assert_eq!(credential(id), format!("credential:{id}"));
        assert_eq!(
            credential_email("a@x.com"),
            "credential_email:a@x.com"
        );
        assert_eq!(password_cache(id), format!("password_cache:{id}"));
        assert_eq!(lock("a@x.com"), "lock:a@x.com");
        assert_eq!(correlation("sess_1"), "correlation:sess_1");
        assert_eq!(attachment(id, "avatar"), format!("attachment:{id}:avatar"));
        assert_eq!(subscription(id), format!("subscription:{id}"));
        assert_eq!(billing(id), format!("billing:{id}"));
        assert_eq!(request("r1"), "request:r1");
    }

    #[test]
    fn attachment_prefix_covers_attachment_keys() {
        let id = EntityId::from_parts(2, 9);
        assert!(attachment(id, "avatar").starts_with(&attachment_prefix(id)));
    }

    proptest! {
        // Prefixes must never collide: no key from one namespace may be
        // listed when scanning another.
        #[test]
        fn namespaces_are_disjoint(ts in 0u64..=u64::from(u32::MAX), r in 0u128..1_000_000u128) {
            let id = EntityId::from_parts(ts, r);
            let keys = [
                entity(id),
                credential(id),
                password_cache(id),
                subscription(id),
                billing(id),
            ];
            let prefixes = [
                ENTITY_PREFIX,
                CREDENTIAL_PREFIX,
                PASSWORD_CACHE_PREFIX,
                SUBSCRIPTION_PREFIX,
                BILLING_PREFIX,
            ];

            for (i, key) in keys.iter().enumerate() {
                for (j, prefix) in prefixes.iter().enumerate() {
                    prop_assert_eq!(key.starts_with(prefix), i == j);
                }
            }

            // The email namespace must not shadow the id namespace.
            prop_assert!(!credential_email("x@y.z").starts_with(CREDENTIAL_PREFIX));
        }
    }
}
