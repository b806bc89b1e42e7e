//! Core runtime for Roster: the registration/deletion consistency protocol
//! for marketplace accounts, layered over a primitive key-value store.
//!
//! The store primitive (`roster-store`) offers no transactions and no
//! locks. Everything consistency-shaped lives here: idempotency via
//! correlation pointers, advisory lock tokens, multi-location credential
//! replication, and post-hoc verification reads.

pub mod clock;
pub mod config;
pub mod deletion;
pub mod error;
pub mod index;
pub mod keyspace;
pub mod model;
pub mod notify;
pub mod obs;
pub mod registration;
pub mod sanitize;
pub mod serialize;
pub mod service;
pub mod types;
pub mod validate;
pub mod verify;

///
/// CONSTANTS
///

/// Minimum accepted password length, enforced before hashing.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum accepted display-name length after trimming.
pub const MAX_NAME_LEN: usize = 120;

///
/// Prelude
///
/// Domain vocabulary only. No errors, stores, or helpers re-exported here.
///

pub mod prelude {
    pub use crate::{
        model::{entity::EntityRecord, status::Status, summary::SummaryEntry},
        service::Registry,
        types::{EntityId, EntityType},
    };
}
