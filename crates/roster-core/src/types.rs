use derive_more::{Deref, Display, FromStr};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use ulid::Ulid;

///
/// EntityIdError
///

#[derive(Debug, ThisError)]
pub enum EntityIdError {
    #[error("invalid entity id string")]
    InvalidString,
}

///
/// EntityId
///
/// ULID-backed identifier for canonical records. Serializes as its
/// canonical 26-character string so ids are readable in store keys.
///

#[derive(
    Clone,
    Copy,
    Debug,
    Deref,
    Deserialize,
    Display,
    Eq,
    FromStr,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[repr(transparent)]
pub struct EntityId(Ulid);

impl EntityId {
    #[must_use]
    pub const fn nil() -> Self {
        Self(Ulid::nil())
    }

    /// Generate an id with the current timestamp and fresh randomness.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Deterministic constructor for fixtures.
    #[must_use]
    pub const fn from_parts(timestamp_ms: u64, random: u128) -> Self {
        Self(Ulid::from_parts(timestamp_ms, random))
    }

    pub fn parse(encoded: &str) -> Result<Self, EntityIdError> {
        Ulid::from_string(encoded)
            .map(Self)
            .map_err(|_| EntityIdError::InvalidString)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::nil()
    }
}

impl From<Ulid> for EntityId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

///
/// EntityType
///
/// The marketplace account roles. `Admin` accounts exist in the store but
/// are provisioned out of band; self-service registration only produces
/// companies and influencers.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Company,
    Influencer,
    Admin,
}

impl EntityType {
    pub const ALL: [Self; 3] = [Self::Company, Self::Influencer, Self::Admin];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Influencer => "influencer",
            Self::Admin => "admin",
        }
    }

    /// True for roles that may register themselves.
    #[must_use]
    pub const fn is_self_registrable(self) -> bool {
        !matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
