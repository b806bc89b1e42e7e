use crate::{
    model::status::Status,
    sanitize::normalize_name,
    types::{EntityId, EntityType},
};
use serde::{Deserialize, Serialize};

///
/// SummaryEntry
///
/// Reduced projection held in the per-type summary list for cheap
/// enumeration. Every entry's id must resolve to a canonical record, and
/// every canonical record has exactly one entry in its type's list.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SummaryEntry {
    pub id: EntityId,
    pub entity_type: EntityType,
    pub name: String,
    pub email: String,
    pub status: Status,
}

impl SummaryEntry {
    #[must_use]
    pub fn matches_email(&self, normalized_email: &str) -> bool {
        self.email == normalized_email
    }

    #[must_use]
    pub fn matches_name(&self, normalized_name: &str) -> bool {
        normalize_name(&self.name) == normalized_name
    }
}
