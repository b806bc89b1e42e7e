use crate::types::EntityId;
use serde::{Deserialize, Serialize};

///
/// CollabRequest
///
/// A pending collaboration request between a company and an influencer.
/// Written by the marketplace glue; this runtime only reads them during
/// the deletion sweep, because they carry foreign-key-like references to
/// entity ids.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CollabRequest {
    pub request_id: String,
    pub company_id: Option<EntityId>,
    pub influencer_id: Option<EntityId>,
    pub note: Option<String>,
    pub created_at_ms: u64,
}

impl CollabRequest {
    /// Whether this request references the given entity.
    #[must_use]
    pub fn references(&self, id: EntityId) -> bool {
        self.company_id == Some(id) || self.influencer_id == Some(id)
    }
}
