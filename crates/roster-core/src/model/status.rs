use serde::{Deserialize, Serialize};

///
/// Status
///
/// Account lifecycle. Registration produces `Pending`; the admin layer
/// moves accounts through the rest. Deletion is not a status; a deleted
/// entity has no record at all.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Suspended => "suspended",
        }
    }

    /// Whether credentials for an account in this status may log in.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Approved)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
