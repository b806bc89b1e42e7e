use serde::{Deserialize, Serialize};

///
/// LockPhase
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockPhase {
    /// Token written, duplicate checks still running.
    Checking,
    /// Checks passed; canonical write and fan-out in progress.
    Processing,
}

///
/// LockToken
///
/// Advisory registration lock, one per normalized email. The store
/// cannot enforce exclusivity, so the token is a cooperative signal:
/// honoured when live, overwritten once older than the staleness window.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct LockToken {
    pub email: String,
    pub phase: LockPhase,
    pub timestamp_ms: u64,
}

impl LockToken {
    #[must_use]
    pub fn checking(email: impl Into<String>, now_ms: u64) -> Self {
        Self {
            email: email.into(),
            phase: LockPhase::Checking,
            timestamp_ms: now_ms,
        }
    }

    /// Move the token to the processing phase, refreshing its timestamp.
    #[must_use]
    pub fn into_processing(mut self, now_ms: u64) -> Self {
        self.phase = LockPhase::Processing;
        self.timestamp_ms = now_ms;
        self
    }

    /// An abandoned token: older than the staleness window. Clock skew
    /// can make stored timestamps land in the future; those count as
    /// live, not stale.
    #[must_use]
    pub const fn is_stale(&self, now_ms: u64, stale_after_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp_ms) > stale_after_ms
    }
}
