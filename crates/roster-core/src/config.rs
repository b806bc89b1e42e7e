///
/// RegistryConfig
///
/// Tunables injected into the coordinators. All durations are
/// milliseconds; the store has no TTL support, so staleness is computed
/// from stored timestamps against these windows.
///

#[derive(Clone, Copy, Debug)]
pub struct RegistryConfig {
    /// A lock token older than this is treated as abandoned and
    /// overwritten rather than honoured.
    pub lock_stale_after_ms: u64,

    /// Retry delay suggested to callers that hit a live lock.
    pub lock_retry_after_ms: u64,

    /// Total call budget per store operation before a transient fault
    /// surfaces as an infrastructure error.
    pub store_retry_attempts: u32,

    /// Maximum retained deletion audit entries; oldest dropped first.
    pub audit_log_cap: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            lock_stale_after_ms: 5 * 60 * 1_000,
            lock_retry_after_ms: 2_000,
            store_retry_attempts: 3,
            audit_log_cap: 200,
        }
    }
}
