use serde::Serialize;
use std::cell::RefCell;

thread_local! {
    static STATE: RefCell<MetricsReport> = RefCell::new(MetricsReport::default());
}

///
/// MetricsReport
///
/// Point-in-time snapshot of the runtime counters. Counters saturate
/// rather than wrap.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MetricsReport {
    pub registrations_started: u64,
    pub registrations_created: u64,
    pub registrations_replayed: u64,
    pub duplicate_conflicts: u64,
    pub lock_contention: u64,
    pub lock_takeovers: u64,
    pub deletions_started: u64,
    pub deletions_verified_clean: u64,
    pub deletion_phase_failures: u64,
    pub summary_inserts: u64,
    pub summary_removes: u64,
    pub credential_writes: u64,
    pub credential_write_failures: u64,
    pub probe_reads: u64,
    pub notify_failures: u64,
}

pub(crate) fn with_state_mut<T>(f: impl FnOnce(&mut MetricsReport) -> T) -> T {
    STATE.with(|cell| f(&mut cell.borrow_mut()))
}

pub(crate) fn snapshot() -> MetricsReport {
    STATE.with(|cell| cell.borrow().clone())
}

pub(crate) fn reset() {
    STATE.with(|cell| *cell.borrow_mut() = MetricsReport::default());
}
