//! Metrics sink boundary.
//!
//! The global sink writes into thread-local counter state; tests install
//! a scoped override to observe events directly.

use crate::obs::metrics::{self, MetricsReport};
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = const { RefCell::new(None) };
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    RegistrationStart,
    RegistrationCreated,
    RegistrationReplayed,
    DuplicateConflict,
    LockContention,
    /// A stale lock token was overwritten rather than honoured.
    LockTakeover,
    DeletionStart,
    DeletionVerifiedClean,
    DeletionPhaseFailure,
    SummaryDelta {
        inserts: u64,
        removes: u64,
    },
    CredentialFanout {
        writes: u64,
        failures: u64,
    },
    ProbeReads {
        keys: u64,
    },
    NotifyFailure,
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default process-local sink that writes into the counter state.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        metrics::with_state_mut(|m| match event {
            MetricsEvent::RegistrationStart => {
                m.registrations_started = m.registrations_started.saturating_add(1);
            }
            MetricsEvent::RegistrationCreated => {
                m.registrations_created = m.registrations_created.saturating_add(1);
            }
            MetricsEvent::RegistrationReplayed => {
                m.registrations_replayed = m.registrations_replayed.saturating_add(1);
            }
            MetricsEvent::DuplicateConflict => {
                m.duplicate_conflicts = m.duplicate_conflicts.saturating_add(1);
            }
            MetricsEvent::LockContention => {
                m.lock_contention = m.lock_contention.saturating_add(1);
            }
            MetricsEvent::LockTakeover => {
                m.lock_takeovers = m.lock_takeovers.saturating_add(1);
            }
            MetricsEvent::DeletionStart => {
                m.deletions_started = m.deletions_started.saturating_add(1);
            }
            MetricsEvent::DeletionVerifiedClean => {
                m.deletions_verified_clean = m.deletions_verified_clean.saturating_add(1);
            }
            MetricsEvent::DeletionPhaseFailure => {
                m.deletion_phase_failures = m.deletion_phase_failures.saturating_add(1);
            }
            MetricsEvent::SummaryDelta { inserts, removes } => {
                m.summary_inserts = m.summary_inserts.saturating_add(inserts);
                m.summary_removes = m.summary_removes.saturating_add(removes);
            }
            MetricsEvent::CredentialFanout { writes, failures } => {
                m.credential_writes = m.credential_writes.saturating_add(writes);
                m.credential_write_failures = m.credential_write_failures.saturating_add(failures);
            }
            MetricsEvent::ProbeReads { keys } => {
                m.probe_reads = m.probe_reads.saturating_add(keys);
            }
            MetricsEvent::NotifyFailure => {
                m.notify_failures = m.notify_failures.saturating_add(1);
            }
        });
    }
}

pub(crate) fn record(event: MetricsEvent) {
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    if let Some(sink) = sink {
        sink.record(event);
    } else {
        GlobalMetricsSink.record(event);
    }
}

/// Snapshot the current counters for endpoint/test plumbing.
#[must_use]
pub fn metrics_report() -> MetricsReport {
    metrics::snapshot()
}

/// Reset all counters.
pub fn metrics_reset_all() {
    metrics::reset();
}

/// Run a closure with a temporary metrics sink override. The previous
/// override is restored on all exits, including unwind.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0.take();
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}
