//! Notification boundary. Delivery is someone else's problem; the
//! runtime only dispatches events fire-and-forget. A failing sink is
//! counted and swallowed, never allowed to roll back registration or
//! block deletion.

use crate::{
    model::status::Status,
    obs::sink::{self, MetricsEvent},
    types::{EntityId, EntityType},
};
use std::sync::Mutex;
use thiserror::Error as ThisError;

///
/// NotifyError
///

#[derive(Clone, Debug, ThisError)]
#[error("notification delivery failed: {message}")]
pub struct NotifyError {
    pub message: String,
}

///
/// Notification
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Notification {
    Welcome {
        id: EntityId,
        entity_type: EntityType,
        name: String,
        email: String,
    },
    StatusChanged {
        id: EntityId,
        email: String,
        status: Status,
    },
    DeletionCompleted {
        id: EntityId,
        verified_clean: bool,
    },
}

///
/// NotificationSink
///

pub trait NotificationSink {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Dispatch fire-and-forget: errors are counted, never propagated.
pub(crate) fn dispatch(sink: &dyn NotificationSink, notification: &Notification) {
    if sink.notify(notification).is_err() {
        sink::record(MetricsEvent::NotifyFailure);
    }
}

///
/// NullSink
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

///
/// MemorySink
///
/// Test sink capturing dispatched notifications in order.
///

#[derive(Debug, Default)]
pub struct MemorySink {
    sent: Mutex<Vec<Notification>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(notification.clone());

        Ok(())
    }
}

///
/// FailingSink
///
/// Test sink that always errors; proves dispatch swallows failures.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct FailingSink;

impl NotificationSink for FailingSink {
    fn notify(&self, _: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError {
            message: "sink offline".to_string(),
        })
    }
}
