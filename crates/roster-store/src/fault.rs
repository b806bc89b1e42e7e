use crate::{KeyValueStore, StoreError};
use std::sync::Mutex;

///
/// FaultKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FaultKind {
    /// The call fails with a transient `StoreError::Unavailable`.
    Unavailable,
    /// The call reports success but performs no mutation. Models a store
    /// that acknowledged a write it never applied; reads are unaffected.
    SilentDrop,
}

///
/// FaultRule
///
/// Matches calls whose key (or prefix, for `list_keys`) contains `pattern`.
/// A rule fires `remaining` times, then expires.
///

#[derive(Debug)]
pub struct FaultRule {
    pattern: String,
    kind: FaultKind,
    remaining: u32,
}

impl FaultRule {
    #[must_use]
    pub fn new(pattern: impl Into<String>, kind: FaultKind) -> Self {
        Self {
            pattern: pattern.into(),
            kind,
            remaining: 1,
        }
    }

    /// Fire for the next `n` matching calls instead of one.
    #[must_use]
    pub const fn times(mut self, n: u32) -> Self {
        self.remaining = n;
        self
    }
}

///
/// FaultStore
///
/// Test double wrapping a real store with scripted fault injection.
///

pub struct FaultStore<S> {
    inner: S,
    rules: Mutex<Vec<FaultRule>>,
}

impl<S: KeyValueStore> FaultStore<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            rules: Mutex::new(Vec::new()),
        }
    }

    pub fn push_rule(&self, rule: FaultRule) {
        self.rules
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(rule);
    }

    pub fn clear_rules(&self) {
        self.rules
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Consume the first live rule matching `key`, if any.
    fn fire(&self, key: &str) -> Option<FaultKind> {
        let mut rules = self
            .rules
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let rule = rules
            .iter_mut()
            .find(|r| r.remaining > 0 && key.contains(r.pattern.as_str()))?;
        rule.remaining -= 1;
        let kind = rule.kind;
        rules.retain(|r| r.remaining > 0);

        Some(kind)
    }
}

impl<S: KeyValueStore> KeyValueStore for FaultStore<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.fire(key) {
            Some(FaultKind::Unavailable) => Err(StoreError::unavailable("get", key, "injected")),
            // A dropped read behaves like a served read; nothing to drop.
            Some(FaultKind::SilentDrop) | None => self.inner.get(key),
        }
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        match self.fire(key) {
            Some(FaultKind::Unavailable) => Err(StoreError::unavailable("set", key, "injected")),
            Some(FaultKind::SilentDrop) => Ok(()),
            None => self.inner.set(key, value),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.fire(key) {
            Some(FaultKind::Unavailable) => Err(StoreError::unavailable("delete", key, "injected")),
            Some(FaultKind::SilentDrop) => Ok(()),
            None => self.inner.delete(key),
        }
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        match self.fire(prefix) {
            Some(FaultKind::Unavailable) => {
                Err(StoreError::unavailable("list_keys", prefix, "injected"))
            }
            Some(FaultKind::SilentDrop) | None => self.inner.list_keys(prefix),
        }
    }
}
