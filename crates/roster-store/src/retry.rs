use crate::{KeyValueStore, StoreError};

///
/// RetryStore
///
/// Wraps an inner store and retries transient faults a fixed number of
/// times at the point of failure before surfacing the error. Non-transient
/// errors are never retried.
///

pub struct RetryStore<S> {
    inner: S,
    attempts: u32,
}

impl<S: KeyValueStore> RetryStore<S> {
    /// `attempts` is the total call budget per operation, minimum 1.
    #[must_use]
    pub fn new(inner: S, attempts: u32) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub const fn inner(&self) -> &S {
        &self.inner
    }

    fn run<T>(&self, mut call: impl FnMut(&S) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut last = None;
        for _ in 0..self.attempts {
            match call(&self.inner) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => last = Some(err),
                Err(err) => return Err(err),
            }
        }

        Err(last.unwrap_or_else(|| StoreError::unavailable("retry", "", "no attempts made")))
    }
}

impl<S: KeyValueStore> KeyValueStore for RetryStore<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.run(|s| s.get(key))
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.run(|s| s.set(key, value.clone()))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.run(|s| s.delete(key))
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.run(|s| s.list_keys(prefix))
    }
}
