use crate::{KeyValueStore, MAX_VALUE_BYTES, StoreError};
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

///
/// MemoryStore
///
/// BTreeMap-backed store. Keys are kept ordered so prefix listing is a
/// range scan rather than a full sweep.
///

#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Sum of bytes used by all stored values.
    pub fn memory_bytes(&self) -> u64 {
        self.lock()
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A poisoned map means a writer panicked mid-call; the map itself is
        // still structurally valid, so keep serving reads and writes.
        self.map.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        validate_key(key)?;

        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        validate_key(key)?;
        if value.len() > MAX_VALUE_BYTES {
            return Err(StoreError::ValueTooLarge { len: value.len() });
        }

        self.lock().insert(key.to_string(), value);

        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.lock().remove(key);

        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let map = self.lock();
        let keys = map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();

        Ok(keys)
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey {
            message: "empty key".to_string(),
        });
    }

    Ok(())
}
