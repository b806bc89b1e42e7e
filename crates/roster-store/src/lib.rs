//! Primitive key-value contract for Roster: string keys, byte values,
//! get/set/delete and prefix listing. No multi-key atomicity, no
//! transactions, no TTL; everything above this crate layers its own
//! consistency on top.

mod error;
mod fault;
mod memory;
mod retry;

pub use error::StoreError;
pub use fault::{FaultKind, FaultRule, FaultStore};
pub use memory::MemoryStore;
pub use retry::RetryStore;

/// Maximum serialized bytes for a single stored value to keep loads bounded.
pub const MAX_VALUE_BYTES: usize = 4 * 1024 * 1024;

///
/// KeyValueStore
///
/// The external store contract the runtime is written against. Implementors
/// provide per-call durability only; callers must not assume any two calls
/// are atomic together.
///

pub trait KeyValueStore {
    /// Read a value; `None` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write a value, replacing any previous value for the key.
    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Remove a key. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List all keys beginning with `prefix`, in unspecified order.
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

// A shared reference is itself a store, so wrappers can borrow instead
// of owning.
impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).list_keys(prefix)
    }
}
