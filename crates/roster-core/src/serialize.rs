//! Store value codec. Every value persisted by this crate is CBOR.

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error as ThisError;

///
/// SerializeError
///

#[derive(Debug, ThisError)]
pub enum SerializeError {
    #[error("serialize error: {0}")]
    Serialize(String),
    #[error("deserialize error: {0}")]
    Deserialize(String),
}

/// Serialize a value into store bytes.
pub fn serialize<T>(value: &T) -> Result<Vec<u8>, SerializeError>
where
    T: Serialize,
{
    serde_cbor::to_vec(value).map_err(|err| SerializeError::Serialize(err.to_string()))
}

/// Deserialize a value produced by [`serialize`].
pub fn deserialize<T>(bytes: &[u8]) -> Result<T, SerializeError>
where
    T: DeserializeOwned,
{
    serde_cbor::from_slice(bytes).map_err(|err| SerializeError::Deserialize(err.to_string()))
}
