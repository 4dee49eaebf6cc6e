use crate::error::StateStoreError;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;

pub mod keys;
pub mod memory;
pub mod models;
pub mod sled_store;

/// Durable key-value store shared by every tick.
///
/// Expired entries behave exactly like absent ones for all operations.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError>;

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), StateStoreError>;

    async fn delete(&self, key: &str) -> Result<(), StateStoreError>;

    /// Atomically replaces the value at `key` if it currently equals
    /// `expected` (`None` meaning absent or expired). A `new` of `None`
    /// deletes. Returns whether the swap happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
        ttl: Option<Duration>,
    ) -> Result<bool, StateStoreError>;

    /// Live entries whose key starts with `prefix`, in key order.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StateStoreError>;
}

pub fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>, StateStoreError> {
    bincode::serialize(value).map_err(|e| StateStoreError::Encode {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

pub fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, StateStoreError> {
    bincode::deserialize(bytes).map_err(|e| StateStoreError::Decode {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Reads and decodes a typed value.
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, StateStoreError> {
    match store.get(key).await? {
        Some(bytes) => Ok(Some(decode(key, &bytes)?)),
        None => Ok(None),
    }
}

/// Encodes and writes a typed value.
pub async fn set_typed<T: Serialize>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), StateStoreError> {
    let bytes = encode(key, value)?;
    store.set(key, &bytes, ttl).await
}
