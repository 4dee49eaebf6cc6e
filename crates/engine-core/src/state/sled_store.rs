use crate::{
    error::StateStoreError,
    state::{KvStore, decode, encode, models::Envelope},
};
use async_trait::async_trait;
use chrono::Utc;
use sled::IVec;
use std::{path::Path, time::Duration};
use tracing::debug;

/// Sled-backed store. Values are wrapped in an [`Envelope`] and expiry is
/// enforced lazily on access.
pub struct SledKvStore {
    db: sled::Db,
}

impl SledKvStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Decodes a raw entry, returning `None` for expired ones.
    fn live_value(key: &str, raw: &IVec) -> Result<Option<Vec<u8>>, StateStoreError> {
        let envelope: Envelope = decode(key, raw)?;
        if envelope.is_expired(Utc::now()) {
            Ok(None)
        } else {
            Ok(Some(envelope.value))
        }
    }

    fn wrap(key: &str, value: &[u8], ttl: Option<Duration>) -> Result<Vec<u8>, StateStoreError> {
        encode(key, &Envelope::new(value, ttl))
    }
}

#[async_trait]
impl KvStore for SledKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError> {
        let Some(raw) = self.db.get(key)? else {
            return Ok(None);
        };

        match Self::live_value(key, &raw)? {
            Some(value) => Ok(Some(value)),
            None => {
                // Only drop the entry if nobody rewrote it in the meantime.
                let _ = self.db.compare_and_swap(key, Some(raw), None::<IVec>)?;
                debug!(key, "Evicted expired entry");
                Ok(None)
            }
        }
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), StateStoreError> {
        let raw = Self::wrap(key, value, ttl)?;
        self.db.insert(key, raw)?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StateStoreError> {
        self.db.remove(key)?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
        ttl: Option<Duration>,
    ) -> Result<bool, StateStoreError> {
        let current_raw = self.db.get(key)?;
        let current = match &current_raw {
            Some(raw) => Self::live_value(key, raw)?,
            None => None,
        };

        if current.as_deref() != expected {
            return Ok(false);
        }

        let new_raw = new.map(|value| Self::wrap(key, value, ttl)).transpose()?;

        // The swap is against the raw bytes we just inspected, so a writer
        // that slipped in between makes this fail instead of being overwritten.
        match self.db.compare_and_swap(key, current_raw, new_raw)? {
            Ok(()) => {
                self.db.flush_async().await?;
                Ok(true)
            }
            Err(_) => {
                debug!(key, "Lost compare-and-swap race");
                Ok(false)
            }
        }
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StateStoreError> {
        let mut entries = Vec::new();

        for item in self.db.scan_prefix(prefix) {
            let (raw_key, raw) = item?;
            let key = String::from_utf8_lossy(&raw_key).into_owned();
            if let Some(value) = Self::live_value(&key, &raw)? {
                entries.push((key, value));
            }
        }

        Ok(entries)
    }
}
