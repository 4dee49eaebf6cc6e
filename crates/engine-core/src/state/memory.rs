use crate::{
    error::StateStoreError,
    state::{KvStore, models::Envelope},
};
use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

/// Process-local store for tests and dry runs. Not durable.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<BTreeMap<String, Envelope>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Envelope>>, StateStoreError> {
        self.entries
            .lock()
            .map_err(|_| StateStoreError::Backend("memory store mutex poisoned".into()))
    }

    fn live<'a>(entries: &'a BTreeMap<String, Envelope>, key: &str) -> Option<&'a Envelope> {
        entries
            .get(key)
            .filter(|envelope| !envelope.is_expired(Utc::now()))
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError> {
        let entries = self.lock()?;
        Ok(Self::live(&entries, key).map(|envelope| envelope.value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), StateStoreError> {
        self.lock()?
            .insert(key.to_string(), Envelope::new(value, ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StateStoreError> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
        ttl: Option<Duration>,
    ) -> Result<bool, StateStoreError> {
        let mut entries = self.lock()?;
        let current = Self::live(&entries, key).map(|envelope| envelope.value.as_slice());
        if current != expected {
            return Ok(false);
        }

        match new {
            Some(value) => {
                entries.insert(key.to_string(), Envelope::new(value, ttl));
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(true)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StateStoreError> {
        let entries = self.lock()?;
        let now = Utc::now();
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, envelope)| !envelope.is_expired(now))
            .map(|(key, envelope)| (key.clone(), envelope.value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn compare_and_swap_is_exclusive() {
        let store = MemoryKvStore::new();
        assert!(store.compare_and_swap("k", None, Some(b"a"), None).await.unwrap());
        assert!(!store.compare_and_swap("k", None, Some(b"b"), None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"a".to_vec()));
    }

    #[tokio::test]
    async fn ttl_expiry() {
        let store = MemoryKvStore::new();
        store
            .set("k", b"v", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.scan_prefix("k").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scan_prefix_is_ordered() {
        let store = MemoryKvStore::new();
        store.set("a:2", b"2", None).await.unwrap();
        store.set("a:1", b"1", None).await.unwrap();
        store.set("b:1", b"x", None).await.unwrap();

        let keys: Vec<_> = store
            .scan_prefix("a:")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["a:1".to_string(), "a:2".to_string()]);
    }
}
