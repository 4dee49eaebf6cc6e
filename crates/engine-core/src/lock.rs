//! Single-flight execution per entity.
//!
//! The lock is re-entrant across ticks of the same run, but a second tick of
//! that run arriving while the first is still executing is turned away, which
//! covers a driver that retries before its previous call returned.

use crate::{
    error::StateStoreError,
    state::{KvStore, decode, encode, keys},
};
use chrono::Utc;
use model::{
    core::{entity::Entity, identifiers::RunId},
    execution::lock::RunLock,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn KvStore>,
}

impl LockManager {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Takes the lock for `run_id`. Returns `false`, leaving the store
    /// untouched, when another run holds it or a tick of this run is in
    /// flight.
    pub async fn acquire(
        &self,
        entity: Entity,
        run_id: &RunId,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        let key = keys::lock(entity);
        let current = self.current(&key).await?;

        let next = match &current {
            None => RunLock::new(entity, run_id.clone(), ttl),
            Some((_, lock)) if !lock.is_live(Utc::now()) => {
                info!(
                    entity = %entity,
                    previous = %lock.holder_token,
                    run_id = %run_id,
                    "Taking over expired lock"
                );
                RunLock::new(entity, run_id.clone(), ttl)
            }
            Some((_, lock)) if lock.is_held_by(run_id) && !lock.in_tick => {
                lock.extended(ttl, true)
            }
            Some((_, lock)) => {
                debug!(
                    entity = %entity,
                    holder = %lock.holder_token,
                    requested_by = %run_id,
                    in_tick = lock.in_tick,
                    "Lock is held"
                );
                return Ok(false);
            }
        };

        let expected = current.as_ref().map(|(raw, _)| raw.as_slice());
        let acquired = self
            .store
            .compare_and_swap(&key, expected, Some(&encode(&key, &next)?), Some(ttl))
            .await?;

        if acquired {
            debug!(entity = %entity, run_id = %run_id, "Lock acquired");
        } else {
            debug!(entity = %entity, run_id = %run_id, "Lost lock race");
        }
        Ok(acquired)
    }

    /// Extends the TTL of a lock held by `run_id` and marks its tick done.
    /// A lock that lapsed during a slow tick is revived as long as nobody
    /// else took it.
    pub async fn renew(
        &self,
        entity: Entity,
        run_id: &RunId,
        ttl: Duration,
    ) -> Result<bool, StateStoreError> {
        let key = keys::lock(entity);
        let Some((raw, lock)) = self.current(&key).await? else {
            warn!(entity = %entity, run_id = %run_id, "Lock vanished before renewal");
            return Ok(false);
        };

        if !lock.is_held_by(run_id) {
            warn!(
                entity = %entity,
                run_id = %run_id,
                holder = %lock.holder_token,
                "Lock taken over before renewal"
            );
            return Ok(false);
        }

        let next = lock.extended(ttl, false);
        self.store
            .compare_and_swap(&key, Some(&raw), Some(&encode(&key, &next)?), Some(ttl))
            .await
    }

    /// Drops the lock if `run_id` holds it. No-op otherwise.
    pub async fn release(&self, entity: Entity, run_id: &RunId) -> Result<(), StateStoreError> {
        let key = keys::lock(entity);
        if let Some((raw, lock)) = self.current(&key).await?
            && lock.is_held_by(run_id)
        {
            if self
                .store
                .compare_and_swap(&key, Some(&raw), None, None)
                .await?
            {
                info!(entity = %entity, run_id = %run_id, "Lock released");
            }
        }
        Ok(())
    }

    /// Like [`release`](Self::release), but leaves a lock whose tick is
    /// still in flight. Returns `false` when the lock was left in place.
    pub async fn release_idle(
        &self,
        entity: Entity,
        run_id: &RunId,
    ) -> Result<bool, StateStoreError> {
        let key = keys::lock(entity);
        let Some((raw, lock)) = self.current(&key).await? else {
            return Ok(true);
        };
        if !lock.is_held_by(run_id) {
            return Ok(true);
        }
        if lock.in_tick && lock.is_live(Utc::now()) {
            debug!(entity = %entity, run_id = %run_id, "Lock busy with a tick, not released");
            return Ok(false);
        }

        let released = self
            .store
            .compare_and_swap(&key, Some(&raw), None, None)
            .await?;
        if released {
            info!(entity = %entity, run_id = %run_id, "Lock released");
        }
        Ok(released)
    }

    /// Drops the lock whoever holds it.
    pub async fn force_release(&self, entity: Entity) -> Result<(), StateStoreError> {
        warn!(entity = %entity, "Force-releasing lock");
        self.store.delete(&keys::lock(entity)).await
    }

    /// The live lock for `entity`, if any.
    pub async fn holder(&self, entity: Entity) -> Result<Option<RunLock>, StateStoreError> {
        Ok(self
            .current(&keys::lock(entity))
            .await?
            .map(|(_, lock)| lock)
            .filter(|lock| lock.is_live(Utc::now())))
    }

    /// Stored lock with its raw bytes, live or not, for compare-and-swap.
    async fn current(&self, key: &str) -> Result<Option<(Vec<u8>, RunLock)>, StateStoreError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        let lock: RunLock = decode(key, &raw)?;
        Ok(Some((raw, lock)))
    }
}
