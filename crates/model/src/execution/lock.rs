use crate::core::{entity::Entity, identifiers::RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Mutual-exclusion marker for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLock {
    pub entity: Entity,
    pub holder_token: RunId,
    pub acquired_at: DateTime<Utc>,
    pub ttl_ms: u64,
    pub expires_at: DateTime<Utc>,
    /// Set while a tick of the holder is executing, cleared on renew.
    pub in_tick: bool,
}

impl RunLock {
    pub fn new(entity: Entity, holder_token: RunId, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            entity,
            holder_token,
            acquired_at: now,
            ttl_ms: ttl.as_millis().min(u64::MAX as u128) as u64,
            expires_at: expiry(now, ttl),
            in_tick: true,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn is_held_by(&self, run_id: &RunId) -> bool {
        &self.holder_token == run_id
    }

    pub fn extended(&self, ttl: Duration, in_tick: bool) -> Self {
        Self {
            ttl_ms: ttl.as_millis().min(u64::MAX as u128) as u64,
            expires_at: expiry(Utc::now(), ttl),
            in_tick,
            ..self.clone()
        }
    }
}

fn expiry(from: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| from.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
