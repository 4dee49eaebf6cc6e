use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// On-disk wrapper adding an optional expiry to a stored value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Envelope {
    pub expires_at: Option<DateTime<Utc>>,
    pub value: Vec<u8>,
}

impl Envelope {
    pub fn new(value: &[u8], ttl: Option<Duration>) -> Self {
        Self {
            expires_at: ttl
                .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
                .and_then(|ttl| Utc::now().checked_add_signed(ttl)),
            value: value.to_vec(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_without_ttl_never_expires() {
        let env = Envelope::new(b"v", None);
        assert!(!env.is_expired(Utc::now() + chrono::Duration::days(3650)));
    }

    #[test]
    fn envelope_with_ttl_expires() {
        let env = Envelope::new(b"v", Some(Duration::from_secs(5)));
        assert!(!env.is_expired(Utc::now()));
        assert!(env.is_expired(Utc::now() + chrono::Duration::seconds(6)));
    }
}
