//! Coordination store: the small interface the rate limiter, cost tracker,
//! and dedup map are all expressed against. Grounded on the sliding-window
//! admission pattern in the codebase's own per-IP rate-limit middleware,
//! generalized from a single hardcoded `HashMap<IpAddr, _>` into a trait so
//! a networked implementation (e.g. Redis) could be substituted without
//! touching any caller.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::errors::CoordinationError;

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// The minimal coordination-store contract: scalar get/set with TTL,
/// float increment, and a sorted set supporting range-remove, cardinality,
/// and add. Any store meeting this interface suffices for the rate
/// limiter, cost tracker, and dedup map.
pub trait CoordinationStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CoordinationError>;
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CoordinationError>;
    fn set_nx_ttl(&self, key: &str, ttl: Duration) -> Result<(), CoordinationError>;
    fn delete(&self, key: &str) -> Result<(), CoordinationError>;
    fn exists(&self, key: &str) -> Result<bool, CoordinationError>;
    fn ttl(&self, key: &str) -> Result<Option<Duration>, CoordinationError>;
    fn incr_by_float(&self, key: &str, amount: f64) -> Result<f64, CoordinationError>;

    /// Removes sorted-set members with score < `min_score`.
    fn zremrangebyscore(&self, key: &str, min_score: f64) -> Result<(), CoordinationError>;
    fn zcard(&self, key: &str) -> Result<usize, CoordinationError>;
    fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), CoordinationError>;
    fn expire(&self, key: &str, ttl: Duration) -> Result<(), CoordinationError>;
}

#[derive(Clone)]
struct Scalar {
    value: String,
    expires_at: Option<f64>,
}

#[derive(Clone, Default)]
struct SortedSet {
    members: Vec<(String, f64)>,
    expires_at: Option<f64>,
}

/// In-process implementation backed by a mutex-guarded map. No external
/// coordination service is part of this core's dependency surface (see
/// SPEC_FULL.md §9); this stands in for one without changing the trait
/// boundary callers use.
#[derive(Default)]
pub struct InMemoryCoordinationStore {
    scalars: Mutex<HashMap<String, Scalar>>,
    sorted_sets: Mutex<HashMap<String, SortedSet>>,
}

impl InMemoryCoordinationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn scalar_live(entry: &Scalar, now: f64) -> bool {
        match entry.expires_at {
            None => true,
            Some(exp) => exp > now,
        }
    }
}

impl CoordinationStore for InMemoryCoordinationStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoordinationError> {
        let now = now_secs();
        let mut scalars = self.scalars.lock();
        if let Some(entry) = scalars.get(key) {
            if Self::scalar_live(entry, now) {
                return Ok(Some(entry.value.clone()));
            }
            scalars.remove(key);
        }
        Ok(None)
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CoordinationError> {
        let expires_at = ttl.map(|d| now_secs() + d.as_secs_f64());
        self.scalars.lock().insert(
            key.to_string(),
            Scalar {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    fn set_nx_ttl(&self, key: &str, ttl: Duration) -> Result<(), CoordinationError> {
        let now = now_secs();
        let mut scalars = self.scalars.lock();
        let already_live = scalars.get(key).is_some_and(|e| Self::scalar_live(e, now));
        if !already_live {
            scalars.insert(
                key.to_string(),
                Scalar {
                    value: String::new(),
                    expires_at: Some(now + ttl.as_secs_f64()),
                },
            );
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CoordinationError> {
        self.scalars.lock().remove(key);
        self.sorted_sets.lock().remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, CoordinationError> {
        Ok(self.get(key)?.is_some())
    }

    fn ttl(&self, key: &str) -> Result<Option<Duration>, CoordinationError> {
        let now = now_secs();
        let scalars = self.scalars.lock();
        Ok(scalars.get(key).and_then(|e| {
            e.expires_at
                .map(|exp| Duration::from_secs_f64((exp - now).max(0.0)))
        }))
    }

    fn incr_by_float(&self, key: &str, amount: f64) -> Result<f64, CoordinationError> {
        if amount < 0.0 {
            return Err(CoordinationError::Unavailable(
                "negative increment rejected".to_string(),
            ));
        }
        let now = now_secs();
        let mut scalars = self.scalars.lock();
        let entry = scalars.entry(key.to_string()).or_insert(Scalar {
            value: "0".to_string(),
            expires_at: None,
        });
        if !Self::scalar_live(entry, now) {
            entry.value = "0".to_string();
            entry.expires_at = None;
        }
        let current: f64 = entry.value.parse().unwrap_or(0.0);
        let updated = current + amount;
        entry.value = updated.to_string();
        Ok(updated)
    }

    fn zremrangebyscore(&self, key: &str, min_score: f64) -> Result<(), CoordinationError> {
        let mut sets = self.sorted_sets.lock();
        if let Some(set) = sets.get_mut(key) {
            set.members.retain(|(_, score)| *score >= min_score);
        }
        Ok(())
    }

    fn zcard(&self, key: &str) -> Result<usize, CoordinationError> {
        let now = now_secs();
        let mut sets = self.sorted_sets.lock();
        if let Some(set) = sets.get(key) {
            if set.expires_at.is_some_and(|exp| exp <= now) {
                sets.remove(key);
                return Ok(0);
            }
            return Ok(set.members.len());
        }
        Ok(0)
    }

    fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), CoordinationError> {
        let mut sets = self.sorted_sets.lock();
        let set = sets.entry(key.to_string()).or_default();
        set.members.push((member.to_string(), score));
        Ok(())
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<(), CoordinationError> {
        let expires_at = Some(now_secs() + ttl.as_secs_f64());
        let mut sets = self.sorted_sets.lock();
        if let Some(set) = sets.get_mut(key) {
            set.expires_at = expires_at;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_set_get_roundtrip() {
        let store = InMemoryCoordinationStore::new();
        store.set("k", "v", None).unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn set_nx_ttl_only_sets_when_absent() {
        let store = InMemoryCoordinationStore::new();
        store.set_nx_ttl("cost:daily:x", Duration::from_secs(100)).unwrap();
        let first_ttl = store.ttl("cost:daily:x").unwrap().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.set_nx_ttl("cost:daily:x", Duration::from_secs(999)).unwrap();
        let second_ttl = store.ttl("cost:daily:x").unwrap().unwrap();
        assert!(second_ttl <= first_ttl);
    }

    #[test]
    fn incr_by_float_rejects_negative() {
        let store = InMemoryCoordinationStore::new();
        assert!(store.incr_by_float("c", -1.0).is_err());
    }

    #[test]
    fn zadd_and_zcard() {
        let store = InMemoryCoordinationStore::new();
        store.zadd("rl:chatgpt", "1:a", 1.0).unwrap();
        store.zadd("rl:chatgpt", "2:b", 2.0).unwrap();
        assert_eq!(store.zcard("rl:chatgpt").unwrap(), 2);
        store.zremrangebyscore("rl:chatgpt", 1.5).unwrap();
        assert_eq!(store.zcard("rl:chatgpt").unwrap(), 1);
    }
}
