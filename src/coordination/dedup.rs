//! Dedup-key probe/set, sharing the coordination store with the rate
//! limiter and cost tracker.

use std::sync::Arc;
use std::time::Duration;

use crate::coordination::store::CoordinationStore;
use crate::errors::CoordinationError;
use crate::models::Platform;

pub const DEDUP_TTL: Duration = Duration::from_secs(6 * 3600);

fn key_for(query_id: i64, platform: Platform) -> String {
    format!("dedup:{query_id}:{}", platform.as_str())
}

pub struct DedupGate {
    store: Arc<dyn CoordinationStore>,
}

impl DedupGate {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    pub fn was_recently_scraped(
        &self,
        query_id: i64,
        platform: Platform,
    ) -> Result<bool, CoordinationError> {
        self.store.exists(&key_for(query_id, platform))
    }

    pub fn mark_scraped(
        &self,
        query_id: i64,
        platform: Platform,
    ) -> Result<(), CoordinationError> {
        self.store
            .set(&key_for(query_id, platform), "1", Some(DEDUP_TTL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::store::InMemoryCoordinationStore;

    #[test]
    fn mark_then_probe() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryCoordinationStore::new());
        let gate = DedupGate::new(store);
        assert!(!gate.was_recently_scraped(1, Platform::Chatgpt).unwrap());
        gate.mark_scraped(1, Platform::Chatgpt).unwrap();
        assert!(gate.was_recently_scraped(1, Platform::Chatgpt).unwrap());
        assert!(!gate.was_recently_scraped(1, Platform::Perplexity).unwrap());
    }
}
