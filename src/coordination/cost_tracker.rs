//! Daily cumulative cost counter with budget predicate (C2).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::coordination::store::CoordinationStore;
use crate::errors::CoordinationError;

const TTL_HOURS: u64 = 48;

fn today_key() -> String {
    format!("cost:daily:{}", Utc::now().format("%Y-%m-%d"))
}

pub struct CostTracker {
    store: Arc<dyn CoordinationStore>,
    budget_usd: f64,
}

impl CostTracker {
    pub fn new(store: Arc<dyn CoordinationStore>, budget_usd: f64) -> Self {
        Self { store, budget_usd }
    }

    /// Adds `amount` to today's cumulative total, returning the new total.
    /// Rejects negative amounts; sets the 48h TTL only if not already set.
    pub fn add(&self, amount: f64) -> Result<f64, CoordinationError> {
        if amount < 0.0 {
            return Err(CoordinationError::Unavailable(
                "cost amount must be non-negative".to_string(),
            ));
        }
        let key = today_key();
        let total = self.store.incr_by_float(&key, amount)?;
        self.store
            .set_nx_ttl(&key, Duration::from_secs(TTL_HOURS * 3600))?;
        Ok(total)
    }

    pub fn today(&self) -> Result<f64, CoordinationError> {
        let key = today_key();
        Ok(self
            .store
            .get(&key)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0))
    }

    pub fn is_budget_exceeded(&self) -> Result<bool, CoordinationError> {
        Ok(self.today()? >= self.budget_usd)
    }

    pub fn remaining_budget(&self) -> Result<f64, CoordinationError> {
        let remaining = self.budget_usd - self.today()?;
        Ok((remaining.max(0.0) * 10000.0).round() / 10000.0)
    }

    pub fn reset_today(&self) -> Result<(), CoordinationError> {
        self.store.delete(&today_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::store::InMemoryCoordinationStore;

    fn tracker(budget: f64) -> CostTracker {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryCoordinationStore::new());
        CostTracker::new(store, budget)
    }

    #[test]
    fn add_rejects_negative() {
        let t = tracker(10.0);
        assert!(t.add(-1.0).is_err());
    }

    #[test]
    fn add_accumulates_and_never_decreases() {
        let t = tracker(10.0);
        assert_eq!(t.add(2.5).unwrap(), 2.5);
        assert_eq!(t.add(1.5).unwrap(), 4.0);
        assert_eq!(t.today().unwrap(), 4.0);
    }

    #[test]
    fn budget_exceeded_at_threshold() {
        let t = tracker(10.0);
        t.add(10.0).unwrap();
        assert!(t.is_budget_exceeded().unwrap());
    }

    /// S5 precondition: a tracker primed above budget reports exceeded and
    /// a remaining_budget floored at zero.
    fn s5_primed_tracker(budget: f64) -> CostTracker {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryCoordinationStore::new());
        let t = CostTracker::new(store, budget);
        t.add(100.0).unwrap();
        t
    }

    #[test]
    fn s5_cost_halt_precondition() {
        let t = s5_primed_tracker(10.0);
        assert!(t.is_budget_exceeded().unwrap());
        assert_eq!(t.remaining_budget().unwrap(), 0.0);
        assert_eq!(t.today().unwrap(), 100.0);
    }
}
