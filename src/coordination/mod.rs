pub mod cost_tracker;
pub mod dedup;
pub mod rate_limiter;
pub mod store;

pub use cost_tracker::CostTracker;
pub use dedup::DedupGate;
pub use rate_limiter::{Caps, RateLimiter};
pub use store::{CoordinationStore, InMemoryCoordinationStore};
