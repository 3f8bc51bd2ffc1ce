//! The pipeline driver: the two named flows and their shared skeleton.

pub mod driver;

pub use driver::{compute_daily_aggregated_scores, daily_full_scan, hourly_rank_check, FlowOutcome, PipelineHandles};
