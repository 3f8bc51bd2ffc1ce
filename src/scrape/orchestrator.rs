//! Scrape Orchestrator (C5): expands queries × platforms into bounded-
//! concurrency tasks and aggregates their outcomes.
//!
//! Each task is spawned independently on the runtime and joined back into
//! one aggregated result after every task settles, rather than mutating a
//! shared result object from concurrent tasks — avoiding a shared mutex on
//! the hot path while matching the host codebase's own pattern of spawning
//! independent units and merging afterward.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::content::Processed;
use crate::coordination::{CoordinationStore, DedupGate, RateLimiter};
use crate::models::{truncate_detail, Platform};
use crate::scrape::scraper::Scraper;

const RATE_LIMIT_WAIT_TIMEOUT: Duration = Duration::from_secs(120);
const PER_PLATFORM_CONCURRENCY: usize = 3;

#[derive(Debug, Clone)]
pub struct ScrapeFailure {
    pub query_id: i64,
    pub query_text: String,
    pub platform: Platform,
    pub error_kind: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ScrapeSuccess {
    pub query_id: i64,
    pub platform: Platform,
    pub processed: Processed,
}

#[derive(Debug, Clone, Default)]
pub struct OrchestratorResult {
    pub successes: Vec<ScrapeSuccess>,
    pub failures: Vec<ScrapeFailure>,
    pub skipped_dedup: u32,
    pub skipped_rate_limit: u32,
}

/// One `{query_id, query_text, brands}` input to the orchestrator.
#[derive(Debug, Clone)]
pub struct ScrapeTarget {
    pub query_id: i64,
    pub query_text: String,
}

enum TaskOutcome {
    Success(ScrapeSuccess),
    Failure(ScrapeFailure),
    SkippedDedup,
    SkippedRateLimit,
}

pub struct Orchestrator {
    scrapers: HashMap<Platform, Arc<dyn Scraper>>,
    rate_limiter: Arc<RateLimiter>,
    dedup: Arc<DedupGate>,
    semaphores: HashMap<Platform, Arc<Semaphore>>,
}

impl Orchestrator {
    /// The per-platform semaphore set is built eagerly for every known
    /// platform here, not lazily per task, so concurrent tasks never race
    /// on map insertion.
    pub fn new(
        scrapers: HashMap<Platform, Arc<dyn Scraper>>,
        coordination_store: Arc<dyn CoordinationStore>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        let semaphores = Platform::ALL
            .iter()
            .map(|&p| (p, Arc::new(Semaphore::new(PER_PLATFORM_CONCURRENCY))))
            .collect();
        Self {
            scrapers,
            rate_limiter,
            dedup: Arc::new(DedupGate::new(coordination_store)),
            semaphores,
        }
    }

    pub async fn run(&self, targets: &[ScrapeTarget], platforms: &[Platform]) -> OrchestratorResult {
        let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();

        for target in targets {
            for &platform in platforms {
                let Some(scraper) = self.scrapers.get(&platform).cloned() else {
                    continue;
                };
                let semaphore = self.semaphores.get(&platform).expect("eager semaphore set").clone();
                let dedup = self.dedup.clone();
                let rate_limiter = self.rate_limiter.clone();
                let query_id = target.query_id;
                let query_text = target.query_text.clone();

                tasks.spawn(async move {
                    run_one_task(scraper, dedup, rate_limiter, semaphore, query_id, query_text, platform)
                        .await
                });
            }
        }

        let mut result = OrchestratorResult::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => apply_outcome(&mut result, outcome),
                Err(_) => {
                    // A task panicked or was cancelled; neither prevents the
                    // remaining tasks from proceeding.
                }
            }
        }
        result
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_one_task(
    scraper: Arc<dyn Scraper>,
    dedup: Arc<DedupGate>,
    rate_limiter: Arc<RateLimiter>,
    semaphore: Arc<Semaphore>,
    query_id: i64,
    query_text: String,
    platform: Platform,
) -> TaskOutcome {
    match dedup.was_recently_scraped(query_id, platform) {
        Ok(true) => {
            crate::metrics::record_dedup_skip(platform.as_str());
            return TaskOutcome::SkippedDedup;
        }
        Ok(false) => {}
        Err(e) => {
            return TaskOutcome::Failure(ScrapeFailure {
                query_id,
                query_text,
                platform,
                error_kind: "coordination".to_string(),
                detail: truncate_detail(&e.to_string()),
                timestamp: Utc::now(),
            })
        }
    }

    match rate_limiter.wait_and_acquire(platform, RATE_LIMIT_WAIT_TIMEOUT).await {
        Ok(true) => {}
        Ok(false) => {
            crate::metrics::record_rate_limit_skip(platform.as_str());
            return TaskOutcome::SkippedRateLimit;
        }
        Err(e) => {
            return TaskOutcome::Failure(ScrapeFailure {
                query_id,
                query_text,
                platform,
                error_kind: "coordination".to_string(),
                detail: truncate_detail(&e.to_string()),
                timestamp: Utc::now(),
            })
        }
    }

    let _permit = semaphore.acquire().await.expect("semaphore never closed");

    let started = std::time::Instant::now();
    let outcome = scraper.scrape(query_id, &query_text).await;
    crate::metrics::record_scrape_duration(platform.as_str(), started.elapsed().as_millis() as f64);

    match outcome {
        Ok(processed) => {
            if let Err(e) = dedup.mark_scraped(query_id, platform) {
                tracing::warn!(error = %e, "failed to set dedup key after successful scrape");
            }
            crate::metrics::record_scrape_success(platform.as_str());
            TaskOutcome::Success(ScrapeSuccess {
                query_id,
                platform,
                processed,
            })
        }
        Err(e) => {
            crate::metrics::record_scrape_failure(platform.as_str(), e.kind_str());
            TaskOutcome::Failure(ScrapeFailure {
                query_id,
                query_text,
                platform,
                error_kind: e.kind_str().to_string(),
                detail: truncate_detail(&e.to_string()),
                timestamp: Utc::now(),
            })
        }
    }
}

fn apply_outcome(result: &mut OrchestratorResult, outcome: TaskOutcome) {
    match outcome {
        TaskOutcome::Success(s) => result.successes.push(s),
        TaskOutcome::Failure(f) => result.failures.push(f),
        TaskOutcome::SkippedDedup => result.skipped_dedup += 1,
        TaskOutcome::SkippedRateLimit => result.skipped_rate_limit += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::store::InMemoryCoordinationStore;
    use crate::coordination::rate_limiter::Caps;
    use crate::errors::ScrapeError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubScraper {
        platform: Platform,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Scraper for StubScraper {
        fn platform_tag(&self) -> &'static str {
            self.platform.as_str()
        }

        fn build_search_url(&self, _query_text: &str) -> String {
            "https://example.com".to_string()
        }

        async fn scrape(&self, _query_id: i64, _query_text: &str) -> Result<Processed, ScrapeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ScrapeError::Transport("boom".to_string()))
            } else {
                Ok(Processed {
                    clean_text: "clean".to_string(),
                    sha256: "abc".to_string(),
                    char_count: 5,
                    url: "https://example.com".to_string(),
                    status: 200,
                    ts: Utc::now(),
                    duration_ms: 1,
                    snapshot_id: Some("snap-1".to_string()),
                })
            }
        }
    }

    fn caps(n: u32) -> Caps {
        Caps {
            chatgpt: n,
            perplexity: n,
            google_ai: n,
        }
    }

    #[tokio::test]
    async fn dedup_skips_a_repeat_query_platform() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryCoordinationStore::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let mut scrapers: HashMap<Platform, Arc<dyn Scraper>> = HashMap::new();
        scrapers.insert(
            Platform::Chatgpt,
            Arc::new(StubScraper {
                platform: Platform::Chatgpt,
                calls: calls.clone(),
                fail: false,
            }),
        );

        let rate_limiter = Arc::new(RateLimiter::new(store.clone(), caps(10)));
        let orchestrator = Orchestrator::new(scrapers, store.clone(), rate_limiter);

        let targets = vec![ScrapeTarget {
            query_id: 1,
            query_text: "best air purifier".to_string(),
        }];

        let first = orchestrator.run(&targets, &[Platform::Chatgpt]).await;
        assert_eq!(first.successes.len(), 1);
        assert_eq!(first.skipped_dedup, 0);

        let second = orchestrator.run(&targets, &[Platform::Chatgpt]).await;
        assert_eq!(second.successes.len(), 0);
        assert_eq!(second.skipped_dedup, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limit_exhaustion_is_skipped_not_failed() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryCoordinationStore::new());
        let mut scrapers: HashMap<Platform, Arc<dyn Scraper>> = HashMap::new();
        scrapers.insert(
            Platform::Chatgpt,
            Arc::new(StubScraper {
                platform: Platform::Chatgpt,
                calls: Arc::new(AtomicUsize::new(0)),
                fail: false,
            }),
        );

        let rate_limiter = Arc::new(
            RateLimiter::new(store.clone(), caps(0)).with_poll_interval(Duration::from_millis(10)),
        );
        let orchestrator = Orchestrator::new(scrapers, store, rate_limiter);

        let targets = vec![ScrapeTarget {
            query_id: 1,
            query_text: "best air purifier".to_string(),
        }];
        let result = orchestrator.run(&targets, &[Platform::Chatgpt]).await;
        assert_eq!(result.successes.len(), 0);
        assert_eq!(result.skipped_rate_limit, 1);
    }

    #[tokio::test]
    async fn a_failing_task_does_not_block_others() {
        let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryCoordinationStore::new());
        let mut scrapers: HashMap<Platform, Arc<dyn Scraper>> = HashMap::new();
        scrapers.insert(
            Platform::Chatgpt,
            Arc::new(StubScraper {
                platform: Platform::Chatgpt,
                calls: Arc::new(AtomicUsize::new(0)),
                fail: true,
            }),
        );
        scrapers.insert(
            Platform::Perplexity,
            Arc::new(StubScraper {
                platform: Platform::Perplexity,
                calls: Arc::new(AtomicUsize::new(0)),
                fail: false,
            }),
        );

        let rate_limiter = Arc::new(RateLimiter::new(store.clone(), caps(10)));
        let orchestrator = Orchestrator::new(scrapers, store, rate_limiter);

        let targets = vec![ScrapeTarget {
            query_id: 1,
            query_text: "best air purifier".to_string(),
        }];
        let result = orchestrator
            .run(&targets, &[Platform::Chatgpt, Platform::Perplexity])
            .await;
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.successes.len(), 1);
    }
}
