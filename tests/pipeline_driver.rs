//! End-to-end driver tests against an in-memory database and a stub
//! scraper registry, exercising the two finalization paths a run can take.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use visibility_pipeline::config::Config;
use visibility_pipeline::content::Processed;
use visibility_pipeline::coordination::{
    Caps, CoordinationStore, CostTracker, DedupGate, InMemoryCoordinationStore, RateLimiter,
};
use visibility_pipeline::errors::ScrapeError;
use visibility_pipeline::models::Platform;
use visibility_pipeline::pipeline::hourly_rank_check;
use visibility_pipeline::scrape::{Orchestrator, Scraper};
use visibility_pipeline::store::{relational, Db};

fn test_config() -> Config {
    Config {
        database_path: ":memory:".to_string(),
        scraper_service_url: "http://unused.invalid".to_string(),
        scraper_service_timeout_secs: 5,
        rate_limit_chatgpt: 100,
        rate_limit_perplexity: 100,
        rate_limit_google_ai: 100,
        daily_cost_budget_usd: 10.0,
        metrics_port: 0,
        log_level: "error".to_string(),
        primary_brand_name: String::new(),
    }
}

fn insert_active_query(db: &Db, query_text: &str, brands: &[&str]) -> i64 {
    let brands_json = serde_json::to_string(brands).unwrap();
    let now = Utc::now();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO vis_query (query_text, category, priority, brands_json, is_active, created_at, updated_at) \
             VALUES (?1, 'general', 'medium', ?2, 1, ?3, ?3)",
            rusqlite::params![query_text, brands_json, now],
        )?;
        Ok(conn.last_insert_rowid())
    })
    .unwrap()
}

/// A scraper that recommends `brand` for every query except the ids in
/// `fail_for`, which it reports as transport failures.
struct StubScraper {
    platform: Platform,
    brand: String,
    fail_for: HashSet<i64>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Scraper for StubScraper {
    fn platform_tag(&self) -> &'static str {
        self.platform.as_str()
    }

    fn build_search_url(&self, _query_text: &str) -> String {
        "https://example.com".to_string()
    }

    async fn scrape(&self, query_id: i64, _query_text: &str) -> Result<Processed, ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_for.contains(&query_id) {
            return Err(ScrapeError::Transport("stub transport failure".to_string()));
        }
        Ok(Processed {
            clean_text: format!("We recommend {} for most households.", self.brand),
            sha256: "stub".to_string(),
            char_count: 40,
            url: "https://example.com".to_string(),
            status: 200,
            ts: Utc::now(),
            duration_ms: 1,
            snapshot_id: Some("stub-snapshot".to_string()),
        })
    }
}

#[tokio::test]
async fn mixed_outcome_run_completes_with_per_query_scores() {
    let db = Db::open_in_memory().unwrap();
    let config = test_config();
    let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryCoordinationStore::new());
    let cost_tracker = CostTracker::new(store.clone(), config.daily_cost_budget_usd);
    let rate_limiter = Arc::new(RateLimiter::new(
        store.clone(),
        Caps {
            chatgpt: 100,
            perplexity: 100,
            google_ai: 100,
        },
    ));

    let query1 = insert_active_query(&db, "best air purifier", &["Acme", "Globex"]);
    let query2 = insert_active_query(&db, "quietest air purifier", &["Acme", "Globex"]);

    // query2 fails on chatgpt and perplexity; google_ai succeeds for both
    // queries. query1/google_ai is pre-marked as recently scraped so the
    // orchestrator skips it on dedup grounds before ever calling the stub.
    let fails_query2: HashSet<i64> = [query2].into_iter().collect();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut scrapers: std::collections::HashMap<Platform, Arc<dyn Scraper>> =
        std::collections::HashMap::new();
    scrapers.insert(
        Platform::Chatgpt,
        Arc::new(StubScraper {
            platform: Platform::Chatgpt,
            brand: "Acme".to_string(),
            fail_for: fails_query2.clone(),
            calls: calls.clone(),
        }),
    );
    scrapers.insert(
        Platform::Perplexity,
        Arc::new(StubScraper {
            platform: Platform::Perplexity,
            brand: "Acme".to_string(),
            fail_for: fails_query2,
            calls: calls.clone(),
        }),
    );
    scrapers.insert(
        Platform::GoogleAi,
        Arc::new(StubScraper {
            platform: Platform::GoogleAi,
            brand: "Acme".to_string(),
            fail_for: HashSet::new(),
            calls: calls.clone(),
        }),
    );

    let dedup = DedupGate::new(store.clone());
    dedup.mark_scraped(query1, Platform::GoogleAi).unwrap();

    let orchestrator = Orchestrator::new(scrapers, store.clone(), rate_limiter);

    let outcome = hourly_rank_check(&db, &config, &cost_tracker, &orchestrator)
        .await
        .unwrap();

    assert_eq!(outcome.status, "completed");
    assert_eq!(outcome.success_count, Some(3));
    assert_eq!(outcome.failure_count, Some(2));
    // Dedup skip never reaches the scraper; only the 5 non-skipped tasks do.
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    let scores_q1 = relational::latest_scores_for_query(&db, query1).unwrap();
    let acme_q1 = scores_q1.iter().find(|s| s.brand == "Acme").unwrap();
    assert_eq!(acme_q1.visibility_score, 75.0); // chatgpt(0.40) + perplexity(0.35) at rank 1
    assert_eq!(acme_q1.competitive_gap, Some(75.0)); // Globex never mentioned, scores 0

    let globex_q1 = scores_q1.iter().find(|s| s.brand == "Globex").unwrap();
    assert_eq!(globex_q1.visibility_score, 0.0);
    assert_eq!(globex_q1.competitive_gap, None); // not the primary brand

    let scores_q2 = relational::latest_scores_for_query(&db, query2).unwrap();
    let acme_q2 = scores_q2.iter().find(|s| s.brand == "Acme").unwrap();
    assert_eq!(acme_q2.visibility_score, 25.0); // only google_ai succeeded, rank 1
}

#[tokio::test]
async fn cost_halted_run_never_invokes_the_orchestrator() {
    let db = Db::open_in_memory().unwrap();
    let config = test_config();
    let store: Arc<dyn CoordinationStore> = Arc::new(InMemoryCoordinationStore::new());
    let cost_tracker = CostTracker::new(store.clone(), config.daily_cost_budget_usd);
    cost_tracker.add(100.0).unwrap(); // budget is 10.0; this is well over it.

    let rate_limiter = Arc::new(RateLimiter::new(
        store.clone(),
        Caps {
            chatgpt: 100,
            perplexity: 100,
            google_ai: 100,
        },
    ));

    insert_active_query(&db, "best air purifier", &["Acme"]);

    let calls = Arc::new(AtomicUsize::new(0));
    let mut scrapers: std::collections::HashMap<Platform, Arc<dyn Scraper>> =
        std::collections::HashMap::new();
    for &platform in Platform::ALL.iter() {
        scrapers.insert(
            platform,
            Arc::new(StubScraper {
                platform,
                brand: "Acme".to_string(),
                fail_for: HashSet::new(),
                calls: calls.clone(),
            }) as Arc<dyn Scraper>,
        );
    }
    let orchestrator = Orchestrator::new(scrapers, store.clone(), rate_limiter);

    let outcome = hourly_rank_check(&db, &config, &cost_tracker, &orchestrator)
        .await
        .unwrap();

    assert_eq!(outcome.status, "cost_halted");
    assert_eq!(outcome.success_count, Some(0));
    assert_eq!(outcome.failure_count, Some(0));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let run = relational::get_pipeline_run(&db, outcome.run_id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(run.cost_usd, 100.0);
    assert_eq!(run.error_detail.as_deref(), Some("daily cost budget exceeded"));
}
