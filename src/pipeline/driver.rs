//! Score Calculator & Pipeline Driver (C7): the two named flows,
//! `hourly_rank_check` and `daily_full_scan`, sharing one skeleton.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::config::Config;
use crate::coordination::CostTracker;
use crate::models::{truncate_detail, Period, Platform, RunStatus};
use crate::rank;
use crate::score::{self, PlatformRanking};
use crate::scrape::{Orchestrator, OrchestratorResult, ScrapeTarget};
use crate::store::{relational, timeseries, Db};

const FLOW_HOURLY: &str = "hourly_rank_check";
const FLOW_DAILY: &str = "daily_full_scan";

#[derive(Debug, Clone, Serialize)]
pub struct FlowOutcome {
    pub status: &'static str,
    pub run_id: Option<i64>,
    pub success_count: Option<i64>,
    pub failure_count: Option<i64>,
    pub daily_scores_count: Option<i64>,
    pub error: Option<String>,
}

impl FlowOutcome {
    fn skipped() -> Self {
        Self {
            status: "skipped",
            run_id: None,
            success_count: None,
            failure_count: None,
            daily_scores_count: None,
            error: None,
        }
    }
}

pub async fn hourly_rank_check(
    db: &Db,
    config: &Config,
    cost_tracker: &CostTracker,
    orchestrator: &Orchestrator,
) -> anyhow::Result<FlowOutcome> {
    run_flow(db, config, cost_tracker, orchestrator, FLOW_HOURLY, false).await
}

pub async fn daily_full_scan(
    db: &Db,
    config: &Config,
    cost_tracker: &CostTracker,
    orchestrator: &Orchestrator,
) -> anyhow::Result<FlowOutcome> {
    run_flow(db, config, cost_tracker, orchestrator, FLOW_DAILY, true).await
}

async fn run_flow(
    db: &Db,
    config: &Config,
    cost_tracker: &CostTracker,
    orchestrator: &Orchestrator,
    flow_name: &str,
    run_daily_aggregation: bool,
) -> anyhow::Result<FlowOutcome> {
    let queries = relational::fetch_active_queries(db)?;
    if queries.is_empty() {
        tracing::info!(flow = flow_name, "no active queries, skipping run");
        return Ok(FlowOutcome::skipped());
    }

    if cost_tracker.is_budget_exceeded()? {
        let run_id = relational::create_pipeline_run(db, flow_name, queries.len() as i64)?;
        let today_cost = cost_tracker.today()?;
        crate::metrics::set_daily_cost(today_cost);
        relational::finalize_pipeline_run(
            db,
            run_id,
            RunStatus::CostHalted,
            0,
            0,
            today_cost,
            Some("daily cost budget exceeded"),
        )?;
        tracing::warn!(flow = flow_name, run_id, "run cost-halted before any scrape");
        return Ok(FlowOutcome {
            status: "cost_halted",
            run_id: Some(run_id),
            success_count: Some(0),
            failure_count: Some(0),
            daily_scores_count: None,
            error: None,
        });
    }

    let run_id = relational::create_pipeline_run(db, flow_name, queries.len() as i64)?;
    tracing::info!(flow = flow_name, run_id, queries = queries.len(), "run started");

    match execute_run(db, config, orchestrator, run_id, &queries).await {
        Ok((success_count, failure_count)) => {
            let cost_usd = cost_tracker.today()?;
            crate::metrics::set_daily_cost(cost_usd);
            relational::finalize_pipeline_run(
                db,
                run_id,
                RunStatus::Completed,
                success_count,
                failure_count,
                cost_usd,
                None,
            )?;

            let daily_scores_count = if run_daily_aggregation {
                Some(compute_daily_aggregated_scores(db, config)?)
            } else {
                None
            };

            tracing::info!(
                flow = flow_name,
                run_id,
                success_count,
                failure_count,
                "run completed"
            );

            Ok(FlowOutcome {
                status: "completed",
                run_id: Some(run_id),
                success_count: Some(success_count),
                failure_count: Some(failure_count),
                daily_scores_count,
                error: None,
            })
        }
        Err(e) => {
            let detail = truncate_detail(&e.to_string());
            let cost_usd = cost_tracker.today().unwrap_or(0.0);
            relational::finalize_pipeline_run(db, run_id, RunStatus::Failed, 0, 0, cost_usd, Some(&detail))?;
            tracing::error!(flow = flow_name, run_id, error = %e, "run failed");
            Ok(FlowOutcome {
                status: "failed",
                run_id: Some(run_id),
                success_count: None,
                failure_count: None,
                daily_scores_count: None,
                error: Some(detail),
            })
        }
    }
}

async fn execute_run(
    db: &Db,
    config: &Config,
    orchestrator: &Orchestrator,
    run_id: i64,
    queries: &[crate::models::Query],
) -> anyhow::Result<(i64, i64)> {
    let targets: Vec<ScrapeTarget> = queries
        .iter()
        .map(|q| ScrapeTarget {
            query_id: q.id,
            query_text: q.query_text.clone(),
        })
        .collect();

    let result: OrchestratorResult = orchestrator.run(&targets, &Platform::ALL).await;

    let queries_by_id: HashMap<i64, &crate::models::Query> =
        queries.iter().map(|q| (q.id, q)).collect();

    for success in &result.successes {
        let Some(query) = queries_by_id.get(&success.query_id) else {
            continue;
        };
        let rank_results = rank::extract(&success.processed.clean_text, &query.brands);
        for rr in rank_results.iter().filter(|rr| rr.rank_position >= 1) {
            let snapshot_id = success
                .processed
                .snapshot_id
                .clone()
                .unwrap_or_default();
            relational::insert_ranking(
                db,
                query.id,
                success.platform,
                &rr.brand,
                rr.rank_position,
                &rr.snippet,
                &snapshot_id,
                success.processed.ts,
                run_id,
            )?;

            let contribution = score::score_contribution(success.platform, rr.rank_position);
            timeseries::insert_rank_point(
                db,
                success.processed.ts,
                query.id,
                success.platform,
                &rr.brand,
                rr.rank_position,
                contribution,
            )?;
        }
    }

    let successful_query_ids: HashSet<i64> = result.successes.iter().map(|s| s.query_id).collect();
    for query_id in successful_query_ids {
        let Some(query) = queries_by_id.get(&query_id) else {
            continue;
        };
        let observations = relational::latest_rankings_for_run(db, query_id, run_id)?;
        write_brand_scores(db, config, query.brands.as_slice(), &observations, query_id, Period::Raw)?;
    }

    let success_count = result.successes.len() as i64;
    let failure_count = result.failures.len() as i64;

    Ok((success_count, failure_count))
}

/// Groups per-platform observations by brand, computes each brand's
/// visibility score, attaches the competitive gap to the configured
/// primary brand, and writes one Score row per brand.
fn write_brand_scores(
    db: &Db,
    config: &Config,
    brands: &[String],
    observations: &[(Platform, String, u8)],
    query_id: i64,
    period: Period,
) -> anyhow::Result<()> {
    let mut by_brand: HashMap<&str, Vec<PlatformRanking>> = HashMap::new();
    for (platform, brand, rank_position) in observations {
        by_brand.entry(brand.as_str()).or_default().push(PlatformRanking {
            platform: *platform,
            rank_position: *rank_position,
        });
    }

    let mut scores: HashMap<&str, f64> = HashMap::new();
    for brand in brands {
        let rankings = by_brand.get(brand.as_str()).cloned().unwrap_or_default();
        scores.insert(brand.as_str(), score::calculate_visibility_score(&rankings));
    }

    let primary = config.primary_brand_for(brands);

    for brand in brands {
        let brand_score = *scores.get(brand.as_str()).unwrap_or(&0.0);
        let gap = if Some(brand.as_str()) == primary {
            let mut competitors: HashMap<String, f64> = HashMap::new();
            for (other_brand, other_score) in &scores {
                if Some(*other_brand) != primary {
                    competitors.insert(other_brand.to_string(), *other_score);
                }
            }
            Some(score::calculate_competitive_gap(brand_score, &competitors))
        } else {
            None
        };

        relational::insert_score(db, query_id, brand, brand_score, gap, period)?;
    }

    Ok(())
}

/// Averages per-platform visibility contributions from the time-series
/// store over the current UTC calendar day, grouped by (query_id, brand),
/// and writes them as `period=daily` Score rows with competitive gap on
/// the primary brand. Returns the count of rows written.
pub fn compute_daily_aggregated_scores(db: &Db, config: &Config) -> anyhow::Result<i64> {
    let now = Utc::now();
    let averages = timeseries::daily_average_scores(db, now)?;
    if averages.is_empty() {
        return Ok(0);
    }

    let mut by_query: HashMap<i64, Vec<(String, f64)>> = HashMap::new();
    for (query_id, brand, avg) in averages {
        by_query.entry(query_id).or_default().push((brand, avg));
    }

    let mut written = 0i64;
    for (query_id, brand_scores) in by_query {
        let brands: Vec<String> = brand_scores.iter().map(|(b, _)| b.clone()).collect();
        let scores: HashMap<String, f64> = brand_scores.into_iter().collect();
        let primary = config.primary_brand_for(&brands).map(str::to_string);

        for brand in &brands {
            let brand_score = *scores.get(brand).unwrap_or(&0.0);
            let gap = if Some(brand.clone()) == primary {
                let mut competitors: HashMap<String, f64> = HashMap::new();
                for (other_brand, other_score) in &scores {
                    if Some(other_brand.clone()) != primary {
                        competitors.insert(other_brand.clone(), *other_score);
                    }
                }
                Some(score::calculate_competitive_gap(brand_score, &competitors))
            } else {
                None
            };

            relational::insert_score(db, query_id, brand, brand_score, gap, Period::Daily)?;
            written += 1;
        }
    }

    Ok(written)
}

/// Shared Arc-backed handle bundle for the flows, wiring `Db` and the
/// coordination primitives the same way `main.rs` constructs them.
#[derive(Clone)]
pub struct PipelineHandles {
    pub db: Db,
    pub config: Arc<Config>,
    pub cost_tracker: Arc<CostTracker>,
    pub orchestrator: Arc<Orchestrator>,
}
