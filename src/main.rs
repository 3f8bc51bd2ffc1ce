//! Entry point: wires configuration, logging, metrics, and the persistence
//! and coordination layers, then drives one of the two named flows.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use visibility_pipeline::config::Config;
use visibility_pipeline::coordination::{Caps, CostTracker, InMemoryCoordinationStore, RateLimiter};
use visibility_pipeline::pipeline::{daily_full_scan, hourly_rank_check};
use visibility_pipeline::scrape::{build_scrapers, Orchestrator};
use visibility_pipeline::store::Db;

#[derive(Parser)]
#[command(name = "visibility-pipeline", about = "Brand visibility scrape-and-score pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the hourly rank-check flow once.
    Hourly,
    /// Run the daily full-scan flow once (includes daily score aggregation).
    Daily,
    /// Print current coordination-store state (cost budget, rate-limit
    /// headroom per platform) without running a flow.
    State,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    init_tracing(&config.log_level);

    visibility_pipeline::metrics::install(config.metrics_port)
        .context("failed to install metrics exporter")?;

    let db = Db::open(&config.database_path).context("failed to open database")?;

    let coordination_store: Arc<dyn visibility_pipeline::coordination::CoordinationStore> =
        Arc::new(InMemoryCoordinationStore::new());

    let caps = Caps {
        chatgpt: config.rate_limit_chatgpt,
        perplexity: config.rate_limit_perplexity,
        google_ai: config.rate_limit_google_ai,
    };
    let rate_limiter = Arc::new(RateLimiter::new(coordination_store.clone(), caps));
    let cost_tracker = CostTracker::new(coordination_store.clone(), config.daily_cost_budget_usd);

    let scrapers = build_scrapers(
        &config.scraper_service_url,
        config.scraper_service_timeout_secs,
        db.clone(),
    );
    let orchestrator = Orchestrator::new(scrapers, coordination_store, rate_limiter);

    let cli = Cli::parse();
    match cli.command {
        Command::Hourly => {
            let outcome = hourly_rank_check(&db, &config, &cost_tracker, &orchestrator).await?;
            info!(status = outcome.status, run_id = ?outcome.run_id, "hourly_rank_check finished");
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Daily => {
            let outcome = daily_full_scan(&db, &config, &cost_tracker, &orchestrator).await?;
            info!(status = outcome.status, run_id = ?outcome.run_id, "daily_full_scan finished");
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::State => {
            print_state(&config, &cost_tracker, &caps)?;
        }
    }

    Ok(())
}

fn print_state(config: &Config, cost_tracker: &CostTracker, caps: &Caps) -> Result<()> {
    use visibility_pipeline::models::Platform;

    let today = cost_tracker.today()?;
    let exceeded = cost_tracker.is_budget_exceeded()?;
    println!("daily cost: {today:.2} / {:.2} (exceeded: {exceeded})", config.daily_cost_budget_usd);
    for platform in Platform::ALL {
        println!("  {platform}: hourly cap {}", caps.for_platform(platform));
    }
    Ok(())
}

/// Initializes structured logging from `RUST_LOG`, falling back to the
/// configured log level.
fn init_tracing(log_level: &str) {
    let default_filter = format!("visibility_pipeline={log_level},visibility-pipeline={log_level}");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
