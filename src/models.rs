//! Shared domain types for the visibility pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An AI-answer platform scraped for brand visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Chatgpt,
    Perplexity,
    GoogleAi,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Chatgpt, Platform::Perplexity, Platform::GoogleAi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Chatgpt => "chatgpt",
            Platform::Perplexity => "perplexity",
            Platform::GoogleAi => "google_ai",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Platform> {
        match s {
            "chatgpt" => Some(Platform::Chatgpt),
            "perplexity" => Some(Platform::Perplexity),
            "google_ai" => Some(Platform::GoogleAi),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query category, as tracked on `vis_query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryCategory {
    ProductComparison,
    BrandSearch,
    CategorySearch,
    General,
}

impl QueryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryCategory::ProductComparison => "product_comparison",
            QueryCategory::BrandSearch => "brand_search",
            QueryCategory::CategorySearch => "category_search",
            QueryCategory::General => "general",
        }
    }
}

/// Query priority. Orders active-query fetch; does not otherwise filter it
/// (see DESIGN.md for the hourly/daily priority-filter decision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Priority> {
        match s {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

/// A monitored search phrase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: i64,
    pub query_text: String,
    pub category: QueryCategory,
    pub priority: Priority,
    pub brands: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const MAX_QUERY_TEXT_LEN: usize = 500;

/// Pipeline run status, closed to a terminal value exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    CostHalted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::CostHalted => "cost_halted",
        }
    }
}

/// Score aggregation granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Raw,
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Raw => "raw",
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }
}

/// One ranking observation, immutable after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ranking {
    pub id: i64,
    pub query_id: i64,
    pub platform: Platform,
    pub brand: String,
    pub rank_position: u8,
    pub snippet: String,
    pub snapshot_id: String,
    pub scraped_at: DateTime<Utc>,
    pub pipeline_run_id: i64,
}

/// A weighted visibility score for one brand on one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub query_id: i64,
    pub brand: String,
    pub visibility_score: f64,
    pub competitive_gap: Option<f64>,
    pub period: Period,
    pub computed_at: DateTime<Utc>,
}

/// One invocation of a flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: i64,
    pub flow_name: String,
    pub status: RunStatus,
    pub queries_total: i64,
    pub success_count: i64,
    pub failure_count: i64,
    pub quarantine_count: i64,
    pub cost_usd: f64,
    pub error_detail: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Truncates an error detail string to the contract's 500-char ceiling.
pub fn truncate_detail(detail: &str) -> String {
    const MAX: usize = 500;
    if detail.chars().count() <= MAX {
        detail.to_string()
    } else {
        detail.chars().take(MAX).collect()
    }
}
