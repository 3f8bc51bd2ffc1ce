//! Relational store: queries, rankings, scores, pipeline runs.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::errors::StoreError;
use crate::models::{
    Period, Platform, PipelineRun, Priority, Query, QueryCategory, RunStatus, Score,
};
use crate::store::db::Db;

fn parse_category(s: &str) -> QueryCategory {
    match s {
        "product_comparison" => QueryCategory::ProductComparison,
        "brand_search" => QueryCategory::BrandSearch,
        "category_search" => QueryCategory::CategorySearch,
        _ => QueryCategory::General,
    }
}

fn parse_period(s: &str) -> Period {
    match s {
        "daily" => Period::Daily,
        "weekly" => Period::Weekly,
        "monthly" => Period::Monthly,
        _ => Period::Raw,
    }
}

fn parse_status(s: &str) -> RunStatus {
    match s {
        "completed" => RunStatus::Completed,
        "failed" => RunStatus::Failed,
        "cost_halted" => RunStatus::CostHalted,
        _ => RunStatus::Running,
    }
}

/// Active queries ordered by priority (high, medium, low). Both flows use
/// this identical fetch; see DESIGN.md for why no priority filter applies.
pub fn fetch_active_queries(db: &Db) -> Result<Vec<Query>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, query_text, category, priority, brands_json, is_active, created_at, updated_at \
             FROM vis_query WHERE is_active = 1 \
             ORDER BY CASE priority WHEN 'high' THEN 1 WHEN 'medium' THEN 2 ELSE 3 END",
        )?;
        let rows = stmt.query_map([], |row| {
            let brands_json: String = row.get(4)?;
            let brands: Vec<String> = serde_json::from_str(&brands_json).unwrap_or_default();
            Ok(Query {
                id: row.get(0)?,
                query_text: row.get(1)?,
                category: parse_category(&row.get::<_, String>(2)?),
                priority: Priority::from_str_opt(&row.get::<_, String>(3)?)
                    .unwrap_or(Priority::Low),
                brands,
                is_active: row.get::<_, i64>(5)? != 0,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })?;
        rows.collect()
    })
}

pub fn create_pipeline_run(db: &Db, flow_name: &str, queries_total: i64) -> Result<i64, StoreError> {
    let now = Utc::now();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO vis_pipeline_run (flow_name, status, queries_total, started_at) \
             VALUES (?1, 'running', ?2, ?3)",
            params![flow_name, queries_total, now],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

#[allow(clippy::too_many_arguments)]
pub fn finalize_pipeline_run(
    db: &Db,
    run_id: i64,
    status: RunStatus,
    success_count: i64,
    failure_count: i64,
    cost_usd: f64,
    error_detail: Option<&str>,
) -> Result<(), StoreError> {
    let now = Utc::now();
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE vis_pipeline_run SET status = ?1, success_count = ?2, failure_count = ?3, \
             cost_usd = ?4, error_detail = ?5, completed_at = ?6 WHERE id = ?7",
            params![
                status.as_str(),
                success_count,
                failure_count,
                cost_usd,
                error_detail,
                now,
                run_id
            ],
        )?;
        Ok(())
    })
}

pub fn get_pipeline_run(db: &Db, run_id: i64) -> Result<Option<PipelineRun>, StoreError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT id, flow_name, status, queries_total, success_count, failure_count, \
             quarantine_count, cost_usd, error_detail, started_at, completed_at \
             FROM vis_pipeline_run WHERE id = ?1",
            params![run_id],
            |row| {
                Ok(PipelineRun {
                    id: row.get(0)?,
                    flow_name: row.get(1)?,
                    status: parse_status(&row.get::<_, String>(2)?),
                    queries_total: row.get(3)?,
                    success_count: row.get(4)?,
                    failure_count: row.get(5)?,
                    quarantine_count: row.get(6)?,
                    cost_usd: row.get(7)?,
                    error_detail: row.get(8)?,
                    started_at: row.get(9)?,
                    completed_at: row.get(10)?,
                })
            },
        )
        .optional()
    })
}

pub fn insert_ranking(
    db: &Db,
    query_id: i64,
    platform: Platform,
    brand: &str,
    rank_position: u8,
    snippet: &str,
    snapshot_id: &str,
    scraped_at: DateTime<Utc>,
    pipeline_run_id: i64,
) -> Result<i64, StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO vis_ranking \
             (query_id, platform, brand, rank_position, snippet, snapshot_id, scraped_at, pipeline_run_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                query_id,
                platform.as_str(),
                brand,
                rank_position as i64,
                snippet,
                snapshot_id,
                scraped_at,
                pipeline_run_id
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// (platform, rank_position) observation per (platform, brand) for a given
/// (query_id, pipeline_run_id). A single pipeline run produces at most one
/// ranking row per (platform, brand) pair, so no deduping by scraped_at is
/// needed here.
pub fn latest_rankings_for_run(
    db: &Db,
    query_id: i64,
    pipeline_run_id: i64,
) -> Result<Vec<(Platform, String, u8)>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT platform, brand, rank_position FROM vis_ranking \
             WHERE query_id = ?1 AND pipeline_run_id = ?2",
        )?;
        let rows = stmt.query_map(params![query_id, pipeline_run_id], |row| {
            let platform_str: String = row.get(0)?;
            let platform = Platform::from_str_opt(&platform_str).unwrap_or(Platform::Chatgpt);
            let brand: String = row.get(1)?;
            let rank: i64 = row.get(2)?;
            Ok((platform, brand, rank as u8))
        })?;
        rows.collect()
    })
}

pub fn insert_score(
    db: &Db,
    query_id: i64,
    brand: &str,
    visibility_score: f64,
    competitive_gap: Option<f64>,
    period: Period,
) -> Result<(), StoreError> {
    let now = Utc::now();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO vis_score (query_id, brand, visibility_score, competitive_gap, period, computed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![query_id, brand, visibility_score, competitive_gap, period.as_str(), now],
        )?;
        Ok(())
    })
}

pub fn latest_scores_for_query(db: &Db, query_id: i64) -> Result<Vec<Score>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT query_id, brand, visibility_score, competitive_gap, period, computed_at \
             FROM vis_score WHERE query_id = ?1 ORDER BY computed_at DESC",
        )?;
        let rows = stmt.query_map(params![query_id], |row| {
            Ok(Score {
                query_id: row.get(0)?,
                brand: row.get(1)?,
                visibility_score: row.get(2)?,
                competitive_gap: row.get(3)?,
                period: parse_period(&row.get::<_, String>(4)?),
                computed_at: row.get(5)?,
            })
        })?;
        rows.collect()
    })
}
