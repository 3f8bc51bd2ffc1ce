//! Time-series store: per-scrape rank observations and daily aggregation.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;

use crate::errors::StoreError;
use crate::models::Platform;
use crate::store::db::Db;

pub fn insert_rank_point(
    db: &Db,
    time: DateTime<Utc>,
    query_id: i64,
    platform: Platform,
    brand: &str,
    rank_position: u8,
    visibility_score: f64,
) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO ts_search_rank (time, query_id, platform, brand, rank_position, visibility_score) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                time,
                query_id,
                platform.as_str(),
                brand,
                rank_position as i64,
                visibility_score
            ],
        )?;
        Ok(())
    })
}

/// Average visibility score per (query_id, brand) over the UTC calendar day
/// containing `day`, for the daily-aggregated-scores pass.
pub fn daily_average_scores(
    db: &Db,
    day: DateTime<Utc>,
) -> Result<Vec<(i64, String, f64)>, StoreError> {
    let day_start = day.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
    let day_end = day_start + Duration::days(1);
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT query_id, brand, AVG(visibility_score) FROM ts_search_rank \
             WHERE time >= ?1 AND time < ?2 \
             GROUP BY query_id, brand",
        )?;
        let rows = stmt.query_map(params![day_start, day_end], |row| {
            let query_id: i64 = row.get(0)?;
            let brand: String = row.get(1)?;
            let avg: f64 = row.get(2)?;
            Ok((query_id, brand, avg))
        })?;
        rows.collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_average_groups_by_query_and_brand() {
        let db = Db::open_in_memory().unwrap();
        let now = Utc::now();
        insert_rank_point(&db, now, 1, Platform::Chatgpt, "Levoit", 1, 40.0).unwrap();
        insert_rank_point(&db, now, 1, Platform::Perplexity, "Levoit", 2, 26.25).unwrap();
        insert_rank_point(&db, now, 1, Platform::Chatgpt, "Dyson", 3, 20.0).unwrap();

        let averages = daily_average_scores(&db, now).unwrap();
        let levoit = averages
            .iter()
            .find(|(qid, brand, _)| *qid == 1 && brand == "Levoit")
            .unwrap();
        assert_eq!(levoit.2, 33.125);

        let dyson = averages
            .iter()
            .find(|(qid, brand, _)| *qid == 1 && brand == "Dyson")
            .unwrap();
        assert_eq!(dyson.2, 20.0);
    }

    #[test]
    fn window_excludes_points_outside_the_day() {
        let db = Db::open_in_memory().unwrap();
        let now = Utc::now();
        let yesterday = now - Duration::days(1);
        insert_rank_point(&db, yesterday, 1, Platform::Chatgpt, "Levoit", 1, 40.0).unwrap();

        let averages = daily_average_scores(&db, now).unwrap();
        assert!(averages.is_empty());
    }
}
