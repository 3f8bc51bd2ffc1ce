//! Document store: raw scrape snapshots and quarantined content.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;

use crate::errors::{QuarantineError, StoreError};
use crate::models::Platform;
use crate::store::db::Db;

const SNAPSHOT_TTL_DAYS: i64 = 90;
const QUARANTINE_TTL_DAYS: i64 = 30;

/// Inserts a raw scrape snapshot, returning its generated id.
#[allow(clippy::too_many_arguments)]
pub fn insert_snapshot(
    db: &Db,
    query_text: &str,
    platform: Platform,
    raw_content: &str,
    content_hash: &str,
    url: &str,
    http_status: i64,
    byte_len: i64,
    scraped_at: DateTime<Utc>,
) -> Result<String, StoreError> {
    let id = uuid::Uuid::new_v4().to_string();
    let expires_at = scraped_at + Duration::days(SNAPSHOT_TTL_DAYS);
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO snapshots \
             (id, query_text, platform, raw_content, content_hash, url, http_status, byte_len, scraped_at, expires_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                query_text,
                platform.as_str(),
                raw_content,
                content_hash,
                url,
                http_status,
                byte_len,
                scraped_at,
                expires_at
            ],
        )?;
        Ok(())
    })?;
    Ok(id)
}

/// Removes snapshots past their TTL. Returns the number of rows deleted.
pub fn reap_expired_snapshots(db: &Db, now: DateTime<Utc>) -> Result<usize, StoreError> {
    db.with_conn(|conn| conn.execute("DELETE FROM snapshots WHERE expires_at <= ?1", params![now]))
        .map_err(StoreError::from)
}

/// Inserts a quarantine row at the point a scrape is rejected, before the
/// failure is surfaced to the orchestrator.
pub fn insert_quarantine(
    db: &Db,
    query_id: i64,
    platform: Platform,
    err: &QuarantineError,
    created_at: DateTime<Utc>,
) -> Result<String, StoreError> {
    let id = uuid::Uuid::new_v4().to_string();
    let expires_at = created_at + Duration::days(QUARANTINE_TTL_DAYS);
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO quarantine \
             (id, query_id, platform, error_kind, error_detail, raw_prefix, created_at, expires_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                query_id,
                platform.as_str(),
                err.kind.as_str(),
                err.detail,
                err.raw_prefix,
                created_at,
                expires_at
            ],
        )?;
        Ok(())
    })?;
    Ok(id)
}

/// Removes quarantine rows past their TTL. Returns the number of rows deleted.
pub fn reap_expired_quarantine(db: &Db, now: DateTime<Utc>) -> Result<usize, StoreError> {
    db.with_conn(|conn| conn.execute("DELETE FROM quarantine WHERE expires_at <= ?1", params![now]))
        .map_err(StoreError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::QuarantineKind;

    #[test]
    fn snapshot_roundtrip_and_reap() {
        let db = Db::open_in_memory().unwrap();
        let now = Utc::now();
        let id = insert_snapshot(
            &db,
            "best air purifier",
            Platform::Chatgpt,
            "some content",
            "deadbeef",
            "https://example.com",
            200,
            12,
            now,
        )
        .unwrap();
        assert!(!id.is_empty());

        let far_future = now + Duration::days(SNAPSHOT_TTL_DAYS + 1);
        let reaped = reap_expired_snapshots(&db, far_future).unwrap();
        assert_eq!(reaped, 1);
    }

    #[test]
    fn quarantine_roundtrip() {
        let db = Db::open_in_memory().unwrap();
        let now = Utc::now();
        let err = QuarantineError {
            kind: QuarantineKind::ErrorPage,
            detail: "matched error-page signature".to_string(),
            raw_prefix: "404 not found".to_string(),
        };
        let id = insert_quarantine(&db, 1, Platform::Perplexity, &err, now).unwrap();
        assert!(!id.is_empty());
    }
}
