//! Embedded SQLite schema backing all three logical stores named in
//! SPEC_FULL.md §6 (relational, document, time-series). No external
//! database service is part of this core's scope, so all three are
//! distinct table families inside one connection, following the codebase's
//! existing WAL-mode rusqlite setup.

pub const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA cache_size = -64000;
PRAGMA temp_store = MEMORY;
PRAGMA mmap_size = 268435456;

-- Relational store ----------------------------------------------------

CREATE TABLE IF NOT EXISTS vis_query (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query_text TEXT NOT NULL,
    category TEXT NOT NULL,
    priority TEXT NOT NULL,
    brands_json TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_vis_query_active_priority
    ON vis_query(is_active, priority);

CREATE TABLE IF NOT EXISTS vis_brand (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    name_lower TEXT NOT NULL UNIQUE,
    is_primary INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS vis_ranking (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query_id INTEGER NOT NULL,
    platform TEXT NOT NULL,
    brand TEXT NOT NULL,
    rank_position INTEGER NOT NULL,
    snippet TEXT NOT NULL,
    snapshot_id TEXT NOT NULL,
    scraped_at TEXT NOT NULL,
    pipeline_run_id INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_vis_ranking_query_scraped
    ON vis_ranking(query_id, scraped_at DESC);
CREATE INDEX IF NOT EXISTS idx_vis_ranking_brand_scraped
    ON vis_ranking(brand, scraped_at DESC);
CREATE INDEX IF NOT EXISTS idx_vis_ranking_query_platform
    ON vis_ranking(query_id, platform, scraped_at DESC);

CREATE TABLE IF NOT EXISTS vis_score (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query_id INTEGER NOT NULL,
    brand TEXT NOT NULL,
    visibility_score REAL NOT NULL,
    competitive_gap REAL,
    period TEXT NOT NULL,
    computed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_vis_score_query_brand_computed
    ON vis_score(query_id, brand, computed_at DESC);

CREATE TABLE IF NOT EXISTS vis_pipeline_run (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    flow_name TEXT NOT NULL,
    status TEXT NOT NULL,
    queries_total INTEGER NOT NULL DEFAULT 0,
    success_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0,
    quarantine_count INTEGER NOT NULL DEFAULT 0,
    cost_usd REAL NOT NULL DEFAULT 0,
    error_detail TEXT,
    started_at TEXT NOT NULL,
    completed_at TEXT
);

-- Document store --------------------------------------------------------

CREATE TABLE IF NOT EXISTS snapshots (
    id TEXT PRIMARY KEY,
    query_text TEXT NOT NULL,
    platform TEXT NOT NULL,
    raw_content TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    url TEXT NOT NULL,
    http_status INTEGER NOT NULL,
    byte_len INTEGER NOT NULL,
    scraped_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_snapshots_scraped_at ON snapshots(scraped_at);
CREATE INDEX IF NOT EXISTS idx_snapshots_query_platform
    ON snapshots(query_text, platform, scraped_at DESC);
CREATE INDEX IF NOT EXISTS idx_snapshots_content_hash ON snapshots(content_hash);

CREATE TABLE IF NOT EXISTS quarantine (
    id TEXT PRIMARY KEY,
    query_id INTEGER NOT NULL,
    platform TEXT NOT NULL,
    error_kind TEXT NOT NULL,
    error_detail TEXT NOT NULL,
    raw_prefix TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_quarantine_query_platform ON quarantine(query_id, platform);

-- Time-series store -------------------------------------------------------

CREATE TABLE IF NOT EXISTS ts_search_rank (
    time TEXT NOT NULL,
    query_id INTEGER NOT NULL,
    platform TEXT NOT NULL,
    brand TEXT NOT NULL,
    rank_position INTEGER NOT NULL,
    visibility_score REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ts_search_rank_query_brand_time
    ON ts_search_rank(query_id, brand, time);
"#;

pub fn initialize(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
