//! Component error enums, matching the hand-written Display/Error convention
//! used throughout this codebase rather than a derive-macro error crate.

use std::fmt;

/// Content validation failures. Never retried; surfaced to the orchestrator
/// as a `ScrapeFailure` with `error_kind = "quarantine"`.
#[derive(Debug, Clone)]
pub struct QuarantineError {
    pub kind: QuarantineKind,
    pub detail: String,
    pub raw_prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuarantineKind {
    EmptyContent,
    HttpError,
    ErrorPage,
    InsufficientContent,
}

impl QuarantineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuarantineKind::EmptyContent => "empty_content",
            QuarantineKind::HttpError => "http_error",
            QuarantineKind::ErrorPage => "error_page",
            QuarantineKind::InsufficientContent => "insufficient_content",
        }
    }
}

impl fmt::Display for QuarantineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.detail)
    }
}

impl std::error::Error for QuarantineError {}

/// Transport/coordination failures from the scraper HTTP call.
#[derive(Debug, Clone)]
pub enum ScrapeError {
    Transport(String),
    Timeout,
    Quarantine(QuarantineError),
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrapeError::Transport(msg) => write!(f, "transport error: {msg}"),
            ScrapeError::Timeout => write!(f, "scrape request timed out"),
            ScrapeError::Quarantine(q) => write!(f, "{q}"),
        }
    }
}

impl std::error::Error for ScrapeError {}

impl ScrapeError {
    /// The `error_kind` field recorded on a `ScrapeFailure`.
    pub fn kind_str(&self) -> &'static str {
        match self {
            ScrapeError::Transport(_) => "transport",
            ScrapeError::Timeout => "timeout",
            ScrapeError::Quarantine(_) => "quarantine",
        }
    }

    pub fn is_quarantine(&self) -> bool {
        matches!(self, ScrapeError::Quarantine(_))
    }
}

/// In-process coordination-store failures (the rate limiter / cost tracker /
/// dedup map backing store).
#[derive(Debug, Clone)]
pub enum CoordinationError {
    Unavailable(String),
}

impl fmt::Display for CoordinationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinationError::Unavailable(msg) => write!(f, "coordination store error: {msg}"),
        }
    }
}

impl std::error::Error for CoordinationError {}

/// Relational/document/time-series store failures.
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    NotFound(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "store error: {e}"),
            StoreError::NotFound(what) => write!(f, "not found: {what}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}
