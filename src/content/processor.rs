//! Content Processor (C3): validates, strips, and normalizes raw platform
//! output into clean text plus a content hash.

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use crate::errors::{QuarantineError, QuarantineKind};

pub const MAX_CONTENT_CHARS: usize = 10_000;
pub const MIN_CONTENT_CHARS: usize = 50;
const ERROR_PAGE_LEN_CEILING: usize = 500;

const BOILERPLATE_KEYWORDS: &[&str] = &[
    "skip to content",
    "skip to main",
    "cookie policy",
    "cookie consent",
    "cookie settings",
    "accept all cookies",
    "accept cookies",
    "privacy policy",
    "terms of service",
    "terms of use",
    "sign in",
    "sign up",
    "log in",
    "log out",
    "subscribe to",
    "newsletter",
    "advertisement",
    "sponsored",
    "all rights reserved",
];

const ERROR_PAGE_SIGNATURES: &[&str] = &[
    "access denied",
    "403 forbidden",
    "page not found",
    "404 not found",
    "captcha",
    "please verify you are a human",
    "rate limit exceeded",
    "too many requests",
];

fn script_style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(r"<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>")
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .expect("valid script/style regex")
    })
}

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid html tag regex"))
}

fn html_entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&[a-zA-Z]+;|&#\d+;").expect("valid html entity regex"))
}

fn copyright_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(r"©\s*\d{4}")
            .case_insensitive(true)
            .build()
            .expect("valid copyright regex")
    })
}

fn multi_space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("valid whitespace regex"))
}

fn multi_newline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid newline regex"))
}

/// Raw, unprocessed scrape output handed to the processor.
#[derive(Debug, Clone)]
pub struct RawScrape {
    pub url: String,
    pub content: String,
    pub http_status: u16,
    pub byte_len: usize,
    pub duration_ms: u64,
    pub ts: DateTime<Utc>,
}

/// Cleaned, validated content ready for rank extraction.
#[derive(Debug, Clone)]
pub struct Processed {
    pub clean_text: String,
    pub sha256: String,
    pub char_count: usize,
    pub url: String,
    pub status: u16,
    pub ts: DateTime<Utc>,
    pub duration_ms: u64,
    pub snapshot_id: Option<String>,
}

pub fn process(raw: &RawScrape) -> Result<Processed, QuarantineError> {
    if raw.content.trim().is_empty() {
        return Err(QuarantineError {
            kind: QuarantineKind::EmptyContent,
            detail: "scrape returned empty content".to_string(),
            raw_prefix: String::new(),
        });
    }

    if raw.http_status >= 400 {
        return Err(QuarantineError {
            kind: QuarantineKind::HttpError,
            detail: format!("HTTP {}", raw.http_status),
            raw_prefix: prefix(&raw.content, 2000),
        });
    }

    let clean = strip_html(&raw.content);
    let clean = remove_boilerplate(&clean);
    let clean = collapse_whitespace(&clean);

    check_error_page(&clean, &raw.content)?;

    if clean.chars().count() < MIN_CONTENT_CHARS {
        return Err(QuarantineError {
            kind: QuarantineKind::InsufficientContent,
            detail: format!(
                "content too short after cleaning: {} chars (min {MIN_CONTENT_CHARS})",
                clean.chars().count()
            ),
            raw_prefix: prefix(&raw.content, 2000),
        });
    }

    let truncated: String = clean.chars().take(MAX_CONTENT_CHARS).collect();
    let sha256 = hex_sha256(truncated.as_bytes());
    let char_count = truncated.chars().count();

    Ok(Processed {
        clean_text: truncated,
        sha256,
        char_count,
        url: raw.url.clone(),
        status: raw.http_status,
        ts: raw.ts,
        duration_ms: raw.duration_ms,
        snapshot_id: None,
    })
}

fn prefix(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn strip_html(text: &str) -> String {
    let without_scripts = script_style_re().replace_all(text, "");
    let without_tags = html_tag_re().replace_all(&without_scripts, " ");
    html_entity_re().replace_all(&without_tags, " ").into_owned()
}

fn remove_boilerplate(text: &str) -> String {
    text.lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            let lower = lower.trim();
            !BOILERPLATE_KEYWORDS.iter().any(|kw| lower.contains(kw))
                && !copyright_re().is_match(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_whitespace(text: &str) -> String {
    let collapsed = multi_space_re().replace_all(text, " ");
    let joined = collapsed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    multi_newline_re()
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

fn check_error_page(clean: &str, raw: &str) -> Result<(), QuarantineError> {
    let lower = clean.to_lowercase();
    for sig in ERROR_PAGE_SIGNATURES {
        if lower.contains(sig) && clean.chars().count() < ERROR_PAGE_LEN_CEILING {
            return Err(QuarantineError {
                kind: QuarantineKind::ErrorPage,
                detail: format!("detected error page signature: '{sig}'"),
                raw_prefix: prefix(raw, 2000),
            });
        }
    }
    Ok(())
}

/// SHA-256 of arbitrary bytes, hex-encoded. Used both for the truncated
/// cleaned text and for the raw snapshot content hash.
pub fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
