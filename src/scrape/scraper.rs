//! Platform Scraper (C4): fetch raw content from the external scraper
//! service, persist a snapshot, and run it through the content processor.
//!
//! Polymorphic over `{build_search_url, platform_tag}` as an async trait
//! object per platform, mirroring the host codebase's existing use of
//! trait objects for its own pluggable scraper variants.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::content::{self, Processed, RawScrape};
use crate::errors::ScrapeError;
use crate::models::{truncate_detail, Platform};
use crate::scrape::platform::search_url;
use crate::store::{document, Db};

/// Fixed backoff schedule: delay before the 2nd and 3rd attempts.
const RETRY_DELAYS_SECS: [u64; 2] = [5, 15];
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Deserialize)]
struct ScrapeResponseEnvelope {
    data: ScrapeResponseData,
}

#[derive(Debug, Deserialize, Default)]
struct ScrapeResponseData {
    markdown: Option<String>,
    content: Option<String>,
    metadata: Option<ScrapeResponseMetadata>,
}

#[derive(Debug, Deserialize, Default)]
struct ScrapeResponseMetadata {
    #[serde(rename = "statusCode")]
    status_code: Option<i64>,
}

#[async_trait]
pub trait Scraper: Send + Sync {
    fn platform_tag(&self) -> &'static str;
    fn build_search_url(&self, query_text: &str) -> String;
    async fn scrape(&self, query_id: i64, query_text: &str) -> Result<Processed, ScrapeError>;
}

/// The one concrete scraper engine; each platform variant is a thin,
/// differently-tagged instance sharing this HTTP/retry/persistence core —
/// the platforms differ only in URL template (§4.4), so there is no
/// behavior left to duplicate across variant types.
struct HttpScraper {
    platform: Platform,
    client: Client,
    service_url: String,
    timeout: Duration,
    db: Db,
}

impl HttpScraper {
    fn new(platform: Platform, service_url: String, timeout_secs: u64, db: Db) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build scraper http client");
        Self {
            platform,
            client,
            service_url,
            timeout: Duration::from_secs(timeout_secs),
            db,
        }
    }

    /// Fetches and persists a snapshot, retrying the whole fetch-hash-store
    /// sequence on any transient failure (request, timeout, or store error).
    /// Returns the raw content alongside the snapshot id it was stored under.
    async fn fetch_with_retry(
        &self,
        query_text: &str,
        url: &str,
    ) -> Result<(RawScrape, String), ScrapeError> {
        let mut last_err: Option<ScrapeError> = None;

        for attempt in 0..MAX_ATTEMPTS {
            let started = Instant::now();
            match timeout(self.timeout, self.post_scrape(url)).await {
                Ok(Ok(raw)) => match self.store_snapshot(query_text, &raw) {
                    Ok(snapshot_id) => return Ok((raw, snapshot_id)),
                    Err(e) => {
                        warn!(attempt = attempt + 1, error = %e, "snapshot persistence failed");
                        last_err = Some(ScrapeError::Transport(e.to_string()));
                    }
                },
                Ok(Err(e)) => {
                    warn!(attempt = attempt + 1, error = %e, "scrape request failed");
                    last_err = Some(ScrapeError::Transport(truncate_detail(&e.to_string())));
                }
                Err(_) => {
                    warn!(
                        attempt = attempt + 1,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "scrape request timed out"
                    );
                    last_err = Some(ScrapeError::Timeout);
                }
            }

            if let Some(delay) = RETRY_DELAYS_SECS.get(attempt as usize) {
                sleep(Duration::from_secs(*delay)).await;
            }
        }

        Err(last_err.unwrap_or(ScrapeError::Timeout))
    }

    fn store_snapshot(&self, query_text: &str, raw: &RawScrape) -> Result<String, crate::errors::StoreError> {
        let hash = content::hex_sha256(raw.content.as_bytes());
        document::insert_snapshot(
            &self.db,
            query_text,
            self.platform,
            &raw.content,
            &hash,
            &raw.url,
            i64::from(raw.http_status),
            raw.byte_len as i64,
            raw.ts,
        )
    }

    async fn post_scrape(&self, url: &str) -> Result<RawScrape, reqwest::Error> {
        let endpoint = format!("{}/v1/scrape", self.service_url);
        let body = serde_json::json!({ "url": url, "formats": ["markdown"] });

        let started = Instant::now();
        let response = self.client.post(&endpoint).json(&body).send().await?;
        let envelope: ScrapeResponseEnvelope = response.json().await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let content = envelope
            .data
            .markdown
            .or(envelope.data.content)
            .unwrap_or_default();
        let http_status = envelope
            .data
            .metadata
            .and_then(|m| m.status_code)
            .unwrap_or(200)
            .clamp(0, i64::from(u16::MAX)) as u16;

        Ok(RawScrape {
            url: url.to_string(),
            byte_len: content.len(),
            content,
            http_status,
            duration_ms: elapsed_ms,
            ts: Utc::now(),
        })
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    fn platform_tag(&self) -> &'static str {
        self.platform.as_str()
    }

    fn build_search_url(&self, query_text: &str) -> String {
        search_url(self.platform, query_text)
    }

    /// Fetches and persists a snapshot (retried together as one unit), then
    /// processes the result. On `QuarantineError` a quarantine row is written
    /// immediately, before the error is propagated — see DESIGN.md.
    async fn scrape(&self, query_id: i64, query_text: &str) -> Result<Processed, ScrapeError> {
        let url = self.build_search_url(query_text);
        let (raw, snapshot_id) = self.fetch_with_retry(query_text, &url).await?;

        match content::process(&raw) {
            Ok(mut processed) => {
                processed.snapshot_id = Some(snapshot_id);
                Ok(processed)
            }
            Err(quarantine_err) => {
                if let Err(store_err) = document::insert_quarantine(
                    &self.db,
                    query_id,
                    self.platform,
                    &quarantine_err,
                    Utc::now(),
                ) {
                    warn!(error = %store_err, "failed to persist quarantine record");
                }
                Err(ScrapeError::Quarantine(quarantine_err))
            }
        }
    }
}

/// Builds one scraper per configured platform, eagerly, at orchestrator
/// construction time (mirrors the eager per-platform semaphore set).
pub fn build_scrapers(
    service_url: &str,
    timeout_secs: u64,
    db: Db,
) -> HashMap<Platform, Arc<dyn Scraper>> {
    Platform::ALL
        .iter()
        .map(|&platform| {
            let scraper: Arc<dyn Scraper> = Arc::new(HttpScraper::new(
                platform,
                service_url.to_string(),
                timeout_secs,
                db.clone(),
            ));
            (platform, scraper)
        })
        .collect()
}
