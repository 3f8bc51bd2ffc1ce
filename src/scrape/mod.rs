//! Platform scraping and orchestration (C4/C5).

pub mod orchestrator;
pub mod platform;
pub mod scraper;

pub use orchestrator::{Orchestrator, OrchestratorResult, ScrapeFailure, ScrapeSuccess, ScrapeTarget};
pub use scraper::{build_scrapers, Scraper};
