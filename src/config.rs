//! Application configuration, loaded once at process start.

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub scraper_service_url: String,
    pub scraper_service_timeout_secs: u64,
    pub rate_limit_chatgpt: u32,
    pub rate_limit_perplexity: u32,
    pub rate_limit_google_ai: u32,
    pub daily_cost_budget_usd: f64,
    pub metrics_port: u16,
    pub log_level: String,
    /// Overrides which brand in a query's `brands` list gets the
    /// competitive-gap treatment. Empty means "use the first brand listed
    /// on each query" — see DESIGN.md for why this replaced a single
    /// hardcoded brand name.
    pub primary_brand_name: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./visibility.db".to_string());

        let scraper_service_url = std::env::var("SCRAPER_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:3002".to_string());

        let scraper_service_timeout_secs = std::env::var("SCRAPER_SERVICE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let rate_limit_chatgpt = std::env::var("RATE_LIMIT_CHATGPT")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let rate_limit_perplexity = std::env::var("RATE_LIMIT_PERPLEXITY")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .unwrap_or(20);

        let rate_limit_google_ai = std::env::var("RATE_LIMIT_GOOGLE_AI")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .unwrap_or(15);

        let daily_cost_budget_usd = std::env::var("DAILY_COST_BUDGET_USD")
            .unwrap_or_else(|_| "10.0".to_string())
            .parse()
            .unwrap_or(10.0);

        let metrics_port = std::env::var("METRICS_PORT")
            .unwrap_or_else(|_| "9090".to_string())
            .parse()
            .unwrap_or(9090);

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let primary_brand_name = std::env::var("PRIMARY_BRAND_NAME").unwrap_or_default();

        Ok(Self {
            database_path,
            scraper_service_url,
            scraper_service_timeout_secs,
            rate_limit_chatgpt,
            rate_limit_perplexity,
            rate_limit_google_ai,
            daily_cost_budget_usd,
            metrics_port,
            log_level,
            primary_brand_name,
        })
    }

    /// The primary brand for a query: the configured override if set,
    /// otherwise the first brand listed on the query itself.
    pub fn primary_brand_for<'a>(&'a self, brands: &'a [String]) -> Option<&'a str> {
        if !self.primary_brand_name.is_empty() {
            return Some(self.primary_brand_name.as_str());
        }
        brands.first().map(String::as_str)
    }

    /// Per-platform hourly rate limit cap, as configured.
    pub fn rate_limit_for(&self, platform: crate::models::Platform) -> u32 {
        use crate::models::Platform;
        match platform {
            Platform::Chatgpt => self.rate_limit_chatgpt,
            Platform::Perplexity => self.rate_limit_perplexity,
            Platform::GoogleAi => self.rate_limit_google_ai,
        }
    }
}
