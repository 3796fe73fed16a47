use std::path::PathBuf;
use url::Url;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SCORING_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_STORAGE_PATH: &str = "leadconnect_storage.json";
pub const DEFAULT_SCORING_CONCURRENCY: usize = 20;
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_SCORING_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Base URL of the ML scoring service (`/score` and `/feedback` live under it).
    pub scoring_api_url: Url,
    /// File backing the key-value store.
    pub storage_path: PathBuf,
    /// Number of scoring calls in flight per batch.
    pub scoring_concurrency: usize,
    pub page_size: usize,
    pub scoring_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            scoring_api_url: Url::parse(DEFAULT_SCORING_API_URL).expect("default scoring URL is valid"),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            scoring_concurrency: DEFAULT_SCORING_CONCURRENCY,
            page_size: DEFAULT_PAGE_SIZE,
            scoring_timeout_secs: DEFAULT_SCORING_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            scoring_api_url: parse_scoring_url(
                &std::env::var("SCORING_API_URL")
                    .unwrap_or_else(|_| DEFAULT_SCORING_API_URL.to_string()),
            )?,
            storage_path: std::env::var("STORAGE_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH)),
            scoring_concurrency: parse_positive(
                "SCORING_CONCURRENCY",
                DEFAULT_SCORING_CONCURRENCY,
            )?,
            page_size: parse_positive("PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            scoring_timeout_secs: std::env::var("SCORING_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_SCORING_TIMEOUT_SECS.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SCORING_TIMEOUT_SECS must be a whole number"))?,
        };

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Scoring API URL: {}", config.scoring_api_url);
        tracing::debug!("Storage path: {}", config.storage_path.display());
        tracing::debug!(
            "Scoring concurrency: {}, page size: {}",
            config.scoring_concurrency,
            config.page_size
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn parse_scoring_url(raw: &str) -> anyhow::Result<Url> {
    if raw.trim().is_empty() {
        anyhow::bail!("SCORING_API_URL cannot be empty");
    }
    let url = Url::parse(raw.trim())
        .map_err(|e| anyhow::anyhow!("SCORING_API_URL is not a valid URL: {}", e))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("SCORING_API_URL must start with http:// or https://");
    }
    Ok(url)
}

fn parse_positive(var: &str, default: usize) -> anyhow::Result<usize> {
    let value: usize = std::env::var(var)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a whole number", var))?;
    if value == 0 {
        anyhow::bail!("{} must be at least 1", var);
    }
    Ok(value)
}
