use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Every variable has a default suitable for a local generation server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Endpoint of the external card generation service.
    pub generation_url: String,
    /// Retrieval endpoint that non-inline image references are routed through on import.
    pub asset_endpoint: String,
    pub max_concurrent_requests: usize,
    /// Pause between two rehydrated cells during a document replay.
    pub import_delay: Duration,
    pub request_timeout: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let max_concurrent_requests = parse_env("MAX_CONCURRENT_REQUESTS", 4usize)?;
        if max_concurrent_requests == 0 {
            bail!("MAX_CONCURRENT_REQUESTS must be at least 1");
        }

        let import_delay_ms = parse_env("IMPORT_DELAY_MS", 100u64)?;
        if import_delay_ms == 0 {
            bail!("IMPORT_DELAY_MS must be at least 1");
        }

        Ok(Config {
            generation_url: std::env::var("GENERATION_URL")
                .unwrap_or_else(|_| "http://localhost:5001/generate-card".to_string()),
            asset_endpoint: std::env::var("ASSET_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:5001/get-local-image".to_string()),
            max_concurrent_requests,
            import_delay: Duration::from_millis(import_delay_ms),
            request_timeout: Duration::from_secs(parse_env("REQUEST_TIMEOUT_SECS", 120u64)?),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
