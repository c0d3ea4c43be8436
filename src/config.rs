//! Environment-driven configuration.

use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Hard ceiling on concurrent per-team fetches, regardless of roster size.
pub const MAX_WORKER_CEILING: usize = 10;

pub const DEFAULT_BASE_URL: &str = "https://api.collegebasketballdata.com";

/// Configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub max_workers: usize,
    pub max_attempts: u32,
    pub backoff_factor: Duration,
    pub request_timeout: Duration,
    pub rate_limit_per_minute: u32,
    /// Fixed delay between teams in sequential mode
    pub sequential_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_key = match env::var("API_KEY") {
            Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
            Ok(_) => return Err(anyhow!("API_KEY is set but empty")),
            Err(_) => return Err(anyhow!("API key not found. Please set API_KEY in your environment or .env file")),
        };
        validate_api_key(&api_key)?;

        let output_dir = PathBuf::from(env::var("OUTPUT_DIR").unwrap_or_else(|_| "data_output".to_string()));
        let cache_dir = env::var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| output_dir.join("cache"));

        Ok(Self {
            api_key,
            base_url: env::var("CBB_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            output_dir,
            cache_dir,
            max_workers: clamp_workers(env_parse("MAX_WORKERS", MAX_WORKER_CEILING)),
            max_attempts: env_parse::<u32>("MAX_ATTEMPTS", 5).max(1),
            backoff_factor: Duration::from_millis(env_parse("BACKOFF_FACTOR_MS", 500)),
            request_timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT_SECONDS", 30)),
            rate_limit_per_minute: env_parse("RATE_LIMIT_PER_MINUTE", 600),
            sequential_delay: Duration::from_millis(env_parse("SEQUENTIAL_DELAY_MS", 1000)),
        })
    }

    /// Defaults with an explicit key; used by tests and embedders that skip the environment.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        let output_dir = PathBuf::from("data_output");
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_dir: output_dir.join("cache"),
            output_dir,
            max_workers: MAX_WORKER_CEILING,
            max_attempts: 5,
            backoff_factor: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            rate_limit_per_minute: 600,
            sequential_delay: Duration::from_millis(1000),
        }
    }
}

/// Prevent accidental use of sample/placeholder keys
fn validate_api_key(key: &str) -> Result<()> {
    let key_lower = key.to_lowercase();
    if key_lower.contains("change_me") || key_lower.contains("your_") || key_lower.starts_with("sample") {
        return Err(anyhow!(
            "API_KEY appears to be a placeholder value; replace with your real key"
        ));
    }
    Ok(())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn clamp_workers(requested: usize) -> usize {
    requested.clamp(1, MAX_WORKER_CEILING)
}
