//! HTTP session: bearer auth, pooled connections, rate limiting and bounded retry.

use crate::config::Config;
use crate::error::FetchError;
use crate::params::QueryParams;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{error, info, warn};

/// Statuses worth another attempt.
pub const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Anything that can answer `GET {endpoint}?{params}` with JSON.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn get_json(&self, endpoint: &str, params: &QueryParams) -> Result<Value, FetchError>;
}

/// Bounded exponential retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub backoff_factor: Duration,
}

impl RetryPolicy {
    pub fn should_retry(&self, status: u16) -> bool {
        RETRY_STATUSES.contains(&status)
    }

    /// Sleep before attempt `attempt + 1`, given that `attempt` (1-based) just failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.backoff_factor
            .saturating_mul(2u32.pow(exp))
            .min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_factor: Duration::from_millis(500),
        }
    }
}

type DirectLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

/// reqwest-backed transport. One instance is shared read-only by every worker.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
    rate_limiter: DirectLimiter,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let per_minute = NonZeroU32::new(config.rate_limit_per_minute)
            .ok_or_else(|| anyhow!("RATE_LIMIT_PER_MINUTE must be greater than zero"))?;
        let rate_limiter = RateLimiter::direct(Quota::per_minute(per_minute));

        // HTTP client with timeouts
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(config.max_workers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            retry: RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                backoff_factor: config.backoff_factor,
            },
            rate_limiter,
        })
    }

    async fn wait_before_retry(&self, endpoint: &str, attempt: u32, reason: &str) {
        let delay = self.retry.backoff(attempt);
        warn!(
            "Request to {} failed ({}), attempt {}/{}. Retrying in {:?}",
            endpoint, reason, attempt, self.retry.max_attempts, delay
        );
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn get_json(&self, endpoint: &str, params: &QueryParams) -> Result<Value, FetchError> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));

        // Log request details before URL encoding
        info!("Making request to {}", url);
        info!("Request parameters: {:?}", params);

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.rate_limiter.until_ready().await;

            let request = self
                .client
                .get(&url)
                .bearer_auth(&self.api_key)
                .header(ACCEPT, "application/json")
                .query(params)
                .build()?;
            let encoded_url = request.url().to_string();
            info!("Full URL after encoding: {}", encoded_url);

            let response = match self.client.execute(request).await {
                Ok(response) => response,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    if attempt < self.retry.max_attempts {
                        self.wait_before_retry(endpoint, attempt, &e.to_string()).await;
                        continue;
                    }
                    error!("Error making request to {}: {}", endpoint, e);
                    return Err(FetchError::RetriesExhausted {
                        endpoint: endpoint.to_string(),
                        attempts: attempt,
                        last: e.to_string(),
                    });
                }
                Err(e) => {
                    error!("Error making request to {}: {}", endpoint, e);
                    return Err(e.into());
                }
            };

            let status = response.status();
            info!("Response status code: {}", status.as_u16());
            let body = response.text().await?;

            if status.is_success() {
                let data: Value = serde_json::from_str(&body).map_err(|source| FetchError::Decode {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
                match &data {
                    Value::Array(items) => info!("Retrieved {} items from API", items.len()),
                    _ => info!("Retrieved data from API"),
                }
                return Ok(data);
            }

            error!("Response content: {}", body);

            if status == StatusCode::BAD_REQUEST {
                error!("Bad request to {}. Full URL: {}", endpoint, encoded_url);
                return Err(FetchError::BadRequest {
                    endpoint: endpoint.to_string(),
                    url: encoded_url,
                    body,
                });
            }

            if self.retry.should_retry(status.as_u16()) {
                if attempt < self.retry.max_attempts {
                    self.wait_before_retry(endpoint, attempt, status.as_str()).await;
                    continue;
                }
                return Err(FetchError::RetriesExhausted {
                    endpoint: endpoint.to_string(),
                    attempts: attempt,
                    last: format!("status {}: {}", status.as_u16(), body),
                });
            }

            return Err(FetchError::RequestFailure {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
    }
}
