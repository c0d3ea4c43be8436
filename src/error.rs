//! Error types shared across the collector.

use thiserror::Error;

/// Rejected query parameter. Raised before any request is sent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("invalid status value '{value}': must be one of scheduled, in_progress, final, postponed, cancelled")]
    InvalidStatus { value: String },
}

/// Failure of a single API request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// 400 from the API: the request itself is malformed. Never retried.
    #[error("bad request to {endpoint} ({url}): {body}")]
    BadRequest {
        endpoint: String,
        url: String,
        body: String,
    },

    /// Non-success status that is not retryable (or not a 400).
    #[error("request to {endpoint} failed with status {status}: {body}")]
    RequestFailure {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Transient failures persisted past the retry ceiling.
    #[error("request to {endpoint} gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        endpoint: String,
        attempts: u32,
        last: String,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    InvalidParam(#[from] ParamError),
}

impl FetchError {
    /// Client-side problems (bad params, 400) as opposed to upstream trouble.
    pub fn is_client_error(&self) -> bool {
        matches!(self, FetchError::BadRequest { .. } | FetchError::InvalidParam(_))
    }
}

/// Fatal failures that abort a whole collection run.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("no teams returned for season {season}; nothing to collect")]
    NoTeams { season: String },

    #[error("failed to write {kind} output: {source}")]
    Export {
        kind: String,
        #[source]
        source: anyhow::Error,
    },
}
