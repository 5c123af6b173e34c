//! Query error types.

use thiserror::Error;

/// Errors produced while building or issuing a backend query.
///
/// Every variant is fatal to the monitoring run; nothing here is retried.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid backend URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("unexpected response payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid message pattern: {0}")]
    Match(#[from] regex::Error),
}

pub type QueryResult<T> = Result<T, QueryError>;
