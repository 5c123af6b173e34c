//! rollwatch-signal: health signal backends for release monitoring.
//!
//! Each backend issues exactly one HTTP request per call to
//! [`SignalBackend::query`] and reduces the response to a breach
//! indicator: a plain count that the monitor compares against its
//! threshold.
//!
//! # Backends
//!
//! | Backend | Request | Indicator |
//! |---|---|---|
//! | [`PrometheusBackend`] | `GET /api/v1/query?query=…` | `len(data.result)` |
//! | [`ElasticsearchBackend`] | `GET /_count` (DSL body or `q=`) | `count` |
//! | [`SentryBackend`] | `GET /api/0/projects/{org}/{project}/events/` | matched events |
//!
//! Requests are fully built at construction; nothing about them changes
//! between ticks.

pub mod elasticsearch;
pub mod error;
pub mod matcher;
pub mod prometheus;
pub mod sentry;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use rollwatch_core::BreachIndicator;

pub use elasticsearch::{CountQuery, ElasticsearchBackend};
pub use error::{QueryError, QueryResult};
pub use matcher::{match_events, match_tags, parse_tags};
pub use prometheus::PrometheusBackend;
pub use sentry::{SentryBackend, SentryOptions};

/// A source of health signals for a release.
#[async_trait]
pub trait SignalBackend: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// The request this backend issues, for debug output.
    fn describe(&self) -> String;

    /// Issue one query and return the observed breach indicator.
    async fn query(&self) -> QueryResult<BreachIndicator>;
}

pub(crate) fn build_client(timeout: Duration) -> QueryResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("rollwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(QueryError::Client)
}

/// Parse `base` + `path` into a URL, trimming a trailing slash on the base.
pub(crate) fn endpoint_url(
    base: &str,
    path: &str,
    params: &[(&str, &str)],
) -> QueryResult<reqwest::Url> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path);
    let parsed = if params.is_empty() {
        reqwest::Url::parse(&raw)
    } else {
        reqwest::Url::parse_with_params(&raw, params)
    };
    parsed.map_err(|e| QueryError::InvalidUrl {
        url: raw,
        reason: e.to_string(),
    })
}

/// Send a request and return the body of a 2xx response.
pub(crate) async fn fetch_body(
    url: &reqwest::Url,
    request: reqwest::RequestBuilder,
) -> QueryResult<String> {
    debug!(%url, "processing URL");

    let response = request.send().await.map_err(|source| QueryError::Transport {
        url: url.to_string(),
        source,
    })?;
    let status = response.status();
    let body = response.text().await.map_err(|source| QueryError::Transport {
        url: url.to_string(),
        source,
    })?;

    if !status.is_success() {
        return Err(QueryError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_trims_trailing_slash() {
        let url = endpoint_url("https://sentry.example.com/", "/api/0/projects/a/b/events/", &[])
            .unwrap();
        assert_eq!(url.as_str(), "https://sentry.example.com/api/0/projects/a/b/events/");
    }

    #[test]
    fn endpoint_url_encodes_params() {
        let url = endpoint_url(
            "http://localhost:9090",
            "/api/v1/query",
            &[("query", r#"rate(http_requests_total{code=~"^5.*$"}[5m]) > 0"#)],
        )
        .unwrap();
        assert_eq!(url.path(), "/api/v1/query");
        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "query");
        assert_eq!(value, r#"rate(http_requests_total{code=~"^5.*$"}[5m]) > 0"#);
    }

    #[test]
    fn endpoint_url_rejects_garbage() {
        let err = endpoint_url("not a url", "/_count", &[]).unwrap_err();
        assert!(matches!(err, QueryError::InvalidUrl { .. }));
    }
}
