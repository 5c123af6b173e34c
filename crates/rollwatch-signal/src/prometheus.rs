//! Prometheus instant-query backend.
//!
//! The indicator is the number of series returned for the PromQL
//! expression, so queries are written to return nothing while healthy,
//! e.g. `rate(http_requests_total{code=~"^5.*$"}[5m]) > 0`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use rollwatch_core::BreachIndicator;

use crate::error::QueryResult;
use crate::{SignalBackend, build_client, endpoint_url, fetch_body};

pub const DEFAULT_ADDRESS: &str = "http://localhost:9090";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct QueryResponse {
    data: QueryData,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    result: Vec<serde_json::Value>,
}

pub struct PrometheusBackend {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl PrometheusBackend {
    pub fn new(address: &str, query: &str) -> QueryResult<Self> {
        Ok(Self {
            client: build_client(REQUEST_TIMEOUT)?,
            url: endpoint_url(address, "/api/v1/query", &[("query", query)])?,
        })
    }
}

/// Count the result entries of a Prometheus query response body.
pub fn parse_result_count(body: &str) -> QueryResult<BreachIndicator> {
    let response: QueryResponse = serde_json::from_str(body)?;
    Ok(response.data.result.len() as BreachIndicator)
}

#[async_trait]
impl SignalBackend for PrometheusBackend {
    fn name(&self) -> &'static str {
        "prometheus"
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }

    async fn query(&self) -> QueryResult<BreachIndicator> {
        let body = fetch_body(&self.url, self.client.get(self.url.clone())).await?;
        let count = parse_result_count(&body)?;
        debug!(count, "result count");
        Ok(count)
    }
}
