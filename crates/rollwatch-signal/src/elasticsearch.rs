//! Elasticsearch `_count` backend.
//!
//! The query argument is either the path of a query DSL JSON file, sent as
//! the request body, or a Lucene query string sent as the `q` parameter.
//! Which one is decided once, when the backend is built.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;

use rollwatch_core::BreachIndicator;

use crate::error::QueryResult;
use crate::{SignalBackend, build_client, endpoint_url, fetch_body};

pub const DEFAULT_ADDRESS: &str = "http://localhost:9200";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How the count query is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountQuery {
    /// Query DSL document read from a local file.
    Document { path: PathBuf, body: Vec<u8> },
    /// Lucene query string.
    Lucene(String),
}

impl CountQuery {
    /// Use the file at `arg` as a DSL document if it can be read, otherwise
    /// treat `arg` as a Lucene query.
    pub fn resolve(arg: &str) -> Self {
        match std::fs::read(Path::new(arg)) {
            Ok(body) => CountQuery::Document {
                path: PathBuf::from(arg),
                body,
            },
            Err(_) => CountQuery::Lucene(arg.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

pub struct ElasticsearchBackend {
    client: reqwest::Client,
    url: reqwest::Url,
    body: Option<Vec<u8>>,
}

impl ElasticsearchBackend {
    pub fn new(address: &str, query: CountQuery) -> QueryResult<Self> {
        let (url, body) = match query {
            CountQuery::Document { path, body } => {
                debug!(path = %path.display(), "using query DSL file");
                (endpoint_url(address, "/_count", &[])?, Some(body))
            }
            CountQuery::Lucene(q) => {
                debug!(query = %q, "using Lucene query string");
                (endpoint_url(address, "/_count", &[("q", q.as_str())])?, None)
            }
        };

        Ok(Self {
            client: build_client(REQUEST_TIMEOUT)?,
            url,
            body,
        })
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let request = self.client.get(self.url.clone());
        match &self.body {
            Some(body) => request
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone()),
            None => request,
        }
    }
}

/// Read the `count` field of an Elasticsearch `_count` response body.
pub fn parse_count(body: &str) -> QueryResult<BreachIndicator> {
    let response: CountResponse = serde_json::from_str(body)?;
    Ok(response.count)
}

#[async_trait]
impl SignalBackend for ElasticsearchBackend {
    fn name(&self) -> &'static str {
        "elasticsearch"
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }

    async fn query(&self) -> QueryResult<BreachIndicator> {
        let body = fetch_body(&self.url, self.request()).await?;
        debug!(%body, "response body");
        let count = parse_count(&body)?;
        debug!(count, "result count");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;

    #[test]
    fn parse_count_reads_field() {
        let body = r#"{"count": 42, "_shards": {"total": 5, "successful": 5, "failed": 0}}"#;
        assert_eq!(parse_count(body).unwrap(), 42);
    }

    #[test]
    fn parse_count_requires_field() {
        assert!(matches!(
            parse_count(r#"{"error": "index_not_found"}"#),
            Err(QueryError::Decode(_))
        ));
    }

    #[test]
    fn resolve_readable_file_as_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("query.json");
        std::fs::write(&path, r#"{"query": {"match": {"status": 500}}}"#).unwrap();

        let query = CountQuery::resolve(path.to_str().unwrap());
        match query {
            CountQuery::Document { body, .. } => {
                assert_eq!(body, br#"{"query": {"match": {"status": 500}}}"#.to_vec());
            }
            other => panic!("expected Document, got {other:?}"),
        }
    }

    #[test]
    fn resolve_other_text_as_lucene() {
        let query = CountQuery::resolve("status:500 AND kubernetes.labels.app:app");
        assert_eq!(
            query,
            CountQuery::Lucene("status:500 AND kubernetes.labels.app:app".to_string())
        );
    }

    #[test]
    fn resolve_directory_as_lucene() {
        let dir = tempfile::tempdir().unwrap();
        let arg = dir.path().to_str().unwrap();
        assert_eq!(CountQuery::resolve(arg), CountQuery::Lucene(arg.to_string()));
    }

    #[test]
    fn lucene_goes_in_query_string() {
        let backend = ElasticsearchBackend::new(
            "http://localhost:9200",
            CountQuery::Lucene("status:500".to_string()),
        )
        .unwrap();
        assert_eq!(backend.describe(), "http://localhost:9200/_count?q=status%3A500");
        assert!(backend.body.is_none());
    }

    #[test]
    fn document_has_no_query_string() {
        let backend = ElasticsearchBackend::new(
            "http://localhost:9200",
            CountQuery::Document {
                path: PathBuf::from("q.json"),
                body: b"{}".to_vec(),
            },
        )
        .unwrap();
        assert_eq!(backend.describe(), "http://localhost:9200/_count");
        assert_eq!(backend.body.as_deref(), Some(&b"{}"[..]));
    }
}
