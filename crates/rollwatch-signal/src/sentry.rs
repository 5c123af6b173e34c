//! Sentry project events backend.
//!
//! Sentry's project events endpoint has no server-side filter for our
//! criteria, so every tick fetches the current event list and filters it
//! locally with [`match_events`].

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use rollwatch_core::{BreachIndicator, Event, Tag};

use crate::error::{QueryError, QueryResult};
use crate::matcher::match_events;
use crate::{SignalBackend, build_client, endpoint_url, fetch_body};

pub const DEFAULT_ADDRESS: &str = "http://localhost:9000";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct SentryOptions {
    pub address: String,
    pub api_key: String,
    pub organization: String,
    pub project: String,
    /// Event message to match; empty accepts any message.
    pub message: String,
    /// Treat `message` as a regular expression.
    pub use_regex: bool,
    pub tags: Vec<Tag>,
}

pub struct SentryBackend {
    client: reqwest::Client,
    url: reqwest::Url,
    api_key: String,
    message: String,
    use_regex: bool,
    tags: Vec<Tag>,
}

impl SentryBackend {
    pub fn new(options: SentryOptions) -> QueryResult<Self> {
        if options.api_key.is_empty() {
            return Err(QueryError::MissingSetting("api-key"));
        }
        if options.organization.is_empty() {
            return Err(QueryError::MissingSetting("organization"));
        }
        if options.project.is_empty() {
            return Err(QueryError::MissingSetting("project"));
        }
        if options.use_regex {
            Regex::new(&options.message)?;
        }

        let path = format!(
            "/api/0/projects/{}/{}/events/",
            options.organization, options.project
        );

        Ok(Self {
            client: build_client(REQUEST_TIMEOUT)?,
            url: endpoint_url(&options.address, &path, &[])?,
            api_key: options.api_key,
            message: options.message,
            use_regex: options.use_regex,
            tags: options.tags,
        })
    }
}

#[async_trait]
impl SignalBackend for SentryBackend {
    fn name(&self) -> &'static str {
        "sentry"
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }

    async fn query(&self) -> QueryResult<BreachIndicator> {
        let request = self.client.get(self.url.clone()).bearer_auth(&self.api_key);
        let body = fetch_body(&self.url, request).await?;

        let events: Vec<Event> = serde_json::from_str(&body)?;
        debug!(count = events.len(), "result count");

        let matched = match_events(&events, &self.message, &self.tags, self.use_regex)?;
        debug!(matched = matched.len(), "matched events");

        Ok(matched.len() as BreachIndicator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SentryOptions {
        SentryOptions {
            address: DEFAULT_ADDRESS.to_string(),
            api_key: "key".to_string(),
            organization: "acme".to_string(),
            project: "frontend".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn url_includes_org_and_project() {
        let backend = SentryBackend::new(options()).unwrap();
        assert_eq!(
            backend.describe(),
            "http://localhost:9000/api/0/projects/acme/frontend/events/"
        );
    }

    #[test]
    fn requires_credentials_and_scope() {
        for (field, opts) in [
            ("api-key", SentryOptions { api_key: String::new(), ..options() }),
            ("organization", SentryOptions { organization: String::new(), ..options() }),
            ("project", SentryOptions { project: String::new(), ..options() }),
        ] {
            match SentryBackend::new(opts) {
                Err(QueryError::MissingSetting(missing)) => assert_eq!(missing, field),
                Err(other) => panic!("expected MissingSetting({field}), got {other}"),
                Ok(_) => panic!("expected MissingSetting({field})"),
            }
        }
    }

    #[test]
    fn invalid_regex_rejected_up_front() {
        let opts = SentryOptions {
            message: "(".to_string(),
            use_regex: true,
            ..options()
        };
        assert!(matches!(SentryBackend::new(opts), Err(QueryError::Match(_))));
    }

    #[test]
    fn literal_message_is_not_compiled() {
        let opts = SentryOptions {
            message: "(".to_string(),
            use_regex: false,
            ..options()
        };
        assert!(SentryBackend::new(opts).is_ok());
    }
}
