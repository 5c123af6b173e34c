//! Monitor configuration and the optional `rollwatch.toml` file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::types::BreachIndicator;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: &'static str, value: String },

    #[error("poll interval must be greater than zero")]
    ZeroInterval,

    #[error("overall timeout must be greater than zero")]
    ZeroTimeout,

    #[error("{field} must be a whole number of seconds, got {value:?}")]
    FractionalSeconds { field: &'static str, value: Duration },
}

/// Options forwarded verbatim to the deployment controller on rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackOptions {
    pub dry_run: bool,
    pub force: bool,
    pub disable_hooks: bool,
    pub wait: bool,
    /// Time allowed for any individual operation during the rollback.
    pub timeout: Duration,
}

impl Default for RollbackOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            force: false,
            disable_hooks: false,
            wait: false,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Immutable configuration for a single monitoring run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub release_name: String,
    pub poll_interval: Duration,
    pub overall_timeout: Duration,
    /// A breach occurs when the observed indicator is strictly greater than this.
    pub threshold: BreachIndicator,
    pub rollback: RollbackOptions,
}

impl MonitorConfig {
    /// Config with the stock cadence: 10s interval, 300s timeout, threshold 0.
    pub fn new(release_name: impl Into<String>) -> Self {
        Self {
            release_name: release_name.into(),
            poll_interval: Duration::from_secs(10),
            overall_timeout: Duration::from_secs(300),
            threshold: 0,
            rollback: RollbackOptions::default(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    pub fn with_threshold(mut self, threshold: BreachIndicator) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_rollback(mut self, rollback: RollbackOptions) -> Self {
        self.rollback = rollback;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.overall_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        whole_seconds("timeout", self.overall_timeout)?;
        whole_seconds("rollback timeout", self.rollback.timeout)?;
        Ok(())
    }

    /// Whether an observed indicator breaches the threshold.
    pub fn is_breach(&self, observed: BreachIndicator) -> bool {
        observed > self.threshold
    }
}

/// `rollwatch.toml` contents. Every field is optional; command-line flags win.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub monitor: Option<MonitorSection>,
    pub rollback: Option<RollbackSection>,
    pub helm: Option<HelmSection>,
    pub prometheus: Option<EndpointSection>,
    pub elasticsearch: Option<EndpointSection>,
    pub sentry: Option<SentrySection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorSection {
    pub interval: Option<String>,
    pub timeout: Option<String>,
    pub expected_result_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackSection {
    pub timeout: Option<String>,
    pub dry_run: Option<bool>,
    pub force: Option<bool>,
    pub no_hooks: Option<bool>,
    pub wait: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HelmSection {
    pub namespace: Option<String>,
    pub kube_context: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointSection {
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentrySection {
    pub address: Option<String>,
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub project: Option<String>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn interval(&self) -> Result<Option<Duration>, ConfigError> {
        let raw = self.monitor.as_ref().and_then(|m| m.interval.as_deref());
        duration_field("monitor.interval", raw)
    }

    pub fn timeout(&self) -> Result<Option<Duration>, ConfigError> {
        let raw = self.monitor.as_ref().and_then(|m| m.timeout.as_deref());
        duration_field("monitor.timeout", raw)
    }

    pub fn rollback_timeout(&self) -> Result<Option<Duration>, ConfigError> {
        let raw = self.rollback.as_ref().and_then(|r| r.timeout.as_deref());
        duration_field("rollback.timeout", raw)
    }

    pub fn expected_result_count(&self) -> Option<u64> {
        self.monitor.as_ref().and_then(|m| m.expected_result_count)
    }
}

/// Timeouts are reported and forwarded to helm in seconds.
fn whole_seconds(field: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.subsec_nanos() == 0 {
        Ok(())
    } else {
        Err(ConfigError::FractionalSeconds { field, value })
    }
}

fn duration_field(field: &'static str, raw: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(value) => parse_duration(value)
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidDuration {
                field,
                value: value.to_string(),
            }),
    }
}

/// Parse a whole number followed by `ms`, `s`, `m` or `h`. A bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits.parse().ok()?;

    match unit.trim_start() {
        "ms" => Some(Duration::from_millis(value)),
        "" | "s" => Some(Duration::from_secs(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        "h" => value.checked_mul(60 * 60).map(Duration::from_secs),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let config = MonitorConfig::new("frontend");
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.overall_timeout, Duration::from_secs(300));
        assert_eq!(config.threshold, 0);
        assert_eq!(config.rollback.timeout, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn breach_is_strictly_greater_than_threshold() {
        let config = MonitorConfig::new("frontend").with_threshold(2);
        assert!(!config.is_breach(0));
        assert!(!config.is_breach(2));
        assert!(config.is_breach(3));
    }

    #[test]
    fn zero_threshold_breaches_on_first_result() {
        let config = MonitorConfig::new("frontend");
        assert!(!config.is_breach(0));
        assert!(config.is_breach(1));
    }

    #[test]
    fn validate_rejects_zero_durations() {
        let config = MonitorConfig::new("a").with_poll_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroInterval)));

        let config = MonitorConfig::new("a").with_overall_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTimeout)));
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration(" 30 s "), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("5d"), None);
        assert_eq!(parse_duration("s"), None);
        assert_eq!(parse_duration("-5s"), None);
    }

    #[test]
    fn parse_duration_overflow_is_rejected() {
        assert_eq!(parse_duration("307445734561825861m"), None);
        assert_eq!(parse_duration("5124095576030432h"), None);
        assert_eq!(parse_duration("99999999999999999999"), None);
    }

    #[test]
    fn validate_rejects_fractional_timeouts() {
        let config = MonitorConfig::new("a").with_overall_timeout(Duration::from_millis(500));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FractionalSeconds { field: "timeout", .. })
        ));

        let rollback = RollbackOptions {
            timeout: Duration::from_millis(1500),
            ..Default::default()
        };
        let config = MonitorConfig::new("a").with_rollback(rollback);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FractionalSeconds { field: "rollback timeout", .. })
        ));

        let config = MonitorConfig::new("a").with_poll_interval(Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_file() {
        let config = FileConfig::from_toml_str(
            r#"
[monitor]
interval = "5s"
timeout = "2m"
expected_result_count = 3

[rollback]
timeout = "60s"
wait = true

[helm]
namespace = "web"

[prometheus]
address = "http://prometheus:9090"

[sentry]
api_key = "secret"
organization = "acme"
project = "frontend"
"#,
        )
        .unwrap();

        assert_eq!(config.interval().unwrap(), Some(Duration::from_secs(5)));
        assert_eq!(config.timeout().unwrap(), Some(Duration::from_secs(120)));
        assert_eq!(config.rollback_timeout().unwrap(), Some(Duration::from_secs(60)));
        assert_eq!(config.expected_result_count(), Some(3));
        assert_eq!(config.helm.unwrap().namespace.as_deref(), Some("web"));
        assert_eq!(
            config.prometheus.unwrap().address.as_deref(),
            Some("http://prometheus:9090")
        );
        assert_eq!(config.sentry.unwrap().organization.as_deref(), Some("acme"));
    }

    #[test]
    fn empty_file_has_no_overrides() {
        let config = FileConfig::from_toml_str("").unwrap();
        assert_eq!(config.interval().unwrap(), None);
        assert_eq!(config.expected_result_count(), None);
    }

    #[test]
    fn invalid_duration_names_the_field() {
        let config = FileConfig::from_toml_str("[monitor]\ninterval = \"often\"\n").unwrap();
        let err = config.interval().unwrap_err();
        assert!(err.to_string().contains("monitor.interval"));
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollwatch.toml");
        std::fs::write(&path, "[monitor]\ntimeout = \"30s\"\n").unwrap();

        let config = FileConfig::from_file(&path).unwrap();
        assert_eq!(config.timeout().unwrap(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn from_file_missing_is_read_error() {
        let err = FileConfig::from_file(Path::new("/nonexistent/rollwatch.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
