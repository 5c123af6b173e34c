//! Shared types used across rollwatch crates.

use serde::{Deserialize, Serialize};

/// Number of matching results (series, documents, or events) observed by one query.
pub type BreachIndicator = u64;

/// A key/value pair attached to an error event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An error event as returned by the event backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<Tag>,
}

impl Event {
    pub fn new(message: impl Into<String>, tags: Vec<Tag>) -> Self {
        Self {
            message: message.into(),
            tags,
        }
    }
}

/// Sentry sends `null` for absent fields; read those as the empty value.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Successful terminal state of a monitoring run.
///
/// Failed runs (preflight, query, rollback) are reported as errors by the
/// monitor instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// A breach was detected and the release was rolled back.
    RolledBack { observed: BreachIndicator },
    /// The overall timeout elapsed without a breach.
    TimedOut,
    /// An operator interrupt arrived before any breach.
    Cancelled,
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::RolledBack { .. } => "rolled-back",
            RunOutcome::TimedOut => "timed-out",
            RunOutcome::Cancelled => "cancelled",
        }
    }
}
