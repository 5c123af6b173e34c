//! Monitor error types.

use thiserror::Error;

use rollwatch_core::ConfigError;
use rollwatch_release::ControllerError;
use rollwatch_signal::QueryError;

/// Terminal failures of a monitoring run.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid monitor configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot retrieve status of release {release}: {source}")]
    Preflight {
        release: String,
        #[source]
        source: ControllerError,
    },

    #[error("query failed: {0}")]
    Query(#[from] QueryError),

    #[error("rollback of release {release} failed: {source}")]
    Rollback {
        release: String,
        #[source]
        source: ControllerError,
    },
}

pub type MonitorResult<T> = Result<T, MonitorError>;
