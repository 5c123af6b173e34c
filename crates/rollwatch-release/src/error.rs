//! Deployment controller error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("failed to execute {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
}

pub type ControllerResult<T> = Result<T, ControllerError>;
