//! Deployment controller contract.

use async_trait::async_trait;

use rollwatch_core::RollbackOptions;

use crate::error::ControllerResult;

/// Result of a release status lookup.
///
/// The monitor only uses the lookup as an existence check; the raw output is
/// kept for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseStatus {
    pub name: String,
    pub raw: String,
}

/// Reports release status and rolls releases back to their previous revision.
#[async_trait]
pub trait ReleaseController: Send + Sync {
    /// Fetch the current status of `name`. Fails if the release cannot be observed.
    async fn release_status(&self, name: &str) -> ControllerResult<ReleaseStatus>;

    /// Roll `name` back to its previous revision.
    async fn rollback(&self, name: &str, options: &RollbackOptions) -> ControllerResult<()>;
}
