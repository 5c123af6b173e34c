//! rollwatch-release: the deployment controller side of release monitoring.
//!
//! The monitor talks to releases only through [`ReleaseController`]: one
//! read-only status check before polling starts, and at most one rollback
//! after a breach. [`HelmController`] implements it by running the `helm`
//! binary.
//!
//! # Components
//!
//! - **`controller`**: the `ReleaseController` trait and `ReleaseStatus`
//! - **`helm`**: `HelmController`, command construction and execution

pub mod controller;
pub mod error;
pub mod helm;

pub use controller::{ReleaseController, ReleaseStatus};
pub use error::{ControllerError, ControllerResult};
pub use helm::HelmController;
