//! rollwatch-monitor: watch a freshly deployed release and roll it back
//! the first time its health signal breaches a threshold.
//!
//! # Architecture
//!
//! ```text
//! Monitor::run
//!   ├── ReleaseController::release_status()   (pre-flight, once)
//!   ├── poll loop (one ticker, one select)
//!   │   ├── SignalBackend::query() → BreachIndicator
//!   │   └── observed > threshold → claim the Canceller, stop ticking
//!   ├── timeout watcher ──┐
//!   ├── interrupt handler ┴─→ Canceller (first reason wins)
//!   └── ReleaseController::rollback()          (on breach, at most once)
//! ```
//!
//! Failed queries are not retried: the first error ends the run.

pub mod cancel;
pub mod error;
pub mod monitor;

pub use cancel::{Canceller, StopReason};
pub use error::{MonitorError, MonitorResult};
pub use monitor::Monitor;
