pub mod config;
pub mod types;

pub use config::{ConfigError, FileConfig, MonitorConfig, RollbackOptions, parse_duration};
pub use types::*;
