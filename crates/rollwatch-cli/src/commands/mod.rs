pub mod elasticsearch;
pub mod prometheus;
pub mod sentry;

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use rollwatch_core::{FileConfig, MonitorConfig, RollbackOptions, RunOutcome};
use rollwatch_monitor::{Canceller, Monitor, StopReason};
use rollwatch_release::HelmController;
use rollwatch_signal::SignalBackend;

use crate::GlobalArgs;

const DEFAULT_CONFIG_FILE: &str = "rollwatch.toml";

/// Load `rollwatch.toml` from `--config`, or from the working directory
/// when present. A missing default file is not an error.
pub fn load_file_config(path: Option<&Path>) -> anyhow::Result<FileConfig> {
    match path {
        Some(path) => FileConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display())),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                FileConfig::from_file(default).context("loading ./rollwatch.toml")
            } else {
                Ok(FileConfig::default())
            }
        }
    }
}

/// Merge flags over the file over built-in defaults.
pub fn monitor_config(
    release: &str,
    global: &GlobalArgs,
    file: &FileConfig,
) -> anyhow::Result<MonitorConfig> {
    let defaults = MonitorConfig::new(release);
    let rollback_file = file.rollback.clone().unwrap_or_default();

    let poll_interval = pick(global.interval.map(Duration::from_secs), file.interval()?)
        .unwrap_or(defaults.poll_interval);
    let overall_timeout = pick(global.timeout.map(Duration::from_secs), file.timeout()?)
        .unwrap_or(defaults.overall_timeout);
    let threshold = pick(global.expected_result_count, file.expected_result_count())
        .unwrap_or(defaults.threshold);
    let rollback_timeout = pick(
        global.rollback_timeout.map(Duration::from_secs),
        file.rollback_timeout()?,
    )
    .unwrap_or(defaults.rollback.timeout);

    let rollback = RollbackOptions {
        dry_run: global.dry_run || rollback_file.dry_run.unwrap_or(false),
        force: global.force || rollback_file.force.unwrap_or(false),
        disable_hooks: global.no_hooks || rollback_file.no_hooks.unwrap_or(false),
        wait: global.wait || rollback_file.wait.unwrap_or(false),
        timeout: rollback_timeout,
    };

    let config = defaults
        .with_poll_interval(poll_interval)
        .with_overall_timeout(overall_timeout)
        .with_threshold(threshold)
        .with_rollback(rollback);
    config.validate()?;
    Ok(config)
}

pub fn helm_controller(global: &GlobalArgs, file: &FileConfig) -> HelmController {
    let helm = file.helm.clone().unwrap_or_default();
    HelmController::locate()
        .with_namespace(pick(global.namespace.clone(), helm.namespace))
        .with_kube_context(pick(global.kube_context.clone(), helm.kube_context))
}

/// Flag value if given, else the file value.
pub fn pick<T>(flag: Option<T>, file: Option<T>) -> Option<T> {
    flag.or(file)
}

pub fn address(flag: Option<String>, file: Option<String>, default: &str) -> String {
    pick(flag, file).unwrap_or_else(|| default.to_string())
}

/// Run the monitor for `release` against `backend`, stopping on SIGINT/SIGTERM.
pub async fn watch(
    release: &str,
    global: &GlobalArgs,
    file: &FileConfig,
    backend: &dyn SignalBackend,
) -> anyhow::Result<RunOutcome> {
    let config = monitor_config(release, global, file)?;
    let controller = helm_controller(global, file);

    let monitor = Monitor::new(config);
    let signals = forward_interrupts(monitor.canceller());
    let result = monitor.run(backend, &controller).await;
    signals.abort();

    Ok(result?)
}

fn forward_interrupts(canceller: Canceller) -> JoinHandle<()> {
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        if canceller.cancel(StopReason::Interrupted) {
            info!(signal, "interrupt received, stopping");
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM");
            return ctrl_c().await;
        }
    };

    tokio::select! {
        signal = ctrl_c() => signal,
        _ = term.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "SIGINT",
        Err(e) => {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending().await
        }
    }
}
