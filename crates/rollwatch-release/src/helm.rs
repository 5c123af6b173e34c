//! Helm-backed deployment controller.
//!
//! Status:   `helm status <release>`
//! Rollback: `helm rollback <release> 0 --timeout <n>s [flags]`
//!
//! Revision `0` asks helm for the previous revision. The binary is taken
//! from `$ROLLWATCH_HELM_PATH`, falling back to `helm` on `$PATH`.

use std::ffi::OsString;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use rollwatch_core::RollbackOptions;

use crate::controller::{ReleaseController, ReleaseStatus};
use crate::error::{ControllerError, ControllerResult};

pub const HELM_PATH_ENV: &str = "ROLLWATCH_HELM_PATH";

#[derive(Debug, Clone)]
pub struct HelmController {
    binary: PathBuf,
    namespace: Option<String>,
    kube_context: Option<String>,
}

impl HelmController {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            namespace: None,
            kube_context: None,
        }
    }

    /// Locate helm via `$ROLLWATCH_HELM_PATH`, then `$PATH`.
    pub fn locate() -> Self {
        Self::new(binary_from_env(std::env::var_os(HELM_PATH_ENV)))
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_kube_context(mut self, kube_context: Option<String>) -> Self {
        self.kube_context = kube_context;
        self
    }

    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }

    pub fn status_args(&self, name: &str) -> Vec<String> {
        let mut args = vec!["status".to_string(), name.to_string()];
        self.push_scope(&mut args);
        args
    }

    pub fn rollback_args(&self, name: &str, options: &RollbackOptions) -> Vec<String> {
        let mut args = vec![
            "rollback".to_string(),
            name.to_string(),
            "0".to_string(),
            "--timeout".to_string(),
            format!("{}s", options.timeout.as_secs()),
        ];
        if options.dry_run {
            args.push("--dry-run".to_string());
        }
        if options.force {
            args.push("--force".to_string());
        }
        if options.disable_hooks {
            args.push("--no-hooks".to_string());
        }
        if options.wait {
            args.push("--wait".to_string());
        }
        self.push_scope(&mut args);
        args
    }

    fn push_scope(&self, args: &mut Vec<String>) {
        if let Some(ns) = &self.namespace {
            args.push("--namespace".to_string());
            args.push(ns.clone());
        }
        if let Some(ctx) = &self.kube_context {
            args.push("--kube-context".to_string());
            args.push(ctx.clone());
        }
    }

    async fn run(&self, args: Vec<String>) -> ControllerResult<String> {
        let command = format!("{} {}", self.binary.display(), args.join(" "));
        debug!(%command, "running helm");

        let output = Command::new(&self.binary)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ControllerError::Spawn {
                binary: self.binary.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ControllerError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn binary_from_env(value: Option<OsString>) -> PathBuf {
    match value {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from("helm"),
    }
}

#[async_trait]
impl ReleaseController for HelmController {
    async fn release_status(&self, name: &str) -> ControllerResult<ReleaseStatus> {
        let raw = self.run(self.status_args(name)).await?;
        debug!(release = %name, "release status retrieved");
        Ok(ReleaseStatus {
            name: name.to_string(),
            raw,
        })
    }

    async fn rollback(&self, name: &str, options: &RollbackOptions) -> ControllerResult<()> {
        let out = self.run(self.rollback_args(name, options)).await?;
        info!(release = %name, dry_run = options.dry_run, "helm rollback finished");
        debug!(output = %out.trim(), "helm rollback output");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn status_args_plain() {
        let helm = HelmController::new("helm");
        assert_eq!(helm.status_args("frontend"), vec!["status", "frontend"]);
    }

    #[test]
    fn status_args_scoped() {
        let helm = HelmController::new("helm")
            .with_namespace(Some("web".to_string()))
            .with_kube_context(Some("prod".to_string()));
        assert_eq!(
            helm.status_args("frontend"),
            vec!["status", "frontend", "--namespace", "web", "--kube-context", "prod"]
        );
    }

    #[test]
    fn rollback_args_defaults() {
        let helm = HelmController::new("helm");
        let args = helm.rollback_args("frontend", &RollbackOptions::default());
        assert_eq!(args, vec!["rollback", "frontend", "0", "--timeout", "300s"]);
    }

    #[test]
    fn rollback_args_all_flags() {
        let helm = HelmController::new("helm").with_namespace(Some("web".to_string()));
        let options = RollbackOptions {
            dry_run: true,
            force: true,
            disable_hooks: true,
            wait: true,
            timeout: Duration::from_secs(60),
        };
        assert_eq!(
            helm.rollback_args("frontend", &options),
            vec![
                "rollback", "frontend", "0", "--timeout", "60s", "--dry-run", "--force",
                "--no-hooks", "--wait", "--namespace", "web",
            ]
        );
    }

    #[test]
    fn binary_defaults_to_helm() {
        assert_eq!(binary_from_env(None), PathBuf::from("helm"));
        assert_eq!(binary_from_env(Some(OsString::new())), PathBuf::from("helm"));
        assert_eq!(
            binary_from_env(Some(OsString::from("/opt/helm/bin/helm"))),
            PathBuf::from("/opt/helm/bin/helm")
        );
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let helm = HelmController::new("/nonexistent/rollwatch-helm");
        let err = helm.release_status("frontend").await.unwrap_err();
        assert!(matches!(err, ControllerError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_command_returns_status() {
        // `true` ignores its arguments and exits 0.
        let helm = HelmController::new("true");
        let status = helm.release_status("frontend").await.unwrap();
        assert_eq!(status.name, "frontend");
        helm.rollback("frontend", &RollbackOptions::default()).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_is_command_error() {
        let helm = HelmController::new("false");
        let err = helm
            .rollback("frontend", &RollbackOptions::default())
            .await
            .unwrap_err();
        match err {
            ControllerError::CommandFailed { command, .. } => {
                assert!(command.starts_with("false rollback frontend 0"));
            }
            other => panic!("expected CommandFailed, got {other}"),
        }
    }
}
