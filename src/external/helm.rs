//! Release manager abstraction
//!
//! Wraps helm as an "ensure release at version X with values Y" collaborator.
//! Upgrade-or-install converges to the same release state on repeat calls.

use super::command::{CommandError, CommandExecutor};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("Chart repository unavailable: {repo}")]
    RepoUnavailable { repo: String },
    #[error("Release already being operated on: {release}")]
    ReleaseBusy { release: String },
    #[error("Release manager reported failure: {message}")]
    ToolFailed { message: String },
    #[error("Command execution error: {source}")]
    CommandError {
        #[from]
        source: CommandError,
    },
}

/// One "ensure release" request: release name, chart, and value overrides.
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    pub release: String,
    pub chart: String,
    pub repo: String,
    pub repo_url: String,
    pub namespace: String,
    pub values_file: Option<PathBuf>,
    pub set_overrides: Vec<String>,
}

/// Trait for the package/release manager
#[async_trait]
pub trait ReleaseManager: Send + Sync {
    /// Register and refresh a chart repository. Adding an existing repo with
    /// the same URL is a no-op.
    async fn ensure_repo(&self, name: &str, url: &str) -> Result<(), ReleaseError>;

    /// Upgrade-or-install the release. Safe to call repeatedly with
    /// identical inputs.
    async fn upgrade_install(&self, request: &ReleaseRequest) -> Result<(), ReleaseError>;
}

/// Real helm implementation
pub struct HelmCli {
    executor: Arc<dyn CommandExecutor>,
    kubeconfig: PathBuf,
}

impl HelmCli {
    pub fn new(executor: Arc<dyn CommandExecutor>, kubeconfig: PathBuf) -> Self {
        Self {
            executor,
            kubeconfig,
        }
    }

    async fn run_helm(&self, args: &[&str]) -> Result<String, ReleaseError> {
        let output = self.executor.execute("helm", args).await?;
        if !output.success() {
            return Err(classify_helm_error(&output.stderr, args));
        }
        Ok(output.stdout)
    }
}

fn classify_helm_error(stderr: &str, args: &[&str]) -> ReleaseError {
    let lowered = stderr.to_lowercase();
    if lowered.contains("looks like") && lowered.contains("is not a valid chart repository") {
        ReleaseError::RepoUnavailable {
            repo: args.get(2).unwrap_or(&"unknown").to_string(),
        }
    } else if lowered.contains("another operation") && lowered.contains("in progress") {
        ReleaseError::ReleaseBusy {
            release: args.get(2).unwrap_or(&"unknown").to_string(),
        }
    } else {
        ReleaseError::ToolFailed {
            message: stderr.trim().to_string(),
        }
    }
}

#[async_trait]
impl ReleaseManager for HelmCli {
    async fn ensure_repo(&self, name: &str, url: &str) -> Result<(), ReleaseError> {
        self.run_helm(&["repo", "add", name, url, "--force-update"])
            .await?;
        self.run_helm(&["repo", "update"]).await?;
        Ok(())
    }

    async fn upgrade_install(&self, request: &ReleaseRequest) -> Result<(), ReleaseError> {
        let kubeconfig_flag = format!("--kubeconfig={}", self.kubeconfig.display());
        let mut args = vec![
            "upgrade",
            "--install",
            request.release.as_str(),
            request.chart.as_str(),
            "--namespace",
            request.namespace.as_str(),
            kubeconfig_flag.as_str(),
        ];

        let values_flag = request
            .values_file
            .as_ref()
            .map(|p| p.display().to_string());
        if let Some(values) = values_flag.as_deref() {
            args.extend(["-f", values]);
        }
        for override_pair in &request.set_overrides {
            args.extend(["--set", override_pair.as_str()]);
        }

        tracing::info!(
            release = %request.release,
            chart = %request.chart,
            namespace = %request.namespace,
            "Ensuring helm release"
        );
        self.run_helm(&args).await?;
        Ok(())
    }
}
