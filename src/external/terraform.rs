//! Infrastructure provisioner abstraction
//!
//! Wraps terraform as an opaque init/apply/destroy collaborator. State lives
//! in the provider workdir; the orchestrator only sees success or failure.

use super::command::{CommandError, CommandExecutor};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error("Provisioner working directory not found: {dir}")]
    WorkdirNotFound { dir: String },
    #[error("Provisioner reported failure: {message}")]
    ToolFailed { message: String },
    #[error("Command execution error: {source}")]
    CommandError {
        #[from]
        source: CommandError,
    },
    #[error("IO error: {message}")]
    Io { message: String },
}

/// Flat variable set handed to the provisioner, derived from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TfVars {
    pub cluster_name: String,
    pub region_var: String,
    pub region: String,
    pub environment: String,
    pub kubernetes_version: String,
    pub worker_min_count: u32,
    pub worker_max_count: u32,
    pub worker_instance_type: String,
}

impl TfVars {
    /// Render the terraform.tfvars document.
    pub fn render(&self) -> String {
        format!(
            "cluster_name = \"{}\"\n\
             {} = \"{}\"\n\
             environment = \"{}\"\n\
             kubernetes_version = \"{}\"\n\
             worker_min_count = {}\n\
             worker_max_count = {}\n\
             worker_instance_type = \"{}\"\n",
            self.cluster_name,
            self.region_var,
            self.region,
            self.environment,
            self.kubernetes_version,
            self.worker_min_count,
            self.worker_max_count,
            self.worker_instance_type,
        )
    }
}

/// Trait for the infrastructure provisioner
///
/// Consumed as an opaque command that returns success or failure and writes
/// its state externally. Apply and destroy are idempotent on the provisioner
/// side; no retry logic lives here.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn init(&self, workdir: &Path) -> Result<(), ProvisionerError>;

    async fn apply(&self, workdir: &Path, vars: &TfVars) -> Result<(), ProvisionerError>;

    async fn destroy(&self, workdir: &Path) -> Result<(), ProvisionerError>;
}

/// Real terraform implementation
pub struct TerraformCli {
    executor: Arc<dyn CommandExecutor>,
}

impl TerraformCli {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    async fn run_terraform(&self, workdir: &Path, args: &[&str]) -> Result<(), ProvisionerError> {
        if !workdir.is_dir() {
            return Err(ProvisionerError::WorkdirNotFound {
                dir: workdir.display().to_string(),
            });
        }

        let output = self.executor.execute_in(workdir, "terraform", args).await?;
        if !output.success() {
            return Err(ProvisionerError::ToolFailed {
                message: truncate_tool_output(&output.stderr),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Provisioner for TerraformCli {
    async fn init(&self, workdir: &Path) -> Result<(), ProvisionerError> {
        tracing::info!(workdir = %workdir.display(), "Running terraform init");
        self.run_terraform(workdir, &["init", "-input=false"]).await
    }

    async fn apply(&self, workdir: &Path, vars: &TfVars) -> Result<(), ProvisionerError> {
        let tfvars_path = workdir.join("terraform.tfvars");
        tokio::fs::write(&tfvars_path, vars.render())
            .await
            .map_err(|e| ProvisionerError::Io {
                message: format!("failed to write {}: {}", tfvars_path.display(), e),
            })?;

        tracing::info!(
            workdir = %workdir.display(),
            cluster = %vars.cluster_name,
            "Running terraform apply"
        );
        self.run_terraform(workdir, &["apply", "-auto-approve", "-input=false"])
            .await
    }

    async fn destroy(&self, workdir: &Path) -> Result<(), ProvisionerError> {
        tracing::info!(workdir = %workdir.display(), "Running terraform destroy");
        self.run_terraform(workdir, &["destroy", "-auto-approve", "-input=false"])
            .await
    }
}

// Terraform error output can run to hundreds of lines; keep reports readable.
fn truncate_tool_output(stderr: &str) -> String {
    const MAX: usize = 2000;
    let trimmed = stderr.trim();
    if trimmed.len() <= MAX {
        return trimmed.to_string();
    }
    let mut end = MAX;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}… ({} bytes truncated)",
        &trimmed[..end],
        trimmed.len() - end
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::command::CommandOutput;
    use std::collections::HashMap;

    struct MockCommandExecutor {
        responses: HashMap<String, Result<CommandOutput, CommandError>>,
    }

    impl MockCommandExecutor {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
            }
        }

        fn expect_command(
            mut self,
            program: &str,
            args: &[&str],
            response: Result<CommandOutput, CommandError>,
        ) -> Self {
            let key = format!("{} {}", program, args.join(" "));
            self.responses.insert(key, response);
            self
        }
    }

    #[async_trait]
    impl CommandExecutor for MockCommandExecutor {
        async fn execute(
            &self,
            program: &str,
            args: &[&str],
        ) -> Result<CommandOutput, CommandError> {
            let key = format!("{} {}", program, args.join(" "));
            self.responses
                .get(&key)
                .cloned()
                .unwrap_or(Err(CommandError::CommandNotFound {
                    command: program.to_string(),
                }))
        }

        async fn execute_in(
            &self,
            _dir: &Path,
            program: &str,
            args: &[&str],
        ) -> Result<CommandOutput, CommandError> {
            self.execute(program, args).await
        }

        async fn execute_with_input(
            &self,
            program: &str,
            args: &[&str],
            _input: &str,
        ) -> Result<CommandOutput, CommandError> {
            self.execute(program, args).await
        }
    }

    fn sample_vars() -> TfVars {
        TfVars {
            cluster_name: "demo".to_string(),
            region_var: "aws_region".to_string(),
            region: "us-east-1".to_string(),
            environment: "dev".to_string(),
            kubernetes_version: "1.24".to_string(),
            worker_min_count: 2,
            worker_max_count: 5,
            worker_instance_type: "t3.medium".to_string(),
        }
    }

    #[test]
    fn tfvars_render_includes_every_variable() {
        let rendered = sample_vars().render();
        assert!(rendered.contains("cluster_name = \"demo\""));
        assert!(rendered.contains("aws_region = \"us-east-1\""));
        assert!(rendered.contains("environment = \"dev\""));
        assert!(rendered.contains("kubernetes_version = \"1.24\""));
        assert!(rendered.contains("worker_min_count = 2"));
        assert!(rendered.contains("worker_max_count = 5"));
        assert!(rendered.contains("worker_instance_type = \"t3.medium\""));
    }

    #[tokio::test]
    async fn test_init_success() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockCommandExecutor::new().expect_command(
            "terraform",
            &["init", "-input=false"],
            Ok(CommandOutput {
                status_code: 0,
                stdout: "Terraform has been successfully initialized!".to_string(),
                stderr: String::new(),
            }),
        );

        let terraform = TerraformCli::new(Arc::new(mock));
        assert!(terraform.init(dir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn test_apply_writes_tfvars_and_reports_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockCommandExecutor::new().expect_command(
            "terraform",
            &["apply", "-auto-approve", "-input=false"],
            Ok(CommandOutput {
                status_code: 1,
                stdout: String::new(),
                stderr: "Error: quota exceeded".to_string(),
            }),
        );

        let terraform = TerraformCli::new(Arc::new(mock));
        let result = terraform.apply(dir.path(), &sample_vars()).await;

        assert!(matches!(
            result,
            Err(ProvisionerError::ToolFailed { ref message }) if message.contains("quota exceeded")
        ));
        let written = std::fs::read_to_string(dir.path().join("terraform.tfvars")).unwrap();
        assert!(written.contains("cluster_name = \"demo\""));
    }

    #[tokio::test]
    async fn test_missing_workdir_is_reported_before_invocation() {
        let terraform = TerraformCli::new(Arc::new(MockCommandExecutor::new()));
        let result = terraform.init(Path::new("/nonexistent/workdir/xyz")).await;
        assert!(matches!(
            result,
            Err(ProvisionerError::WorkdirNotFound { .. })
        ));
    }
}
