//! Cluster API abstraction
//!
//! Wraps kubectl as a request/response collaborator keyed by resource
//! kind, name, and namespace. Every call is scoped to one kubeconfig.

use super::command::{CommandError, CommandExecutor, CommandOutput};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterApiError {
    #[error("Resource not found: {what}")]
    NotFound { what: String },
    #[error("Resource already exists: {what}")]
    AlreadyExists { what: String },
    #[error("Cluster credentials missing or rejected: {message}")]
    Unauthenticated { message: String },
    #[error("Cluster operation timed out: {what}")]
    Timeout { what: String },
    #[error("Cluster API call failed: {message}")]
    ApiFailure { message: String },
    #[error("Command execution error: {source}")]
    CommandError {
        #[from]
        source: CommandError,
    },
}

/// Trait for cluster API operations
///
/// This abstraction enables testing workflows without a live cluster, while
/// preserving the exact surface the orchestrator depends on.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Read a resource. Returns its serialized form on success.
    async fn get(
        &self,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<String, ClusterApiError>;

    async fn create_namespace(&self, name: &str) -> Result<(), ClusterApiError>;

    /// Declaratively apply a manifest document. Re-applying an identical
    /// manifest must not error.
    async fn apply_manifest(
        &self,
        manifest: &str,
        namespace: Option<&str>,
    ) -> Result<String, ClusterApiError>;

    async fn label_namespace(
        &self,
        namespace: &str,
        labels: &[(&str, &str)],
    ) -> Result<(), ClusterApiError>;

    /// Rolling restart of a deployment, typically to pick up a changed
    /// ConfigMap that is not watched at runtime.
    async fn rollout_restart(
        &self,
        deployment: &str,
        namespace: Option<&str>,
    ) -> Result<(), ClusterApiError>;

    async fn node_count(&self) -> Result<u32, ClusterApiError>;

    /// Server semantic version string, e.g. "v1.24.3".
    async fn server_version(&self) -> Result<String, ClusterApiError>;

    /// External URL for a LoadBalancer service, if an ingress IP is assigned.
    async fn service_endpoint(
        &self,
        service: &str,
        namespace: &str,
        port: u16,
    ) -> Result<Option<String>, ClusterApiError>;

    /// Block until the job reaches a terminal state or the bound elapses.
    async fn wait_for_job(
        &self,
        job: &str,
        namespace: Option<&str>,
        timeout: Duration,
    ) -> Result<(), ClusterApiError>;

    async fn job_logs(&self, job: &str, namespace: Option<&str>)
        -> Result<String, ClusterApiError>;
}

/// Real kubectl implementation
pub struct KubectlClient {
    executor: Arc<dyn CommandExecutor>,
    kubeconfig: PathBuf,
}

impl KubectlClient {
    pub fn new(executor: Arc<dyn CommandExecutor>, kubeconfig: PathBuf) -> Self {
        Self {
            executor,
            kubeconfig,
        }
    }

    fn kubeconfig_flag(&self) -> String {
        format!("--kubeconfig={}", self.kubeconfig.display())
    }

    async fn run_kubectl(&self, args: &[&str]) -> Result<String, ClusterApiError> {
        let flag = self.kubeconfig_flag();
        let mut full_args: Vec<&str> = args.to_vec();
        full_args.push(&flag);

        let output = self.executor.execute("kubectl", &full_args).await?;
        self.into_stdout(output, args)
    }

    async fn run_kubectl_with_input(
        &self,
        args: &[&str],
        input: &str,
    ) -> Result<String, ClusterApiError> {
        let flag = self.kubeconfig_flag();
        let mut full_args: Vec<&str> = args.to_vec();
        full_args.push(&flag);

        let output = self
            .executor
            .execute_with_input("kubectl", &full_args, input)
            .await?;
        self.into_stdout(output, args)
    }

    fn into_stdout(
        &self,
        output: CommandOutput,
        args: &[&str],
    ) -> Result<String, ClusterApiError> {
        if !output.success() {
            return Err(classify_kubectl_error(&output.stderr, args));
        }
        Ok(output.stdout)
    }
}

fn classify_kubectl_error(stderr: &str, args: &[&str]) -> ClusterApiError {
    let what = args.join(" ");
    let lowered = stderr.to_lowercase();

    if lowered.contains("notfound") || lowered.contains("not found") {
        ClusterApiError::NotFound { what }
    } else if lowered.contains("alreadyexists") || lowered.contains("already exists") {
        ClusterApiError::AlreadyExists { what }
    } else if lowered.contains("unauthorized")
        || lowered.contains("forbidden")
        || lowered.contains("error loading config")
        || lowered.contains("no configuration has been provided")
    {
        ClusterApiError::Unauthenticated {
            message: stderr.trim().to_string(),
        }
    } else if lowered.contains("timed out") || lowered.contains("deadline exceeded") {
        ClusterApiError::Timeout { what }
    } else {
        ClusterApiError::ApiFailure {
            message: stderr.trim().to_string(),
        }
    }
}

#[async_trait]
impl ClusterApi for KubectlClient {
    async fn get(
        &self,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<String, ClusterApiError> {
        let mut args = vec!["get", kind, name, "-o", "json"];
        if let Some(namespace) = namespace {
            args.extend(["--namespace", namespace]);
        }
        self.run_kubectl(&args).await
    }

    async fn create_namespace(&self, name: &str) -> Result<(), ClusterApiError> {
        self.run_kubectl(&["create", "namespace", name]).await?;
        tracing::info!(namespace = name, "Created namespace");
        Ok(())
    }

    async fn apply_manifest(
        &self,
        manifest: &str,
        namespace: Option<&str>,
    ) -> Result<String, ClusterApiError> {
        let mut args = vec!["apply", "-f", "-"];
        if let Some(namespace) = namespace {
            args.extend(["--namespace", namespace]);
        }
        self.run_kubectl_with_input(&args, manifest).await
    }

    async fn label_namespace(
        &self,
        namespace: &str,
        labels: &[(&str, &str)],
    ) -> Result<(), ClusterApiError> {
        let rendered: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let mut args = vec!["label", "namespace", namespace, "--overwrite"];
        args.extend(rendered.iter().map(String::as_str));
        self.run_kubectl(&args).await?;
        Ok(())
    }

    async fn rollout_restart(
        &self,
        deployment: &str,
        namespace: Option<&str>,
    ) -> Result<(), ClusterApiError> {
        let target = format!("deployment/{deployment}");
        let mut args = vec!["rollout", "restart", target.as_str()];
        if let Some(namespace) = namespace {
            args.extend(["--namespace", namespace]);
        }
        self.run_kubectl(&args).await?;
        tracing::info!(deployment, "Restarted deployment");
        Ok(())
    }

    async fn node_count(&self) -> Result<u32, ClusterApiError> {
        let output = self.run_kubectl(&["get", "nodes", "--no-headers"]).await?;
        Ok(output.lines().filter(|l| !l.trim().is_empty()).count() as u32)
    }

    async fn server_version(&self) -> Result<String, ClusterApiError> {
        let output = self.run_kubectl(&["version", "-o", "json"]).await?;
        parse_server_version(&output).ok_or_else(|| ClusterApiError::ApiFailure {
            message: "could not parse server version from kubectl output".to_string(),
        })
    }

    async fn service_endpoint(
        &self,
        service: &str,
        namespace: &str,
        port: u16,
    ) -> Result<Option<String>, ClusterApiError> {
        let output = self
            .run_kubectl(&[
                "get",
                "svc",
                service,
                "--namespace",
                namespace,
                "-o",
                "jsonpath={.status.loadBalancer.ingress[0].ip}",
            ])
            .await?;

        let ip = output.trim().trim_matches('\'');
        if ip.is_empty() {
            Ok(None)
        } else {
            Ok(Some(format!("http://{ip}:{port}")))
        }
    }

    async fn wait_for_job(
        &self,
        job: &str,
        namespace: Option<&str>,
        timeout: Duration,
    ) -> Result<(), ClusterApiError> {
        let target = format!("job/{job}");
        let bound = format!("--timeout={}s", timeout.as_secs());
        let mut complete_args = vec!["wait", "--for=condition=complete", &target, &bound];
        let mut failed_args = vec!["wait", "--for=condition=failed", &target, &bound];
        if let Some(namespace) = namespace {
            complete_args.extend(["--namespace", namespace]);
            failed_args.extend(["--namespace", namespace]);
        }

        // Watch both terminal conditions; a job that fails outright must not
        // burn the whole completion timeout before being reported.
        tokio::select! {
            biased;
            failed = self.run_kubectl(&failed_args) => {
                match failed {
                    Ok(_) => Err(ClusterApiError::ApiFailure {
                        message: format!("job {job} reached the Failed condition"),
                    }),
                    // The failed-watch expiring proves nothing on its own;
                    // the completion watch has the verdict.
                    Err(_) => {
                        self.run_kubectl(&complete_args).await?;
                        Ok(())
                    }
                }
            }
            done = self.run_kubectl(&complete_args) => {
                done?;
                Ok(())
            }
        }
    }

    async fn job_logs(
        &self,
        job: &str,
        namespace: Option<&str>,
    ) -> Result<String, ClusterApiError> {
        let target = format!("job/{job}");
        let mut args = vec!["logs", target.as_str()];
        if let Some(namespace) = namespace {
            args.extend(["--namespace", namespace]);
        }
        self.run_kubectl(&args).await
    }
}

/// Extract the server git version from `kubectl version -o json`.
fn parse_server_version(raw: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(raw).ok()?;
    let version = parsed.get("serverVersion")?.get("gitVersion")?.as_str()?;
    // Normalize to a bare semantic version, tolerating suffixes like "-eks-1234".
    let re = regex::Regex::new(r"v?(\d+\.\d+\.\d+)").ok()?;
    let captures = re.captures(version)?;
    Some(format!("v{}", &captures[1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;

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

    fn ok(stdout: &str) -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput {
            status_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    fn failed(stderr: &str) -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput {
            status_code: 1,
            stdout: String::new(),
            stderr: stderr.to_string(),
        })
    }

    fn client(mock: MockCommandExecutor) -> KubectlClient {
        KubectlClient::new(Arc::new(mock), PathBuf::from("/tmp/kubeconfig_test"))
    }

    #[tokio::test]
    async fn test_node_count_counts_nonempty_lines() {
        let mock = MockCommandExecutor::new().expect_command(
            "kubectl",
            &[
                "get",
                "nodes",
                "--no-headers",
                "--kubeconfig=/tmp/kubeconfig_test",
            ],
            ok("node-1   Ready   <none>   5d\nnode-2   Ready   <none>   5d\n"),
        );

        assert_eq!(client(mock).node_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_get_missing_namespace_classified_not_found() {
        let mock = MockCommandExecutor::new().expect_command(
            "kubectl",
            &[
                "get",
                "namespace",
                "monitoring",
                "-o",
                "json",
                "--kubeconfig=/tmp/kubeconfig_test",
            ],
            failed("Error from server (NotFound): namespaces \"monitoring\" not found"),
        );

        let result = client(mock).get("namespace", "monitoring", None).await;
        assert!(matches!(result, Err(ClusterApiError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_unauthorized_classified_unauthenticated() {
        let mock = MockCommandExecutor::new().expect_command(
            "kubectl",
            &[
                "get",
                "nodes",
                "--no-headers",
                "--kubeconfig=/tmp/kubeconfig_test",
            ],
            failed("error: You must be logged in to the server (Unauthorized)"),
        );

        let result = client(mock).node_count().await;
        assert!(matches!(
            result,
            Err(ClusterApiError::Unauthenticated { .. })
        ));
    }

    #[tokio::test]
    async fn test_wait_timeout_classified_timeout() {
        let mock = MockCommandExecutor::new()
            .expect_command(
                "kubectl",
                &[
                    "wait",
                    "--for=condition=failed",
                    "job/kube-bench",
                    "--timeout=300s",
                    "--kubeconfig=/tmp/kubeconfig_test",
                ],
                failed("error: timed out waiting for the condition on jobs/kube-bench"),
            )
            .expect_command(
                "kubectl",
                &[
                    "wait",
                    "--for=condition=complete",
                    "job/kube-bench",
                    "--timeout=300s",
                    "--kubeconfig=/tmp/kubeconfig_test",
                ],
                failed("error: timed out waiting for the condition on jobs/kube-bench"),
            );

        let result = client(mock)
            .wait_for_job("kube-bench", None, Duration::from_secs(300))
            .await;
        assert!(matches!(result, Err(ClusterApiError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_failed_job_reported_as_api_failure() {
        let mock = MockCommandExecutor::new()
            .expect_command(
                "kubectl",
                &[
                    "wait",
                    "--for=condition=failed",
                    "job/kube-bench",
                    "--timeout=300s",
                    "--kubeconfig=/tmp/kubeconfig_test",
                ],
                ok("job.batch/kube-bench condition met"),
            )
            .expect_command(
                "kubectl",
                &[
                    "wait",
                    "--for=condition=complete",
                    "job/kube-bench",
                    "--timeout=300s",
                    "--kubeconfig=/tmp/kubeconfig_test",
                ],
                failed("error: timed out waiting for the condition on jobs/kube-bench"),
            );

        let result = client(mock)
            .wait_for_job("kube-bench", None, Duration::from_secs(300))
            .await;
        assert!(matches!(result, Err(ClusterApiError::ApiFailure { .. })));
    }

    #[tokio::test]
    async fn test_completed_job_succeeds_after_failed_watch_expires() {
        let mock = MockCommandExecutor::new()
            .expect_command(
                "kubectl",
                &[
                    "wait",
                    "--for=condition=failed",
                    "job/kube-bench",
                    "--timeout=300s",
                    "--kubeconfig=/tmp/kubeconfig_test",
                ],
                failed("error: timed out waiting for the condition on jobs/kube-bench"),
            )
            .expect_command(
                "kubectl",
                &[
                    "wait",
                    "--for=condition=complete",
                    "job/kube-bench",
                    "--timeout=300s",
                    "--kubeconfig=/tmp/kubeconfig_test",
                ],
                ok("job.batch/kube-bench condition met"),
            );

        let result = client(mock)
            .wait_for_job("kube-bench", None, Duration::from_secs(300))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_rollout_restart_targets_deployment_in_namespace() {
        let mock = MockCommandExecutor::new().expect_command(
            "kubectl",
            &[
                "rollout",
                "restart",
                "deployment/prometheus-server",
                "--namespace",
                "monitoring",
                "--kubeconfig=/tmp/kubeconfig_test",
            ],
            ok("deployment.apps/prometheus-server restarted"),
        );

        let result = client(mock)
            .rollout_restart("prometheus-server", Some("monitoring"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_service_endpoint_absent_ingress_is_none() {
        let mock = MockCommandExecutor::new().expect_command(
            "kubectl",
            &[
                "get",
                "svc",
                "grafana",
                "--namespace",
                "monitoring",
                "-o",
                "jsonpath={.status.loadBalancer.ingress[0].ip}",
                "--kubeconfig=/tmp/kubeconfig_test",
            ],
            ok(""),
        );

        let endpoint = client(mock)
            .service_endpoint("grafana", "monitoring", 3000)
            .await
            .unwrap();
        assert_eq!(endpoint, None);
    }

    #[test]
    fn test_parse_server_version_tolerates_vendor_suffix() {
        let raw = r#"{"serverVersion": {"gitVersion": "v1.24.10-eks-48e63af"}}"#;
        assert_eq!(parse_server_version(raw), Some("v1.24.10".to_string()));
        assert_eq!(parse_server_version("not json"), None);
    }
}
