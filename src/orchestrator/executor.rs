//! Resource operation execution
//!
//! Maps each operation kind to exactly one external collaborator call and
//! normalizes every outcome into the uniform OperationResult contract. The
//! race-tolerant idempotency rules for the ensure-operations live here.

use crate::external::helm::ReleaseManager;
use crate::external::kubectl::{ClusterApi, ClusterApiError};
use crate::external::terraform::Provisioner;
use crate::workflow::operation::{
    ClusterQuery, ErrorKind, OperationError, OperationOutput, OperationResult, ResourceOperation,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub struct OperationExecutor {
    provisioner: Arc<dyn Provisioner>,
    cluster: Arc<dyn ClusterApi>,
    releases: Arc<dyn ReleaseManager>,
    infra_dir: PathBuf,
}

impl OperationExecutor {
    pub fn new(
        provisioner: Arc<dyn Provisioner>,
        cluster: Arc<dyn ClusterApi>,
        releases: Arc<dyn ReleaseManager>,
        infra_dir: PathBuf,
    ) -> Self {
        Self {
            provisioner,
            cluster,
            releases,
            infra_dir,
        }
    }

    pub async fn execute(&self, op: &ResourceOperation) -> OperationResult {
        debug!(operation = %op.describe(), "Executing resource operation");
        match op {
            ResourceOperation::InfraInit => {
                self.provisioner.init(&self.infra_dir).await?;
                Ok(OperationOutput::with_detail("provisioner initialized"))
            }
            ResourceOperation::InfraApply { vars } => {
                self.provisioner.apply(&self.infra_dir, vars).await?;
                Ok(OperationOutput::with_detail("infrastructure applied"))
            }
            ResourceOperation::InfraDestroy => {
                self.provisioner.destroy(&self.infra_dir).await?;
                Ok(OperationOutput::with_detail("infrastructure destroyed"))
            }
            ResourceOperation::ApplyManifest {
                description,
                manifest,
                namespace,
            } => {
                let stdout = self
                    .cluster
                    .apply_manifest(manifest, namespace.as_deref())
                    .await?;
                info!(manifest = %description, "Manifest applied");
                Ok(OperationOutput::with_detail(stdout.trim().to_string()))
            }
            ResourceOperation::EnsureNamespace { name } => self.ensure_namespace(name).await,
            ResourceOperation::EnsureRelease { request } => {
                self.releases
                    .ensure_repo(&request.repo, &request.repo_url)
                    .await
                    .map_err(OperationError::from)?;
                match self.releases.upgrade_install(request).await {
                    Ok(()) => Ok(OperationOutput::with_detail(format!(
                        "release {} converged",
                        request.release
                    ))),
                    Err(e) => {
                        let err = OperationError::from(e);
                        if err.kind == ErrorKind::Conflict {
                            // Concurrent convergence to the same state.
                            Ok(OperationOutput::with_detail(format!(
                                "release {} already converging",
                                request.release
                            )))
                        } else {
                            Err(err)
                        }
                    }
                }
            }
            ResourceOperation::RunJob {
                manifest,
                job_name,
                namespace,
                timeout,
            } => {
                self.cluster
                    .apply_manifest(manifest, namespace.as_deref())
                    .await?;
                info!(job = %job_name, timeout_s = timeout.as_secs(), "Waiting for job");
                self.cluster
                    .wait_for_job(job_name, namespace.as_deref(), *timeout)
                    .await?;
                let logs = self.cluster.job_logs(job_name, namespace.as_deref()).await?;
                Ok(OperationOutput::with_detail(logs))
            }
            ResourceOperation::RestartDeployment {
                deployment,
                namespace,
            } => {
                self.cluster
                    .rollout_restart(deployment, namespace.as_deref())
                    .await?;
                Ok(OperationOutput::with_detail(format!(
                    "deployment {deployment} restarted"
                )))
            }
            ResourceOperation::Query { query } => self.query(*query).await,
            ResourceOperation::LabelNamespace { namespace, labels } => {
                let borrowed: Vec<(&str, &str)> = labels
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                self.cluster.label_namespace(namespace, &borrowed).await?;
                Ok(OperationOutput::with_detail(format!(
                    "labeled namespace {namespace}"
                )))
            }
        }
    }

    /// Query-then-create. Only a NotFound answer triggers the create; any
    /// other query failure propagates rather than masking a broken cluster
    /// connection as "namespace absent". A lost create race is success.
    async fn ensure_namespace(&self, name: &str) -> OperationResult {
        match self.cluster.get("namespace", name, None).await {
            Ok(_) => Ok(OperationOutput::with_detail(format!(
                "namespace {name} already exists"
            ))),
            Err(ClusterApiError::NotFound { .. }) => {
                match self.cluster.create_namespace(name).await {
                    Ok(()) => Ok(OperationOutput::with_detail(format!(
                        "namespace {name} created"
                    ))),
                    Err(ClusterApiError::AlreadyExists { .. }) => {
                        Ok(OperationOutput::with_detail(format!(
                            "namespace {name} created concurrently"
                        )))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn query(&self, query: ClusterQuery) -> OperationResult {
        match query {
            ClusterQuery::NodeCount => {
                let count = self.cluster.node_count().await?;
                Ok(OperationOutput::with_detail(count.to_string()))
            }
            ClusterQuery::ServerVersion => {
                let version = self.cluster.server_version().await?;
                Ok(OperationOutput::with_detail(version))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::helm::{ReleaseError, ReleaseRequest};
    use crate::external::terraform::ProvisionerError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct StubProvisioner {
        fail_apply: bool,
    }

    #[async_trait]
    impl Provisioner for StubProvisioner {
        async fn init(&self, _workdir: &Path) -> Result<(), ProvisionerError> {
            Ok(())
        }

        async fn apply(
            &self,
            _workdir: &Path,
            _vars: &crate::external::terraform::TfVars,
        ) -> Result<(), ProvisionerError> {
            if self.fail_apply {
                Err(ProvisionerError::ToolFailed {
                    message: "apply exited 1".to_string(),
                })
            } else {
                Ok(())
            }
        }

        async fn destroy(&self, _workdir: &Path) -> Result<(), ProvisionerError> {
            Ok(())
        }
    }

    /// Namespace store that can simulate a create race.
    struct StubClusterApi {
        namespace_exists: bool,
        create_races: bool,
        create_calls: AtomicU32,
    }

    impl StubClusterApi {
        fn without_namespace() -> Self {
            Self {
                namespace_exists: false,
                create_races: false,
                create_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ClusterApi for StubClusterApi {
        async fn get(
            &self,
            kind: &str,
            name: &str,
            _namespace: Option<&str>,
        ) -> Result<String, ClusterApiError> {
            if self.namespace_exists {
                Ok("{}".to_string())
            } else {
                Err(ClusterApiError::NotFound {
                    what: format!("{kind} {name}"),
                })
            }
        }

        async fn create_namespace(&self, name: &str) -> Result<(), ClusterApiError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if self.create_races {
                Err(ClusterApiError::AlreadyExists {
                    what: format!("namespace {name}"),
                })
            } else {
                Ok(())
            }
        }

        async fn apply_manifest(
            &self,
            _manifest: &str,
            _namespace: Option<&str>,
        ) -> Result<String, ClusterApiError> {
            Ok("applied".to_string())
        }

        async fn label_namespace(
            &self,
            _namespace: &str,
            _labels: &[(&str, &str)],
        ) -> Result<(), ClusterApiError> {
            Ok(())
        }

        async fn rollout_restart(
            &self,
            deployment: &str,
            _namespace: Option<&str>,
        ) -> Result<(), ClusterApiError> {
            if deployment == "missing" {
                Err(ClusterApiError::NotFound {
                    what: format!("deployment {deployment}"),
                })
            } else {
                Ok(())
            }
        }

        async fn node_count(&self) -> Result<u32, ClusterApiError> {
            Ok(2)
        }

        async fn server_version(&self) -> Result<String, ClusterApiError> {
            Ok("v1.24.3".to_string())
        }

        async fn service_endpoint(
            &self,
            _service: &str,
            _namespace: &str,
            _port: u16,
        ) -> Result<Option<String>, ClusterApiError> {
            Ok(None)
        }

        async fn wait_for_job(
            &self,
            job: &str,
            _namespace: Option<&str>,
            _timeout: Duration,
        ) -> Result<(), ClusterApiError> {
            if job == "hangs-forever" {
                Err(ClusterApiError::Timeout {
                    what: format!("job/{job}"),
                })
            } else {
                Ok(())
            }
        }

        async fn job_logs(
            &self,
            _job: &str,
            _namespace: Option<&str>,
        ) -> Result<String, ClusterApiError> {
            Ok("{\"Totals\": {}}".to_string())
        }
    }

    struct StubReleaseManager {
        busy: bool,
    }

    #[async_trait]
    impl ReleaseManager for StubReleaseManager {
        async fn ensure_repo(&self, _name: &str, _url: &str) -> Result<(), ReleaseError> {
            Ok(())
        }

        async fn upgrade_install(&self, request: &ReleaseRequest) -> Result<(), ReleaseError> {
            if self.busy {
                Err(ReleaseError::ReleaseBusy {
                    release: request.release.clone(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn executor(cluster: StubClusterApi, releases: StubReleaseManager) -> OperationExecutor {
        OperationExecutor::new(
            Arc::new(StubProvisioner { fail_apply: false }),
            Arc::new(cluster),
            Arc::new(releases),
            PathBuf::from("infra/aws"),
        )
    }

    #[tokio::test]
    async fn ensure_namespace_creates_when_absent() {
        let cluster = StubClusterApi::without_namespace();
        let exec = executor(cluster, StubReleaseManager { busy: false });

        let result = exec
            .execute(&ResourceOperation::EnsureNamespace {
                name: "monitoring".to_string(),
            })
            .await;
        assert!(result.is_ok());
        assert!(result.unwrap().detail.contains("created"));
    }

    #[tokio::test]
    async fn ensure_namespace_noop_when_present() {
        let mut cluster = StubClusterApi::without_namespace();
        cluster.namespace_exists = true;
        let exec = executor(cluster, StubReleaseManager { busy: false });

        let result = exec
            .execute(&ResourceOperation::EnsureNamespace {
                name: "monitoring".to_string(),
            })
            .await;
        assert!(result.unwrap().detail.contains("already exists"));
    }

    #[tokio::test]
    async fn ensure_namespace_lost_create_race_is_success() {
        let mut cluster = StubClusterApi::without_namespace();
        cluster.create_races = true;
        let exec = executor(cluster, StubReleaseManager { busy: false });

        let result = exec
            .execute(&ResourceOperation::EnsureNamespace {
                name: "monitoring".to_string(),
            })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn ensure_release_conflict_is_success() {
        let exec = executor(
            StubClusterApi::without_namespace(),
            StubReleaseManager { busy: true },
        );

        let request = ReleaseRequest {
            release: "prometheus".to_string(),
            chart: "prometheus-community/prometheus".to_string(),
            repo: "prometheus-community".to_string(),
            repo_url: "https://prometheus-community.github.io/helm-charts".to_string(),
            namespace: "monitoring".to_string(),
            values_file: None,
            set_overrides: Vec::new(),
        };
        let result = exec
            .execute(&ResourceOperation::EnsureRelease { request })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn run_job_timeout_propagates_timeout_kind() {
        let exec = executor(
            StubClusterApi::without_namespace(),
            StubReleaseManager { busy: false },
        );

        let result = exec
            .execute(&ResourceOperation::RunJob {
                manifest: "apiVersion: batch/v1".to_string(),
                job_name: "hangs-forever".to_string(),
                namespace: None,
                timeout: Duration::from_secs(1),
            })
            .await;
        assert_eq!(result.unwrap_err().kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn run_job_returns_logs_as_detail() {
        let exec = executor(
            StubClusterApi::without_namespace(),
            StubReleaseManager { busy: false },
        );

        let result = exec
            .execute(&ResourceOperation::RunJob {
                manifest: "apiVersion: batch/v1".to_string(),
                job_name: "kube-bench".to_string(),
                namespace: None,
                timeout: Duration::from_secs(300),
            })
            .await;
        assert!(result.unwrap().detail.contains("Totals"));
    }

    #[tokio::test]
    async fn restart_deployment_missing_target_maps_to_not_found() {
        let exec = executor(
            StubClusterApi::without_namespace(),
            StubReleaseManager { busy: false },
        );

        let ok = exec
            .execute(&ResourceOperation::RestartDeployment {
                deployment: "prometheus-server".to_string(),
                namespace: Some("monitoring".to_string()),
            })
            .await;
        assert!(ok.unwrap().detail.contains("restarted"));

        let missing = exec
            .execute(&ResourceOperation::RestartDeployment {
                deployment: "missing".to_string(),
                namespace: Some("monitoring".to_string()),
            })
            .await;
        assert_eq!(missing.unwrap_err().kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn infra_apply_failure_maps_to_external_tool_failure() {
        let exec = OperationExecutor::new(
            Arc::new(StubProvisioner { fail_apply: true }),
            Arc::new(StubClusterApi::without_namespace()),
            Arc::new(StubReleaseManager { busy: false }),
            PathBuf::from("infra/aws"),
        );

        let vars = crate::external::terraform::TfVars {
            cluster_name: "demo".to_string(),
            region_var: "aws_region".to_string(),
            region: "us-east-1".to_string(),
            environment: "dev".to_string(),
            kubernetes_version: "1.24".to_string(),
            worker_min_count: 2,
            worker_max_count: 5,
            worker_instance_type: "t3.medium".to_string(),
        };
        let result = exec
            .execute(&ResourceOperation::InfraApply { vars })
            .await;
        assert_eq!(result.unwrap_err().kind, ErrorKind::ExternalToolFailure);
    }
}
