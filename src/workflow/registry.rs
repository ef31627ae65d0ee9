//! Workflow registry
//!
//! Static mapping from lifecycle action to its ordered step list. Retry, when
//! wanted, is expressed here as an explicitly repeated idempotent step, never
//! hidden inside the orchestrator.

use super::operation::{ClusterQuery, ResourceOperation};
use super::step::{Condition, Step};
use super::{FailurePolicy, Workflow};
use crate::cluster::ClusterTarget;
use crate::config::KubeforgeConfig;
use crate::external::helm::ReleaseRequest;
use crate::external::terraform::TfVars;
use crate::manifests;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Provision,
    Teardown,
    Harden,
    Monitor,
    Scan,
}

impl LifecycleAction {
    pub fn workflow_name(&self) -> &'static str {
        match self {
            LifecycleAction::Provision => "provision",
            LifecycleAction::Teardown => "teardown",
            LifecycleAction::Harden => "harden",
            LifecycleAction::Monitor => "monitor",
            LifecycleAction::Scan => "scan",
        }
    }
}

/// Resolve the workflow for one lifecycle action against one target.
pub fn build_workflow(
    action: LifecycleAction,
    target: &ClusterTarget,
    config: &KubeforgeConfig,
) -> Workflow {
    match action {
        LifecycleAction::Provision => provision(target, config),
        LifecycleAction::Teardown => teardown(),
        LifecycleAction::Harden => harden(),
        LifecycleAction::Monitor => monitor(config),
        LifecycleAction::Scan => scan(config),
    }
}

fn tfvars(target: &ClusterTarget, config: &KubeforgeConfig) -> TfVars {
    let instance_type = config
        .cluster
        .worker_instance_type
        .clone()
        .unwrap_or_else(|| target.provider.default_worker_instance_type().to_string());
    TfVars {
        cluster_name: target.name.clone(),
        region_var: target.provider.region_var().to_string(),
        region: target.region.clone(),
        environment: config.cluster.environment.clone(),
        kubernetes_version: config.cluster.kubernetes_version.clone(),
        worker_min_count: config.cluster.worker_min_count,
        worker_max_count: config.cluster.worker_max_count,
        worker_instance_type: instance_type,
    }
}

fn provision(target: &ClusterTarget, config: &KubeforgeConfig) -> Workflow {
    let kubeconfig = target.kubeconfig_path().to_path_buf();
    Workflow::new("provision", FailurePolicy::AbortOnFirstFailure)
        .step(
            Step::new("terraform-init")
                .operation(ResourceOperation::InfraInit)
                .idempotent(),
        )
        .step(
            Step::new("terraform-apply")
                .operation(ResourceOperation::InfraApply {
                    vars: tfvars(target, config),
                })
                .idempotent(),
        )
        .step(
            // Catches the case where apply exits 0 but no credential
            // artifact materialized.
            Step::new("verify-kubeconfig")
                .postcondition(Condition::new(
                    "kubeconfig artifact exists",
                    move |_state| kubeconfig.exists(),
                ))
                .idempotent(),
        )
}

fn teardown() -> Workflow {
    Workflow::new("teardown", FailurePolicy::AbortOnFirstFailure).step(
        Step::new("terraform-destroy")
            .operation(ResourceOperation::InfraDestroy)
            .idempotent(),
    )
}

fn monitor(config: &KubeforgeConfig) -> Workflow {
    let namespace = config.monitoring.namespace.clone();
    Workflow::new("monitor", FailurePolicy::ContinueAndCollect)
        .step(
            Step::new("ensure-monitoring-namespace")
                .operation(ResourceOperation::EnsureNamespace {
                    name: namespace.clone(),
                })
                .idempotent(),
        )
        .step(
            Step::new("install-prometheus")
                .precondition(Condition::new("prometheus not yet exposed", |state| {
                    !state.has_endpoint("prometheus")
                }))
                .operation(ResourceOperation::EnsureRelease {
                    request: ReleaseRequest {
                        release: "prometheus".to_string(),
                        chart: "prometheus-community/prometheus".to_string(),
                        repo: "prometheus-community".to_string(),
                        repo_url: "https://prometheus-community.github.io/helm-charts"
                            .to_string(),
                        namespace: namespace.clone(),
                        values_file: config
                            .monitoring
                            .prometheus_values_file
                            .as_ref()
                            .map(PathBuf::from),
                        set_overrides: Vec::new(),
                    },
                })
                .idempotent(),
        )
        .step(
            Step::new("install-grafana")
                .precondition(Condition::new("grafana not yet exposed", |state| {
                    !state.has_endpoint("grafana")
                }))
                .operation(ResourceOperation::EnsureRelease {
                    request: ReleaseRequest {
                        release: "grafana".to_string(),
                        chart: "grafana/grafana".to_string(),
                        repo: "grafana".to_string(),
                        repo_url: "https://grafana.github.io/helm-charts".to_string(),
                        namespace: namespace.clone(),
                        values_file: config
                            .monitoring
                            .grafana_values_file
                            .as_ref()
                            .map(PathBuf::from),
                        set_overrides: vec!["service.type=LoadBalancer".to_string()],
                    },
                })
                .idempotent(),
        )
        .step(
            Step::new("configure-grafana-datasource")
                .operation(ResourceOperation::ApplyManifest {
                    description: "grafana datasource configmap".to_string(),
                    manifest: manifests::grafana_datasource_configmap(&namespace),
                    namespace: Some(namespace.clone()),
                })
                .idempotent(),
        )
        .step(
            // Prometheus only reads the rules ConfigMap at startup; the
            // restart makes the applied rule group actually load.
            Step::new("configure-alert-rules")
                .operation(ResourceOperation::ApplyManifest {
                    description: "prometheus alert rules configmap".to_string(),
                    manifest: manifests::alert_rules_configmap(&namespace),
                    namespace: Some(namespace.clone()),
                })
                .operation(ResourceOperation::RestartDeployment {
                    deployment: "prometheus-server".to_string(),
                    namespace: Some(namespace.clone()),
                })
                .idempotent(),
        )
        .step(
            Step::new("deploy-metrics-server")
                .operation(ResourceOperation::EnsureRelease {
                    request: ReleaseRequest {
                        release: "metrics-server".to_string(),
                        chart: "metrics-server/metrics-server".to_string(),
                        repo: "metrics-server".to_string(),
                        repo_url: "https://kubernetes-sigs.github.io/metrics-server/"
                            .to_string(),
                        namespace: "kube-system".to_string(),
                        values_file: None,
                        set_overrides: Vec::new(),
                    },
                })
                .idempotent(),
        )
}

fn harden() -> Workflow {
    let namespace = "default";
    Workflow::new("harden", FailurePolicy::ContinueAndCollect)
        .step(
            Step::new("apply-network-policies")
                .operation(ResourceOperation::LabelNamespace {
                    namespace: namespace.to_string(),
                    labels: vec![("name".to_string(), namespace.to_string())],
                })
                .operation(ResourceOperation::ApplyManifest {
                    description: "default deny ingress".to_string(),
                    manifest: manifests::DEFAULT_DENY_INGRESS.to_string(),
                    namespace: Some(namespace.to_string()),
                })
                .operation(ResourceOperation::ApplyManifest {
                    description: "allow namespace-internal traffic".to_string(),
                    manifest: manifests::allow_namespace_internal(namespace),
                    namespace: Some(namespace.to_string()),
                })
                .idempotent(),
        )
        .step(
            Step::new("apply-pod-security")
                .operation(ResourceOperation::EnsureNamespace {
                    name: "restricted-pods".to_string(),
                })
                .operation(ResourceOperation::LabelNamespace {
                    namespace: "restricted-pods".to_string(),
                    labels: vec![
                        (
                            "pod-security.kubernetes.io/enforce".to_string(),
                            "restricted".to_string(),
                        ),
                        (
                            "pod-security.kubernetes.io/audit".to_string(),
                            "restricted".to_string(),
                        ),
                        (
                            "pod-security.kubernetes.io/warn".to_string(),
                            "restricted".to_string(),
                        ),
                    ],
                })
                .idempotent(),
        )
        .step(
            Step::new("apply-rbac")
                .operation(ResourceOperation::ApplyManifest {
                    description: "read-only rbac policies".to_string(),
                    manifest: manifests::READONLY_RBAC.to_string(),
                    namespace: None,
                })
                .idempotent(),
        )
}

fn scan(config: &KubeforgeConfig) -> Workflow {
    let namespace = config.security.namespace.clone();
    Workflow::new("scan", FailurePolicy::ContinueAndCollect)
        .step(
            Step::new("deploy-trivy-operator")
                .operation(ResourceOperation::EnsureNamespace {
                    name: namespace.clone(),
                })
                .operation(ResourceOperation::ApplyManifest {
                    description: "trivy operator deployment".to_string(),
                    manifest: manifests::trivy_operator(&namespace),
                    namespace: None,
                })
                .idempotent(),
        )
        .step(
            // Job names collide on re-run; not safe to repeat blindly.
            Step::new("run-kube-bench").operation(ResourceOperation::RunJob {
                manifest: manifests::KUBE_BENCH_JOB.to_string(),
                job_name: "kube-bench".to_string(),
                namespace: None,
                timeout: Duration::from_secs(config.security.bench_timeout_seconds),
            }),
        )
}

/// Sanity query used by the post-provision convergence check.
pub fn convergence_probe() -> ResourceOperation {
    ResourceOperation::Query {
        query: ClusterQuery::NodeCount,
    }
}
