// Kubeforge Library - Kubernetes cluster lifecycle orchestration
// This exposes the core components for testing and integration

pub mod cli;
pub mod cluster;
pub mod config;
pub mod external;
pub mod manifests;
pub mod observe;
pub mod orchestrator;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use cluster::{ClusterTarget, Provider};
pub use config::KubeforgeConfig;
pub use external::command::{CommandError, CommandExecutor, CommandOutput, ProcessCommandExecutor};
pub use external::helm::{HelmCli, ReleaseError, ReleaseManager, ReleaseRequest};
pub use external::kubectl::{ClusterApi, ClusterApiError, KubectlClient};
pub use external::terraform::{Provisioner, ProvisionerError, TerraformCli, TfVars};
pub use observe::{ObservedState, StatusReconciler};
pub use orchestrator::{OperationExecutor, Orchestrator};
pub use telemetry::{generate_correlation_id, init_telemetry, OperationTimer};
pub use workflow::{
    derive_overall_status, ClusterQuery, Condition, ErrorKind, FailurePolicy, LifecycleAction,
    OperationError, OperationOutput, OperationResult, OverallStatus, ResourceOperation, RunReport,
    Step, StepOutcome, StepStatus, TargetSummary, Workflow,
};
