//! Resource operations
//!
//! A resource operation is a single idempotent-by-contract call to one
//! external collaborator, described as data. Executing one is a side effect;
//! the descriptor itself is stateless and carries no retry policy.

use crate::external::helm::ReleaseRequest;
use crate::external::kubectl::ClusterApiError;
use crate::external::terraform::{ProvisionerError, TfVars};
use crate::external::{CommandError, ReleaseError};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Error taxonomy shared by every collaborator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Unauthenticated,
    NotFound,
    Timeout,
    Conflict,
    ExternalToolFailure,
    Unknown,
}

#[derive(Debug, Clone, Error, Serialize)]
#[error("{kind:?}: {message}")]
pub struct OperationError {
    pub kind: ErrorKind,
    pub message: String,
}

impl OperationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OperationOutput {
    /// Collaborator-provided detail: tool output, job logs, or a summary.
    pub detail: String,
}

impl OperationOutput {
    pub fn with_detail(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

pub type OperationResult = Result<OperationOutput, OperationError>;

/// Read-only cluster facts an operation can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterQuery {
    NodeCount,
    ServerVersion,
}

/// One call to one external collaborator.
#[derive(Debug, Clone)]
pub enum ResourceOperation {
    /// Initialize the infrastructure provisioner's working directory.
    InfraInit,
    /// Apply the provisioner configuration with the given variable set.
    InfraApply { vars: TfVars },
    /// Tear down provisioned infrastructure.
    InfraDestroy,
    /// Declaratively apply a manifest document. Idempotent by contract.
    ApplyManifest {
        description: String,
        manifest: String,
        namespace: Option<String>,
    },
    /// Query-then-create. Must not error on "already exists" races.
    EnsureNamespace { name: String },
    /// Upgrade-or-install a release; converges on repeat calls.
    EnsureRelease { request: ReleaseRequest },
    /// Submit a one-shot job, block until terminal state or timeout, then
    /// return its output.
    RunJob {
        manifest: String,
        job_name: String,
        namespace: Option<String>,
        timeout: Duration,
    },
    /// Trigger a rolling restart so a deployment picks up changed
    /// configuration. Safe to repeat.
    RestartDeployment {
        deployment: String,
        namespace: Option<String>,
    },
    /// Read-only; never mutates external state.
    Query { query: ClusterQuery },
    /// Overwrite labels on a namespace.
    LabelNamespace {
        namespace: String,
        labels: Vec<(String, String)>,
    },
}

impl ResourceOperation {
    /// Short human-readable description for logs and step errors.
    pub fn describe(&self) -> String {
        match self {
            ResourceOperation::InfraInit => "provisioner init".to_string(),
            ResourceOperation::InfraApply { vars } => {
                format!("provisioner apply ({})", vars.cluster_name)
            }
            ResourceOperation::InfraDestroy => "provisioner destroy".to_string(),
            ResourceOperation::ApplyManifest { description, .. } => {
                format!("apply manifest: {description}")
            }
            ResourceOperation::EnsureNamespace { name } => format!("ensure namespace {name}"),
            ResourceOperation::EnsureRelease { request } => {
                format!("ensure release {} ({})", request.release, request.chart)
            }
            ResourceOperation::RunJob { job_name, .. } => format!("run job {job_name}"),
            ResourceOperation::RestartDeployment { deployment, .. } => {
                format!("restart deployment {deployment}")
            }
            ResourceOperation::Query { query } => format!("query {query:?}"),
            ResourceOperation::LabelNamespace { namespace, .. } => {
                format!("label namespace {namespace}")
            }
        }
    }
}

impl From<CommandError> for OperationError {
    fn from(err: CommandError) -> Self {
        let kind = match err {
            CommandError::Timeout { .. } => ErrorKind::Timeout,
            CommandError::CommandNotFound { .. } => ErrorKind::ExternalToolFailure,
            CommandError::ExecutionFailed { .. } | CommandError::Io { .. } => {
                ErrorKind::ExternalToolFailure
            }
        };
        OperationError::new(kind, err.to_string())
    }
}

impl From<ProvisionerError> for OperationError {
    fn from(err: ProvisionerError) -> Self {
        let kind = match &err {
            ProvisionerError::WorkdirNotFound { .. } => ErrorKind::NotFound,
            ProvisionerError::ToolFailed { .. } => ErrorKind::ExternalToolFailure,
            ProvisionerError::CommandError { source } => {
                return OperationError::from(source.clone())
            }
            ProvisionerError::Io { .. } => ErrorKind::ExternalToolFailure,
        };
        OperationError::new(kind, err.to_string())
    }
}

impl From<ClusterApiError> for OperationError {
    fn from(err: ClusterApiError) -> Self {
        let kind = match &err {
            ClusterApiError::NotFound { .. } => ErrorKind::NotFound,
            ClusterApiError::AlreadyExists { .. } => ErrorKind::Conflict,
            ClusterApiError::Unauthenticated { .. } => ErrorKind::Unauthenticated,
            ClusterApiError::Timeout { .. } => ErrorKind::Timeout,
            ClusterApiError::ApiFailure { .. } => ErrorKind::ExternalToolFailure,
            ClusterApiError::CommandError { source } => {
                return OperationError::from(source.clone())
            }
        };
        OperationError::new(kind, err.to_string())
    }
}

impl From<ReleaseError> for OperationError {
    fn from(err: ReleaseError) -> Self {
        let kind = match &err {
            ReleaseError::RepoUnavailable { .. } => ErrorKind::ExternalToolFailure,
            ReleaseError::ReleaseBusy { .. } => ErrorKind::Conflict,
            ReleaseError::ToolFailed { .. } => ErrorKind::ExternalToolFailure,
            ReleaseError::CommandError { source } => return OperationError::from(source.clone()),
        };
        OperationError::new(kind, err.to_string())
    }
}
