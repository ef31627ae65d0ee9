//! Workflow orchestration
//!
//! The single-flight engine that walks a workflow's steps in declaration
//! order, evaluates conditions against fresh observed state, dispatches
//! operations through the executor, and folds every outcome into a run
//! report. Exactly one workflow runs per process invocation, so no locking
//! or queueing is needed here.

pub mod executor;

pub use executor::OperationExecutor;

use crate::cluster::ClusterTarget;
use crate::config::KubeforgeConfig;
use crate::external::command::ProcessCommandExecutor;
use crate::external::helm::HelmCli;
use crate::external::kubectl::KubectlClient;
use crate::external::terraform::TerraformCli;
use crate::observe::{ObservedState, StatusReconciler};
use crate::workflow::operation::{ErrorKind, OperationError};
use crate::workflow::report::RunReport;
use crate::workflow::step::{Step, StepOutcome, StepStatus};
use crate::workflow::{FailurePolicy, Workflow};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

pub struct Orchestrator {
    executor: OperationExecutor,
    reconciler: StatusReconciler,
}

impl Orchestrator {
    pub fn new(executor: OperationExecutor, reconciler: StatusReconciler) -> Self {
        Self {
            executor,
            reconciler,
        }
    }

    /// Production wiring: real subprocess-backed collaborators, all sharing
    /// one executor, all scoped to the target's kubeconfig and workdir.
    pub fn for_target(target: &ClusterTarget, config: &KubeforgeConfig) -> Self {
        let shell: Arc<ProcessCommandExecutor> = Arc::new(ProcessCommandExecutor::new());
        let provisioner = Arc::new(TerraformCli::new(shell.clone()));
        let kubeconfig = target.kubeconfig_path().to_path_buf();
        let cluster = Arc::new(KubectlClient::new(shell.clone(), kubeconfig.clone()));
        let releases = Arc::new(HelmCli::new(shell, kubeconfig));

        let executor = OperationExecutor::new(
            provisioner,
            cluster.clone(),
            releases,
            target.infra_dir().to_path_buf(),
        );
        let reconciler = StatusReconciler::new(cluster, config.monitoring.namespace.clone());
        Self::new(executor, reconciler)
    }

    /// Fetch the live cluster state for the target. Used by the status and
    /// report surfaces; workflows go through `run` instead.
    pub async fn observe(&self, target: &ClusterTarget) -> Result<ObservedState, OperationError> {
        self.reconciler.observe(target).await
    }

    pub fn executor(&self) -> &OperationExecutor {
        &self.executor
    }

    /// Execute every step of the workflow in order against the target,
    /// honoring its failure policy, and finalize a report. The report is
    /// always produced, even when an abort-policy run halts early.
    pub async fn run(&self, workflow: &Workflow, target: &ClusterTarget) -> RunReport {
        let span = tracing::info_span!(
            "workflow_run",
            workflow = %workflow.name,
            cluster = %target.name,
            provider = %target.provider.as_str(),
        );
        // Instrument rather than hold an Entered guard across awaits; the
        // guard would also make this future !Send.
        async move {
            info!(steps = workflow.steps.len(), "Starting workflow");

            let mut outcomes = Vec::with_capacity(workflow.steps.len());
            for step in &workflow.steps {
                let outcome = self.run_step(step, target).await;
                let halt = outcome.failed()
                    && workflow.failure_policy == FailurePolicy::AbortOnFirstFailure;
                match outcome.status {
                    StepStatus::Succeeded => info!(step = %outcome.step_name, "Step succeeded"),
                    StepStatus::Skipped => info!(step = %outcome.step_name, "Step skipped"),
                    StepStatus::Failed => {
                        warn!(
                            step = %outcome.step_name,
                            error = %outcome.error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                            "Step failed"
                        );
                    }
                }
                outcomes.push(outcome);
                if halt {
                    warn!("Aborting workflow on first failure");
                    break;
                }
            }

            let report =
                RunReport::finalize(&workflow.name, target, workflow.failure_policy, outcomes);
            info!(
                run_id = %report.run_id,
                status = ?report.overall_status,
                "Workflow finished"
            );
            report
        }
        .instrument(span)
        .await
    }

    async fn run_step(&self, step: &Step, target: &ClusterTarget) -> StepOutcome {
        let started_at = Utc::now();

        if let Some(pre) = &step.precondition {
            let state = self.snapshot_or_degrade(target).await;
            if !pre.evaluate(&state) {
                debug!(step = %step.name, condition = %pre.description(), "Precondition not met");
                return StepOutcome {
                    step_name: step.name.clone(),
                    status: StepStatus::Skipped,
                    error: None,
                    detail: None,
                    started_at,
                    finished_at: Utc::now(),
                };
            }
        }

        let mut error = None;
        let mut detail = None;
        for op in &step.operations {
            match self.executor.execute(op).await {
                Ok(output) => {
                    if !output.detail.is_empty() {
                        debug!(step = %step.name, detail = %output.detail, "Operation completed");
                        detail = Some(output.detail);
                    }
                }
                Err(e) => {
                    error = Some(OperationError::new(
                        e.kind,
                        format!("{}: {}", op.describe(), e.message),
                    ));
                    break;
                }
            }
        }

        if error.is_none() {
            if let Some(post) = &step.postcondition {
                let state = self.snapshot_or_degrade(target).await;
                if !post.evaluate(&state) {
                    error = Some(OperationError::new(
                        ErrorKind::Unknown,
                        format!("postcondition not met: {}", post.description()),
                    ));
                }
            }
        }

        let status = if error.is_some() {
            StepStatus::Failed
        } else {
            StepStatus::Succeeded
        };
        StepOutcome {
            step_name: step.name.clone(),
            status,
            error,
            detail,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Conditions are evaluated best-effort: when the snapshot itself cannot
    /// be fetched, conditions see an empty state instead of failing the step
    /// outright. A postcondition that genuinely required live state will then
    /// report "not met", which is the honest answer.
    async fn snapshot_or_degrade(&self, target: &ClusterTarget) -> ObservedState {
        match self.reconciler.observe(target).await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Observed-state snapshot unavailable; conditions see empty state");
                ObservedState::unavailable()
            }
        }
    }
}
