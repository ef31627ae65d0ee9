//! Run reports
//!
//! The aggregated, immutable result of executing one workflow once against
//! one cluster target. Always serializable, always produced, even when the
//! run aborted early.

use super::step::{StepOutcome, StepStatus};
use super::FailurePolicy;
use crate::cluster::{ClusterTarget, Provider};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverallStatus {
    Succeeded,
    PartialFailure,
    Failed,
}

/// The portion of the target identity worth persisting in a report.
#[derive(Debug, Clone, Serialize)]
pub struct TargetSummary {
    pub provider: Provider,
    pub cluster_name: String,
    pub region: String,
}

impl From<&ClusterTarget> for TargetSummary {
    fn from(target: &ClusterTarget) -> Self {
        Self {
            provider: target.provider,
            cluster_name: target.name.clone(),
            region: target.region.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub workflow_name: String,
    pub target: TargetSummary,
    pub outcomes: Vec<StepOutcome>,
    pub overall_status: OverallStatus,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn finalize(
        workflow_name: &str,
        target: &ClusterTarget,
        policy: FailurePolicy,
        outcomes: Vec<StepOutcome>,
    ) -> Self {
        let overall_status = derive_overall_status(policy, &outcomes);
        Self {
            run_id: Uuid::new_v4(),
            workflow_name: workflow_name.to_string(),
            target: TargetSummary::from(target),
            outcomes,
            overall_status,
            finished_at: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.overall_status == OverallStatus::Succeeded
    }

    /// The step that halted progress, if the run failed.
    pub fn halted_step(&self) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|o| o.failed())
    }
}

/// Overall status is a pure function of the outcomes list and the policy:
/// Succeeded iff every outcome succeeded or was skipped; under
/// AbortOnFirstFailure any failure finalizes as Failed; under
/// ContinueAndCollect failures aggregate as PartialFailure.
pub fn derive_overall_status(policy: FailurePolicy, outcomes: &[StepOutcome]) -> OverallStatus {
    let any_failed = outcomes.iter().any(|o| o.status == StepStatus::Failed);
    if !any_failed {
        OverallStatus::Succeeded
    } else {
        match policy {
            FailurePolicy::AbortOnFirstFailure => OverallStatus::Failed,
            FailurePolicy::ContinueAndCollect => OverallStatus::PartialFailure,
        }
    }
}
