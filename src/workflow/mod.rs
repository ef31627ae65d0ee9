//! Workflow model
//!
//! A workflow is a named, ordered list of steps representing one lifecycle
//! action, plus the policy applied when a step fails. Workflows come from the
//! static registry; the orchestrator only ever consumes them.

pub mod operation;
pub mod registry;
pub mod report;
pub mod step;

pub use operation::{
    ClusterQuery, ErrorKind, OperationError, OperationOutput, OperationResult, ResourceOperation,
};
pub use registry::LifecycleAction;
pub use report::{derive_overall_status, OverallStatus, RunReport, TargetSummary};
pub use step::{Condition, Step, StepOutcome, StepStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failed step; no subsequent step executes.
    AbortOnFirstFailure,
    /// Record the failure and proceed to the next step regardless.
    ContinueAndCollect,
}

#[derive(Debug)]
pub struct Workflow {
    pub name: String,
    pub steps: Vec<Step>,
    pub failure_policy: FailurePolicy,
}

impl Workflow {
    pub fn new(name: impl Into<String>, failure_policy: FailurePolicy) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            failure_policy,
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}
