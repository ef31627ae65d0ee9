//! Steps and step outcomes
//!
//! A step is one named unit of work: an optional precondition, an ordered
//! list of resource operations, and an optional postcondition. Outcomes are
//! immutable once created and are appended to the run report in step order.

use super::operation::{OperationError, ResourceOperation};
use crate::observe::ObservedState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

type StatePredicate = Box<dyn Fn(&ObservedState) -> bool + Send + Sync>;

/// A described predicate over observed cluster state. Conditions may capture
/// target-local facts (e.g. a kubeconfig path) in their closure.
pub struct Condition {
    description: String,
    check: StatePredicate,
}

impl Condition {
    pub fn new(
        description: impl Into<String>,
        check: impl Fn(&ObservedState) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            check: Box::new(check),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn evaluate(&self, state: &ObservedState) -> bool {
        (self.check)(state)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

pub struct Step {
    pub name: String,
    pub precondition: Option<Condition>,
    pub operations: Vec<ResourceOperation>,
    pub postcondition: Option<Condition>,
    /// An idempotent step may be re-run after partial failure without
    /// re-validating its precondition.
    pub idempotent: bool,
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            precondition: None,
            operations: Vec::new(),
            postcondition: None,
            idempotent: false,
        }
    }

    pub fn operation(mut self, op: ResourceOperation) -> Self {
        self.operations.push(op);
        self
    }

    pub fn precondition(mut self, condition: Condition) -> Self {
        self.precondition = Some(condition);
        self
    }

    pub fn postcondition(mut self, condition: Condition) -> Self {
        self.postcondition = Some(condition);
        self
    }

    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    /// True when executing this step requires a fresh observed-state
    /// snapshot.
    pub fn needs_state(&self) -> bool {
        self.precondition.is_some() || self.postcondition.is_some()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("operations", &self.operations.len())
            .field("idempotent", &self.idempotent)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepStatus {
    Succeeded,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step_name: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
    /// Output of the step's last operation, when the collaborator produced
    /// any (e.g. benchmark job logs).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StepOutcome {
    pub fn failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}
