//! Property-based tests for run report derivation.
//!
//! Overall status must be a pure function of the outcome list and the
//! failure policy, so a consumer holding only the serialized outcomes can
//! always recompute it.

use chrono::Utc;
use proptest::prelude::*;
use std::path::Path;

use kubeforge::cluster::{ClusterTarget, Provider};
use kubeforge::workflow::operation::{ErrorKind, OperationError};
use kubeforge::workflow::report::{derive_overall_status, OverallStatus, RunReport};
use kubeforge::workflow::step::{StepOutcome, StepStatus};
use kubeforge::workflow::FailurePolicy;

fn status_strategy() -> impl Strategy<Value = StepStatus> {
    prop_oneof![
        Just(StepStatus::Succeeded),
        Just(StepStatus::Skipped),
        Just(StepStatus::Failed),
    ]
}

fn policy_strategy() -> impl Strategy<Value = FailurePolicy> {
    prop_oneof![
        Just(FailurePolicy::AbortOnFirstFailure),
        Just(FailurePolicy::ContinueAndCollect),
    ]
}

fn outcome(index: usize, status: StepStatus) -> StepOutcome {
    let error = (status == StepStatus::Failed)
        .then(|| OperationError::new(ErrorKind::ExternalToolFailure, "tool exited nonzero"));
    StepOutcome {
        step_name: format!("step-{index}"),
        status,
        error,
        detail: None,
        started_at: Utc::now(),
        finished_at: Utc::now(),
    }
}

proptest! {
    #[test]
    fn status_is_succeeded_iff_nothing_failed(
        statuses in proptest::collection::vec(status_strategy(), 0..12),
        policy in policy_strategy(),
    ) {
        let outcomes: Vec<StepOutcome> = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| outcome(i, *s))
            .collect();
        let any_failed = statuses.contains(&StepStatus::Failed);

        let derived = derive_overall_status(policy, &outcomes);
        match (any_failed, policy) {
            (false, _) => prop_assert_eq!(derived, OverallStatus::Succeeded),
            (true, FailurePolicy::AbortOnFirstFailure) => {
                prop_assert_eq!(derived, OverallStatus::Failed)
            }
            (true, FailurePolicy::ContinueAndCollect) => {
                prop_assert_eq!(derived, OverallStatus::PartialFailure)
            }
        }
    }

    #[test]
    fn finalized_report_status_is_recomputable_from_outcomes(
        statuses in proptest::collection::vec(status_strategy(), 0..12),
        policy in policy_strategy(),
    ) {
        let outcomes: Vec<StepOutcome> = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| outcome(i, *s))
            .collect();
        let target = ClusterTarget::new(Provider::Azure, "prop", "eastus", Path::new("infra"));

        let report = RunReport::finalize("monitor", &target, policy, outcomes);
        prop_assert_eq!(
            report.overall_status,
            derive_overall_status(policy, &report.outcomes)
        );
        // Reports stay serializable regardless of content.
        prop_assert!(serde_json::to_string(&report).is_ok());
    }

    #[test]
    fn skipped_steps_never_change_the_verdict(
        skips in proptest::collection::vec(Just(StepStatus::Skipped), 0..8),
        policy in policy_strategy(),
    ) {
        let outcomes: Vec<StepOutcome> = skips
            .iter()
            .enumerate()
            .map(|(i, s)| outcome(i, *s))
            .collect();
        prop_assert_eq!(
            derive_overall_status(policy, &outcomes),
            OverallStatus::Succeeded
        );
    }
}
