use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::cluster::{ClusterTarget, Provider};
use crate::config::KubeforgeConfig;
use crate::orchestrator::Orchestrator;
use crate::telemetry::OperationTimer;
use crate::workflow::registry::{build_workflow, LifecycleAction};
use crate::workflow::report::RunReport;
use crate::workflow::step::StepStatus;

pub mod cluster;
pub mod monitor;
pub mod security;

/// Everything a command needs: resolved configuration, the target identity,
/// and a wired orchestrator.
pub struct CommandContext {
    pub config: KubeforgeConfig,
    pub target: ClusterTarget,
    pub orchestrator: Orchestrator,
}

impl CommandContext {
    pub fn build(
        provider: Provider,
        cluster_name: &str,
        region: &str,
        config_file: Option<&Path>,
    ) -> Result<Self> {
        let config = KubeforgeConfig::load(config_file)?;
        let target = ClusterTarget::new(
            provider,
            cluster_name,
            region,
            &PathBuf::from(&config.provisioner.workdir_root),
        );
        let orchestrator = Orchestrator::for_target(&target, &config);
        Ok(Self {
            config,
            target,
            orchestrator,
        })
    }

    /// Run one lifecycle workflow end to end and print its report.
    pub async fn run_action(&self, action: LifecycleAction) -> Result<RunReport> {
        let workflow = build_workflow(action, &self.target, &self.config);
        let timer = OperationTimer::new(action.workflow_name());
        let report = self.orchestrator.run(&workflow, &self.target).await;
        timer.finish();
        print_report(&report)?;
        Ok(report)
    }
}

/// Print a run report: one line per step, then the JSON document.
pub fn print_report(report: &RunReport) -> Result<()> {
    println!();
    for outcome in &report.outcomes {
        match outcome.status {
            StepStatus::Succeeded => println!("✅ {}", outcome.step_name),
            StepStatus::Skipped => println!("⏭️  {} (skipped)", outcome.step_name),
            StepStatus::Failed => {
                let detail = outcome
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                println!("❌ {} - {}", outcome.step_name, detail);
            }
        }
    }
    println!();
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Exit zero only for a fully successful run. Partial failures are failures
/// as far as calling scripts are concerned.
pub fn exit_code_for(report: &RunReport) -> ExitCode {
    if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
