//! Cluster lifecycle commands: create, delete, status.

use anyhow::Result;
use std::process::ExitCode;

use super::{exit_code_for, CommandContext};
use crate::workflow::operation::ErrorKind;
use crate::workflow::registry::{convergence_probe, LifecycleAction};

pub struct CreateCommand {
    ctx: CommandContext,
}

impl CreateCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self) -> Result<ExitCode> {
        println!(
            "🚀 Creating cluster '{}' on {} ({})",
            self.ctx.target.name, self.ctx.target.provider, self.ctx.target.region
        );
        println!();

        let report = self.ctx.run_action(LifecycleAction::Provision).await?;
        if !report.succeeded() {
            if let Some(halted) = report.halted_step() {
                println!("❌ Provisioning halted at step '{}'", halted.step_name);
            }
            return Ok(exit_code_for(&report));
        }

        // Convergence check: the report says the infrastructure converged;
        // confirm the API actually answers before declaring victory.
        print!("🔄 Verifying cluster API access... ");
        std::io::Write::flush(&mut std::io::stdout())?;
        match self
            .ctx
            .orchestrator
            .executor()
            .execute(&convergence_probe())
            .await
        {
            Ok(output) => {
                println!("✅");
                println!("🎯 Cluster is up with {} node(s)", output.detail);
                println!();
                println!("Next steps:");
                println!("  📊 kubeforge setup    # Install monitoring stack");
                println!("  🔒 kubeforge harden   # Apply security hardening");
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                println!("❌");
                println!("⚠️  Infrastructure converged but the API is not reachable: {e}");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

pub struct DeleteCommand {
    ctx: CommandContext,
}

impl DeleteCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self) -> Result<ExitCode> {
        println!(
            "🗑️  Destroying cluster '{}' on {}",
            self.ctx.target.name, self.ctx.target.provider
        );
        println!();

        let report = self.ctx.run_action(LifecycleAction::Teardown).await?;
        if report.succeeded() {
            println!("✅ Cluster infrastructure destroyed");
        }
        Ok(exit_code_for(&report))
    }
}

pub struct StatusCommand {
    ctx: CommandContext,
}

impl StatusCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self) -> Result<ExitCode> {
        println!("📊 CLUSTER STATUS: {}", self.ctx.target.name);
        println!("=========================");
        println!();

        match self.ctx.orchestrator.observe(&self.ctx.target).await {
            Ok(state) => {
                println!("🟢 Cluster: running");
                println!("   🖥️  Nodes: {}", state.node_count);
                if state.kubernetes_version.is_empty() {
                    println!("   ⚠️  Version: unavailable");
                } else {
                    println!("   📦 Version: {}", state.kubernetes_version);
                }
                if state.service_endpoints.is_empty() {
                    println!("   📭 No monitoring services exposed");
                } else {
                    println!("   🌐 Exposed services:");
                    for (service, url) in &state.service_endpoints {
                        println!("      {service}: {url}");
                    }
                }
                println!("   🕐 Observed at: {}", state.observed_at.to_rfc3339());
                Ok(ExitCode::SUCCESS)
            }
            Err(e) if e.kind == ErrorKind::Unauthenticated => {
                println!("🔴 Cluster: not provisioned");
                println!("   {}", e.message);
                println!();
                println!("💡 Run 'kubeforge create' to provision it");
                Ok(ExitCode::FAILURE)
            }
            Err(e) => {
                println!("❌ Failed to observe cluster: {e}");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
