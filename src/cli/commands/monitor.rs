//! Monitoring stack commands: setup, urls.

use anyhow::Result;
use std::process::ExitCode;

use super::{exit_code_for, CommandContext};
use crate::workflow::registry::LifecycleAction;

pub struct SetupCommand {
    ctx: CommandContext,
}

impl SetupCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self) -> Result<ExitCode> {
        println!(
            "📊 Installing monitoring stack on '{}' (namespace: {})",
            self.ctx.target.name, self.ctx.config.monitoring.namespace
        );
        println!();

        let report = self.ctx.run_action(LifecycleAction::Monitor).await?;
        if report.succeeded() {
            println!("✅ Monitoring stack converged");
            println!("💡 Run 'kubeforge urls' once the LoadBalancers are assigned");
        } else {
            println!("⚠️  Some monitoring components failed; see the report above");
        }
        Ok(exit_code_for(&report))
    }
}

pub struct UrlsCommand {
    ctx: CommandContext,
}

impl UrlsCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self) -> Result<ExitCode> {
        println!("🌐 MONITORING ENDPOINTS: {}", self.ctx.target.name);
        println!("============================");
        println!();

        let state = match self.ctx.orchestrator.observe(&self.ctx.target).await {
            Ok(state) => state,
            Err(e) => {
                println!("❌ Failed to observe cluster: {e}");
                return Ok(ExitCode::FAILURE);
            }
        };

        if state.service_endpoints.is_empty() {
            println!("📭 No external endpoints yet");
            println!("   💡 LoadBalancer provisioning can take a few minutes after 'kubeforge setup'");
            return Ok(ExitCode::FAILURE);
        }

        for (service, url) in &state.service_endpoints {
            let emoji = match service.as_str() {
                "prometheus" => "🔥",
                "grafana" => "📈",
                _ => "🔗",
            };
            println!("{emoji} {service}: {url}");
        }
        Ok(ExitCode::SUCCESS)
    }
}
