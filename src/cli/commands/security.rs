//! Security commands: harden, scan, report.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::process::ExitCode;

use super::{exit_code_for, CommandContext};
use crate::workflow::operation::{ClusterQuery, ResourceOperation};
use crate::workflow::registry::LifecycleAction;
use crate::workflow::report::TargetSummary;

pub struct HardenCommand {
    ctx: CommandContext,
}

impl HardenCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self) -> Result<ExitCode> {
        println!(
            "🔒 Applying security hardening to '{}'",
            self.ctx.target.name
        );
        println!();

        let report = self.ctx.run_action(LifecycleAction::Harden).await?;
        if report.succeeded() {
            println!("✅ Hardening applied: network policies, pod security, read-only RBAC");
        } else {
            println!("⚠️  Some hardening steps failed; the rest were still applied");
        }
        Ok(exit_code_for(&report))
    }
}

pub struct ScanCommand {
    ctx: CommandContext,
}

impl ScanCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self) -> Result<ExitCode> {
        println!("🔍 Running security scans on '{}'", self.ctx.target.name);
        println!();

        let report = self.ctx.run_action(LifecycleAction::Scan).await?;

        // Benchmark output lands in the bench step's detail.
        if let Some(outcome) = report
            .outcomes
            .iter()
            .find(|o| o.step_name == "run-kube-bench")
        {
            if let Some(results) = &outcome.detail {
                println!();
                println!("📋 CIS BENCHMARK RESULTS:");
                println!("─────────────────────────");
                println!("{results}");
            }
        }
        Ok(exit_code_for(&report))
    }
}

/// Security posture document assembled by the report command. Serialized to
/// JSON on stdout.
#[derive(Debug, Serialize)]
struct SecurityReport {
    generated_at: chrono::DateTime<Utc>,
    target: TargetSummary,
    cluster: ClusterInfo,
    recommendations: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct ClusterInfo {
    kubernetes_version: String,
    node_count: u32,
    exposed_services: Vec<String>,
}

const RECOMMENDATIONS: &[&str] = &[
    "Enable audit logging on the API server",
    "Rotate cluster credentials regularly",
    "Review network policies for overly permissive rules",
    "Keep the Kubernetes version within the supported window",
    "Re-run the CIS benchmark after every configuration change",
];

pub struct ReportCommand {
    ctx: CommandContext,
}

impl ReportCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self) -> Result<ExitCode> {
        let state = match self.ctx.orchestrator.observe(&self.ctx.target).await {
            Ok(state) => state,
            Err(e) => {
                println!("❌ Cannot generate report: {e}");
                return Ok(ExitCode::FAILURE);
            }
        };

        // The reconciler degrades an unknown version to empty; ask the API
        // directly so the report carries a definite answer when one exists.
        let kubernetes_version = if state.kubernetes_version.is_empty() {
            self.ctx
                .orchestrator
                .executor()
                .execute(&ResourceOperation::Query {
                    query: ClusterQuery::ServerVersion,
                })
                .await
                .map(|o| o.detail)
                .unwrap_or_default()
        } else {
            state.kubernetes_version.clone()
        };

        let report = SecurityReport {
            generated_at: Utc::now(),
            target: TargetSummary::from(&self.ctx.target),
            cluster: ClusterInfo {
                kubernetes_version,
                node_count: state.node_count,
                exposed_services: state.service_endpoints.keys().cloned().collect(),
            },
            recommendations: RECOMMENDATIONS.to_vec(),
        };

        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(ExitCode::SUCCESS)
    }
}
