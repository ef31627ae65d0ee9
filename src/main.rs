use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

use kubeforge::cli::commands::cluster::{CreateCommand, DeleteCommand, StatusCommand};
use kubeforge::cli::commands::monitor::{SetupCommand, UrlsCommand};
use kubeforge::cli::commands::security::{HardenCommand, ReportCommand, ScanCommand};
use kubeforge::cli::commands::CommandContext;
use kubeforge::cli::{Cli, Commands};
use kubeforge::config::KubeforgeConfig;
use kubeforge::telemetry::{generate_correlation_id, init_telemetry};

fn main() -> Result<ExitCode> {
    KubeforgeConfig::load_env_file()?;

    let cli = Cli::parse();

    let command = match cli.command {
        Some(command) => command,
        None => {
            show_how_to_get_started();
            return Ok(ExitCode::SUCCESS);
        }
    };

    tokio::runtime::Runtime::new()?.block_on(async {
        let ctx = CommandContext::build(
            cli.provider,
            &cli.cluster_name,
            &cli.region,
            cli.config.as_deref(),
        )?;
        init_telemetry(&ctx.config.observability)?;
        tracing::info!(
            correlation_id = %generate_correlation_id(),
            cluster = %ctx.target.name,
            provider = %ctx.target.provider,
            "Invocation started"
        );

        match command {
            Commands::Create => CreateCommand::new(ctx).execute().await,
            Commands::Delete => DeleteCommand::new(ctx).execute().await,
            Commands::Status => StatusCommand::new(ctx).execute().await,
            Commands::Setup => SetupCommand::new(ctx).execute().await,
            Commands::Urls => UrlsCommand::new(ctx).execute().await,
            Commands::Harden => HardenCommand::new(ctx).execute().await,
            Commands::Scan => ScanCommand::new(ctx).execute().await,
            Commands::Report => ReportCommand::new(ctx).execute().await,
        }
    })
}

fn show_how_to_get_started() {
    println!("⚙️  Kubeforge - Kubernetes Cluster Lifecycle Orchestration");
    println!();
    println!("To get started:");
    println!("  🚀 kubeforge create    # Provision a cluster");
    println!("  📊 kubeforge setup     # Install the monitoring stack");
    println!("  🔒 kubeforge harden    # Apply security hardening");
    println!("  🔍 kubeforge scan      # Run security scans");
    println!();
    println!("Inspection:");
    println!("  📋 kubeforge status    # Live cluster status");
    println!("  🌐 kubeforge urls      # Monitoring service URLs");
    println!("  📄 kubeforge report    # Security posture report");
    println!();
    println!("💡 All commands take --provider, --cluster-name, and --region");
}
