use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cluster::Provider;

pub mod commands;

#[derive(Parser)]
#[command(name = "kubeforge")]
#[command(about = "Kubernetes cluster provisioning, monitoring, and hardening")]
#[command(long_about = "Kubeforge drives a cluster through its lifecycle: provision it on AWS or \
                       Azure, install the monitoring stack, apply security hardening, and run \
                       compliance scans. Start with 'kubeforge create' to bring a cluster up.")]
pub struct Cli {
    /// Cloud provider hosting the cluster
    #[arg(long, global = true, default_value = "aws")]
    pub provider: Provider,

    /// Name of the cluster to operate on
    #[arg(long, global = true, default_value = "kubeforge")]
    pub cluster_name: String,

    /// Provider region for the cluster
    #[arg(long, global = true, default_value = "us-east-1")]
    pub region: String,

    /// Extra configuration file layered over kubeforge.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision the cluster infrastructure and verify the kubeconfig
    Create,
    /// Destroy the cluster infrastructure
    Delete,
    /// Display live cluster status: nodes, version, exposed services
    Status,
    /// Install the monitoring stack: Prometheus, Grafana, metrics-server
    Setup,
    /// Show the external URLs of the monitoring services
    Urls,
    /// Apply security hardening: network policies, pod security, RBAC
    Harden,
    /// Run security scans: Trivy operator and a CIS benchmark job
    Scan,
    /// Generate a security posture report for the cluster
    Report,
}
