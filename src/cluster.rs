//! Cluster target identity
//!
//! A `ClusterTarget` names one cluster on one provider and locates its
//! credential artifact. It is immutable once a workflow run begins.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Azure,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Azure => "azure",
        }
    }

    /// Name of the tfvars region variable for this provider.
    pub fn region_var(&self) -> &'static str {
        match self {
            Provider::Aws => "aws_region",
            Provider::Azure => "azure_region",
        }
    }

    pub fn default_worker_instance_type(&self) -> &'static str {
        match self {
            Provider::Aws => "t3.medium",
            Provider::Azure => "Standard_D2_v2",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one cluster. The kubeconfig path doubles as the credentials
/// handle: it is derived deterministically from the provider workdir and the
/// cluster name, and its absence before the first successful provision is a
/// normal condition, not corruption.
#[derive(Debug, Clone)]
pub struct ClusterTarget {
    pub provider: Provider,
    pub name: String,
    pub region: String,
    infra_dir: PathBuf,
    kubeconfig: PathBuf,
}

impl ClusterTarget {
    pub fn new(provider: Provider, name: &str, region: &str, workdir_root: &Path) -> Self {
        let infra_dir = workdir_root.join(provider.as_str());
        let kubeconfig = infra_dir.join(format!("kubeconfig_{name}"));
        Self {
            provider,
            name: name.to_string(),
            region: region.to_string(),
            infra_dir,
            kubeconfig,
        }
    }

    /// Provisioner working directory for this target's provider.
    pub fn infra_dir(&self) -> &Path {
        &self.infra_dir
    }

    pub fn kubeconfig_path(&self) -> &Path {
        &self.kubeconfig
    }

    pub fn credentials_present(&self) -> bool {
        self.kubeconfig.exists()
    }
}
