use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for kubeforge
///
/// Loaded once at startup and handed to the components that need it; there
/// is deliberately no process-wide singleton.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KubeforgeConfig {
    /// Cluster sizing and versioning defaults
    pub cluster: ClusterSettings,
    /// Provisioner working directory layout
    pub provisioner: ProvisionerSettings,
    /// Monitoring stack settings
    pub monitoring: MonitoringSettings,
    /// Security scan settings
    pub security: SecuritySettings,
    /// Logging settings
    pub observability: ObservabilitySettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterSettings {
    pub environment: String,
    pub kubernetes_version: String,
    pub worker_min_count: u32,
    pub worker_max_count: u32,
    /// Worker machine size; when unset, a per-provider default applies.
    pub worker_instance_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvisionerSettings {
    /// Root directory holding one provisioner workdir per provider.
    pub workdir_root: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringSettings {
    pub namespace: String,
    /// Optional helm values files for the monitoring releases.
    pub prometheus_values_file: Option<String>,
    pub grafana_values_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecuritySettings {
    pub namespace: String,
    /// Bounded wait for the CIS benchmark job, in seconds.
    pub bench_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    /// Log level directive (e.g. "info", "kubeforge=debug")
    pub log_level: String,
    /// Emit JSON-structured logs instead of human-readable ones
    pub json_logs: bool,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            environment: "dev".to_string(),
            kubernetes_version: "1.24".to_string(),
            worker_min_count: 2,
            worker_max_count: 5,
            worker_instance_type: None,
        }
    }
}

impl Default for ProvisionerSettings {
    fn default() -> Self {
        Self {
            workdir_root: "infra".to_string(),
        }
    }
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            namespace: "monitoring".to_string(),
            prometheus_values_file: None,
            grafana_values_file: None,
        }
    }
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            namespace: "security".to_string(),
            bench_timeout_seconds: 300,
        }
    }
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Default for KubeforgeConfig {
    fn default() -> Self {
        Self {
            cluster: ClusterSettings::default(),
            provisioner: ProvisionerSettings::default(),
            monitoring: MonitoringSettings::default(),
            security: SecuritySettings::default(),
            observability: ObservabilitySettings::default(),
        }
    }
}

impl KubeforgeConfig {
    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. kubeforge.toml in the working directory
    /// 3. An explicit --config file (any format the config crate accepts)
    /// 4. Environment variables (prefixed with KUBEFORGE_)
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("kubeforge.toml").exists() {
            builder = builder.add_source(File::with_name("kubeforge"));
        }

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("KUBEFORGE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
