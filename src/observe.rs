//! Status reconciliation
//!
//! Answers "what is the current observed state" by re-querying the cluster
//! on every call. Nothing here is cached; staleness is impossible by
//! construction. Partial query failures degrade individual fields instead of
//! failing the whole observation.

use crate::cluster::ClusterTarget;
use crate::external::kubectl::{ClusterApi, ClusterApiError};
use crate::workflow::operation::{ErrorKind, OperationError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Point-in-time snapshot of externally queried cluster facts.
#[derive(Debug, Clone, Serialize)]
pub struct ObservedState {
    pub node_count: u32,
    pub kubernetes_version: String,
    pub service_endpoints: BTreeMap<String, String>,
    pub observed_at: DateTime<Utc>,
}

impl ObservedState {
    /// Zero-value state, used when the cluster cannot be queried at all.
    pub fn unavailable() -> Self {
        Self {
            node_count: 0,
            kubernetes_version: String::new(),
            service_endpoints: BTreeMap::new(),
            observed_at: Utc::now(),
        }
    }

    pub fn has_endpoint(&self, service: &str) -> bool {
        self.service_endpoints.contains_key(service)
    }
}

/// Services whose external endpoints the reconciler looks up.
const ENDPOINT_LOOKUPS: &[(&str, &str, u16)] = &[
    ("prometheus", "prometheus-server", 9090),
    ("grafana", "grafana", 3000),
];

pub struct StatusReconciler {
    cluster: Arc<dyn ClusterApi>,
    monitoring_namespace: String,
}

impl StatusReconciler {
    pub fn new(cluster: Arc<dyn ClusterApi>, monitoring_namespace: impl Into<String>) -> Self {
        Self {
            cluster,
            monitoring_namespace: monitoring_namespace.into(),
        }
    }

    /// Query current cluster state. Fails hard only when credentials are
    /// absent or rejected, or when a query exceeds its bounded wait; any
    /// other per-field failure leaves that field at its zero value.
    pub async fn observe(&self, target: &ClusterTarget) -> Result<ObservedState, OperationError> {
        if !target.credentials_present() {
            return Err(OperationError::new(
                ErrorKind::Unauthenticated,
                format!(
                    "kubeconfig not found at {}; provision the cluster first",
                    target.kubeconfig_path().display()
                ),
            ));
        }

        let node_count = match self.cluster.node_count().await {
            Ok(count) => count,
            Err(e) => {
                self.fail_or_degrade("node count", e)?;
                0
            }
        };

        let kubernetes_version = match self.cluster.server_version().await {
            Ok(version) => version,
            Err(e) => {
                self.fail_or_degrade("server version", e)?;
                String::new()
            }
        };

        let mut service_endpoints = BTreeMap::new();
        for (label, service, port) in ENDPOINT_LOOKUPS {
            match self
                .cluster
                .service_endpoint(service, &self.monitoring_namespace, *port)
                .await
            {
                Ok(Some(url)) => {
                    service_endpoints.insert(label.to_string(), url);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(service, error = %e, "Endpoint lookup failed; leaving field unset");
                }
            }
        }

        Ok(ObservedState {
            node_count,
            kubernetes_version,
            service_endpoints,
            observed_at: Utc::now(),
        })
    }

    // Credential and timeout failures abort the observation; anything else
    // degrades the field.
    fn fail_or_degrade(&self, field: &str, err: ClusterApiError) -> Result<(), OperationError> {
        match err {
            ClusterApiError::Unauthenticated { .. } | ClusterApiError::Timeout { .. } => {
                Err(OperationError::from(err))
            }
            other => {
                warn!(field, error = %other, "Query failed; leaving field at zero value");
                Ok(())
            }
        }
    }
}
