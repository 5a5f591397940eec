pub mod probes;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tracing::debug;

/// Health of a single dependency, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Result of probing one dependency
#[derive(Debug, Clone)]
pub struct DependencyReport {
    pub status: HealthStatus,
    pub detail: Option<String>,
}

impl DependencyReport {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            detail: None,
        }
    }

    pub fn degraded(detail: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            detail: Some(detail.into()),
        }
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            detail: Some(detail.into()),
        }
    }
}

/// One dependency's entry in the composite snapshot
#[derive(Debug, Clone, Serialize)]
pub struct DependencyHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Composite health document exposed to operators
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub overall: HealthStatus,
    pub dependencies: Vec<DependencyHealth>,
}

impl HealthSnapshot {
    /// Whether the gateway should report ready
    pub fn is_serving(&self) -> bool {
        self.overall != HealthStatus::Unhealthy
    }
}

/// A single backend dependency probe
#[async_trait]
pub trait DependencyProbe: Send + Sync {
    /// Dependency name as shown in the snapshot
    fn name(&self) -> &str;

    /// Probe the dependency once
    async fn probe(&self) -> DependencyReport;
}

/// Collects dependency probes and reduces them into one composite status.
///
/// Probes run concurrently, each bounded by its own timeout, so one
/// hanging dependency can neither block the others nor stall the
/// snapshot.
pub struct HealthAggregator {
    probes: Vec<Arc<dyn DependencyProbe>>,
    probe_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            probes: Vec::new(),
            probe_timeout,
        }
    }

    /// Register a dependency probe
    pub fn register(&mut self, probe: Arc<dyn DependencyProbe>) {
        self.probes.push(probe);
    }

    pub fn with_probe(mut self, probe: Arc<dyn DependencyProbe>) -> Self {
        self.register(probe);
        self
    }

    /// Probe every dependency and reduce to the composite status.
    ///
    /// Overall status is the most severe dependency status; with no
    /// probes configured the gateway reports healthy.
    pub async fn snapshot(&self) -> HealthSnapshot {
        let checks = self.probes.iter().map(|probe| {
            let probe = probe.clone();
            let timeout = self.probe_timeout;
            async move {
                let report = match tokio::time::timeout(timeout, probe.probe()).await {
                    Ok(report) => report,
                    Err(_) => DependencyReport::unhealthy("probe timed out"),
                };

                debug!(dependency = probe.name(), status = ?report.status, "dependency probed");

                DependencyHealth {
                    name: probe.name().to_string(),
                    status: report.status,
                    detail: report.detail,
                }
            }
        });

        let dependencies = join_all(checks).await;

        let overall = dependencies
            .iter()
            .map(|d| d.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        HealthSnapshot {
            overall,
            dependencies,
        }
    }
}
