use std::collections::BTreeMap;

use async_trait::async_trait;
use http::{Method, Request as HttpRequest};
use kube::{Api, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::client::kube_resources::{ObjectMeta, Quantity};
use crate::core::util::quantity::{bytes_of, cpu_millis_of};
use crate::errors::EngineError;

const METRICS_API_PATH: &str = "/apis/metrics.k8s.io/v1beta1";

/// `kubectl get --raw /apis/metrics.k8s.io/v1beta1/nodes/<name>`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default)]
    pub usage: BTreeMap<String, Quantity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerMetrics {
    pub name: String,
    #[serde(default)]
    pub usage: BTreeMap<String, Quantity>,
}

/// `kubectl get --raw /apis/metrics.k8s.io/v1beta1/namespaces/<ns>/pods/<name>`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodMetrics {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default)]
    pub containers: Vec<ContainerMetrics>,
}

// The metrics API has no k8s-openapi type, so describe it by hand
impl k8s_openapi::Resource for NodeMetrics {
    const API_VERSION: &'static str = "metrics.k8s.io/v1beta1";
    const GROUP: &'static str = "metrics.k8s.io";
    const KIND: &'static str = "NodeMetrics";
    const VERSION: &'static str = "v1beta1";
    const URL_PATH_SEGMENT: &'static str = "nodes";
    type Scope = k8s_openapi::ClusterResourceScope;
}

impl k8s_openapi::Metadata for NodeMetrics {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &Self::Ty {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Self::Ty {
        &mut self.metadata
    }
}

impl k8s_openapi::Resource for PodMetrics {
    const API_VERSION: &'static str = "metrics.k8s.io/v1beta1";
    const GROUP: &'static str = "metrics.k8s.io";
    const KIND: &'static str = "PodMetrics";
    const VERSION: &'static str = "v1beta1";
    const URL_PATH_SEGMENT: &'static str = "pods";
    type Scope = k8s_openapi::NamespaceResourceScope;
}

impl k8s_openapi::Metadata for PodMetrics {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &Self::Ty {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Self::Ty {
        &mut self.metadata
    }
}

/// CPU and memory usage of one node or pod. The zero value stands in for
/// missing metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsUsage {
    pub cpu_millis: u64,
    pub memory_bytes: u64,
}

impl MetricsUsage {
    fn from_usage(usage: &BTreeMap<String, Quantity>) -> Self {
        Self {
            cpu_millis: cpu_millis_of(usage.get("cpu")),
            memory_bytes: bytes_of(usage.get("memory")),
        }
    }
}

impl From<&NodeMetrics> for MetricsUsage {
    fn from(metrics: &NodeMetrics) -> Self {
        MetricsUsage::from_usage(&metrics.usage)
    }
}

impl From<&PodMetrics> for MetricsUsage {
    /// Pod usage is the sum over its containers.
    fn from(metrics: &PodMetrics) -> Self {
        metrics
            .containers
            .iter()
            .map(|c| MetricsUsage::from_usage(&c.usage))
            .fold(MetricsUsage::default(), |acc, u| MetricsUsage {
                cpu_millis: acc.cpu_millis.saturating_add(u.cpu_millis),
                memory_bytes: acc.memory_bytes.saturating_add(u.memory_bytes),
            })
    }
}

/// Best-effort usage lookup. A missing backend is an expected condition.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Whether the metrics backend answers at all.
    async fn is_available(&self) -> bool;

    async fn node_metrics(&self, node: &str) -> Result<MetricsUsage, EngineError>;

    async fn pod_metrics(&self, namespace: &str, name: &str) -> Result<MetricsUsage, EngineError>;
}

/// Reads the `metrics.k8s.io` aggregated API through the kube client.
pub struct KubeMetricsClient {
    client: Client,
}

impl KubeMetricsClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetricsSource for KubeMetricsClient {
    async fn is_available(&self) -> bool {
        let req = match HttpRequest::builder()
            .method(Method::GET)
            .uri(METRICS_API_PATH)
            .body(vec![])
        {
            Ok(req) => req,
            Err(e) => {
                debug!("Failed to build metrics discovery request: {}", e);
                return false;
            }
        };

        match self.client.request_text(req).await {
            Ok(_) => true,
            Err(e) => {
                debug!("Metrics API not available: {}", e);
                false
            }
        }
    }

    async fn node_metrics(&self, node: &str) -> Result<MetricsUsage, EngineError> {
        let api: Api<NodeMetrics> = Api::all(self.client.clone());
        let metrics = api
            .get(node)
            .await
            .map_err(|e| EngineError::MetricsUnavailable(format!("node {node}: {e}")))?;
        Ok(MetricsUsage::from(&metrics))
    }

    async fn pod_metrics(&self, namespace: &str, name: &str) -> Result<MetricsUsage, EngineError> {
        let api: Api<PodMetrics> = Api::namespaced(self.client.clone(), namespace);
        let metrics = api.get(name).await.map_err(|e| {
            EngineError::MetricsUnavailable(format!("pod {namespace}/{name}: {e}"))
        })?;
        Ok(MetricsUsage::from(&metrics))
    }
}

/// A cluster without a metrics backend.
pub struct NoMetrics;

#[async_trait]
impl MetricsSource for NoMetrics {
    async fn is_available(&self) -> bool {
        false
    }

    async fn node_metrics(&self, node: &str) -> Result<MetricsUsage, EngineError> {
        Err(EngineError::MetricsUnavailable(format!("node {node}: no metrics backend")))
    }

    async fn pod_metrics(&self, namespace: &str, name: &str) -> Result<MetricsUsage, EngineError> {
        Err(EngineError::MetricsUnavailable(format!(
            "pod {namespace}/{name}: no metrics backend"
        )))
    }
}
