use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::client::kube_resources::{Node, Pod};
use crate::core::client::metrics::MetricsUsage;
use crate::core::probe::ServiceState;
use crate::core::util::quantity::{bytes_of, cpu_and_memory, ratio};
use crate::core::util::time_util::created_at;
use crate::domain::model::pod_model::requested_resources;

pub const INTERNAL_IP: &str = "InternalIP";
pub const EXTERNAL_IP: &str = "ExternalIP";

const CONTROL_PLANE_LABELS: [&str; 2] = [
    "node-role.kubernetes.io/control-plane",
    "node-role.kubernetes.io/master",
];

const PRESSURE_CONDITIONS: [&str; 4] = [
    "MemoryPressure",
    "DiskPressure",
    "PIDPressure",
    "NetworkUnavailable",
];

/// Readiness derived from the node's `Ready` condition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum NodeStatus {
    Ready,
    NotReady,
    #[default]
    Unknown,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Ready => "Ready",
            NodeStatus::NotReady => "NotReady",
            NodeStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// One cluster node, rebuilt in full every node cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeModel {
    pub name: String,
    pub status: NodeStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub kubelet_version: String,
    pub internal_ip: Option<String>,
    pub external_ip: Option<String>,
    pub os_image: String,
    pub architecture: String,
    pub pressures: Vec<String>,

    pub pods_count: usize,
    pub container_images_count: usize,

    pub allocatable_cpu_millis: u64,
    pub allocatable_memory_bytes: u64,
    pub allocatable_storage_bytes: u64,

    /// Sum of container requests of the pods scheduled here.
    pub requested_cpu_millis: u64,
    pub requested_memory_bytes: u64,

    /// Metrics usage, or the requested sums when no metrics backend exists.
    pub usage_cpu_millis: u64,
    pub usage_memory_bytes: u64,

    pub is_control_plane: bool,
    pub runtime_healthy: bool,
    pub kubelet_healthy: bool,
    pub remote_probe_active: bool,
}

impl NodeModel {
    /// Assemble the model for `node` from the pods scheduled on it.
    ///
    /// `usage` is `None` when the metrics backend is unavailable; the usage
    /// fields then carry the requested sums.
    pub fn build(
        node: &Node,
        pods: &[&Pod],
        usage: Option<MetricsUsage>,
        remote_probe: ServiceState,
    ) -> Self {
        let status = node.status.as_ref();
        let info = status.and_then(|s| s.node_info.as_ref());
        let allocatable = status.and_then(|s| s.allocatable.as_ref());
        let (allocatable_cpu_millis, allocatable_memory_bytes) = cpu_and_memory(allocatable);

        let (requested_cpu_millis, requested_memory_bytes) = pods
            .iter()
            .map(|p| requested_resources(p))
            .fold((0u64, 0u64), |(cpu, mem), (c, m)| {
                (cpu.saturating_add(c), mem.saturating_add(m))
            });

        let usage = usage.unwrap_or(MetricsUsage {
            cpu_millis: requested_cpu_millis,
            memory_bytes: requested_memory_bytes,
        });

        Self {
            name: node.metadata.name.clone().unwrap_or_default(),
            status: node_ready_status(node),
            created_at: created_at(&node.metadata),
            kubelet_version: info.map(|i| i.kubelet_version.clone()).unwrap_or_default(),
            internal_ip: node_address(node, INTERNAL_IP),
            external_ip: node_address(node, EXTERNAL_IP),
            os_image: info.map(|i| i.os_image.clone()).unwrap_or_default(),
            architecture: info.map(|i| i.architecture.clone()).unwrap_or_default(),
            pressures: node_pressures(node),
            pods_count: pods.len(),
            container_images_count: status
                .and_then(|s| s.images.as_ref())
                .map(|images| images.len())
                .unwrap_or(0),
            allocatable_cpu_millis,
            allocatable_memory_bytes,
            allocatable_storage_bytes: bytes_of(
                allocatable.and_then(|a| a.get("ephemeral-storage")),
            ),
            requested_cpu_millis,
            requested_memory_bytes,
            usage_cpu_millis: usage.cpu_millis,
            usage_memory_bytes: usage.memory_bytes,
            is_control_plane: is_control_plane(node),
            runtime_healthy: is_runtime_healthy(node),
            kubelet_healthy: is_kubelet_healthy(node),
            remote_probe_active: remote_probe.is_active(),
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.created_at.map(|t| now - t)
    }

    /// CPU pressure against allocatable, on the basis selected by metrics availability.
    pub fn cpu_ratio(&self, metrics_available: bool) -> f64 {
        let used = if metrics_available {
            self.usage_cpu_millis
        } else {
            self.requested_cpu_millis
        };
        ratio(used, self.allocatable_cpu_millis)
    }

    pub fn memory_ratio(&self, metrics_available: bool) -> f64 {
        let used = if metrics_available {
            self.usage_memory_bytes
        } else {
            self.requested_memory_bytes
        };
        ratio(used, self.allocatable_memory_bytes)
    }
}

fn condition_status<'a>(node: &'a Node, kind: &str) -> Option<&'a str> {
    node.status
        .as_ref()?
        .conditions
        .as_ref()?
        .iter()
        .find(|c| c.type_ == kind)
        .map(|c| c.status.as_str())
}

pub fn node_ready_status(node: &Node) -> NodeStatus {
    match condition_status(node, "Ready") {
        Some("True") => NodeStatus::Ready,
        Some("False") => NodeStatus::NotReady,
        _ => NodeStatus::Unknown,
    }
}

/// Names of the pressure conditions currently `True`.
pub fn node_pressures(node: &Node) -> Vec<String> {
    PRESSURE_CONDITIONS
        .iter()
        .filter(|kind| condition_status(node, kind) == Some("True"))
        .map(|kind| kind.to_string())
        .collect()
}

pub fn is_control_plane(node: &Node) -> bool {
    node.metadata
        .labels
        .as_ref()
        .map(|labels| CONTROL_PLANE_LABELS.iter().any(|l| labels.contains_key(*l)))
        .unwrap_or(false)
}

pub fn is_kubelet_healthy(node: &Node) -> bool {
    node_ready_status(node) == NodeStatus::Ready
}

/// The runtime reports a version such as `containerd://1.7.2`.
pub fn is_runtime_healthy(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.node_info.as_ref())
        .map(|i| i.container_runtime_version.chars().any(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

pub fn node_address(node: &Node, kind: &str) -> Option<String> {
    node.status
        .as_ref()?
        .addresses
        .as_ref()?
        .iter()
        .find(|a| a.type_ == kind)
        .map(|a| a.address.clone())
}

pub fn first_address(node: &Node) -> Option<String> {
    node.status
        .as_ref()?
        .addresses
        .as_ref()?
        .first()
        .map(|a| a.address.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{node, pod};
    use serde_json::json;

    #[test]
    fn requested_sums_cover_node_pods() {
        let n = node("worker-1", "10.0.0.11", "4", "8Gi", true);
        let a = pod("default", "a", "worker-1", "250m", "256Mi");
        let b = pod("default", "b", "worker-1", "750m", "768Mi");

        let model = NodeModel::build(&n, &[&a, &b], None, ServiceState::Active);

        assert_eq!(model.name, "worker-1");
        assert_eq!(model.status, NodeStatus::Ready);
        assert_eq!(model.pods_count, 2);
        assert_eq!(model.requested_cpu_millis, 1000);
        assert_eq!(model.requested_memory_bytes, 1024 * 1024 * 1024);
        assert_eq!(model.allocatable_cpu_millis, 4000);
        assert_eq!(model.internal_ip.as_deref(), Some("10.0.0.11"));
        assert!(model.remote_probe_active);
        assert!(model.kubelet_healthy);
        assert!(model.runtime_healthy);
    }

    #[test]
    fn missing_metrics_fall_back_to_requested_basis() {
        let n = node("worker-1", "10.0.0.11", "4000m", "8Gi", true);
        let a = pod("default", "a", "worker-1", "1000m", "1Gi");

        let model = NodeModel::build(&n, &[&a], None, ServiceState::Unknown);

        assert_eq!(model.usage_cpu_millis, 1000);
        assert_eq!(model.cpu_ratio(false), 0.25);
        assert!(!model.remote_probe_active);
    }

    #[test]
    fn metrics_usage_is_kept_separate_from_requests() {
        let n = node("worker-1", "10.0.0.11", "4", "8Gi", true);
        let a = pod("default", "a", "worker-1", "1", "1Gi");
        let usage = MetricsUsage {
            cpu_millis: 2000,
            memory_bytes: 2 * 1024 * 1024 * 1024,
        };

        let model = NodeModel::build(&n, &[&a], Some(usage), ServiceState::Active);

        assert_eq!(model.cpu_ratio(true), 0.5);
        assert_eq!(model.cpu_ratio(false), 0.25);
        assert_eq!(model.memory_ratio(true), 0.25);
    }

    #[test]
    fn empty_node_has_zero_quantities() {
        let n: Node = serde_json::from_value(json!({ "metadata": { "name": "bare" } })).unwrap();
        let model = NodeModel::build(&n, &[], Some(MetricsUsage::default()), ServiceState::Unknown);

        assert_eq!(model.status, NodeStatus::Unknown);
        assert_eq!(model.allocatable_cpu_millis, 0);
        assert_eq!(model.cpu_ratio(true), 0.0);
        assert!(!model.runtime_healthy);
        assert!(model.internal_ip.is_none());
    }

    #[test]
    fn conditions_and_labels_are_classified() {
        let n: Node = serde_json::from_value(json!({
            "metadata": {
                "name": "cp-1",
                "labels": { "node-role.kubernetes.io/control-plane": "" }
            },
            "status": {
                "conditions": [
                    { "type": "Ready", "status": "False" },
                    { "type": "DiskPressure", "status": "True" },
                    { "type": "MemoryPressure", "status": "False" }
                ],
                "addresses": [
                    { "type": "Hostname", "address": "cp-1" },
                    { "type": "InternalIP", "address": "10.0.0.2" }
                ]
            }
        }))
        .unwrap();

        assert_eq!(node_ready_status(&n), NodeStatus::NotReady);
        assert_eq!(node_pressures(&n), vec!["DiskPressure".to_string()]);
        assert!(is_control_plane(&n));
        assert!(!is_kubelet_healthy(&n));
        assert_eq!(first_address(&n).as_deref(), Some("cp-1"));
        assert_eq!(node_address(&n, INTERNAL_IP).as_deref(), Some("10.0.0.2"));
    }
}
