use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::client::kube_resources::{
    CronJob, DaemonSet, Deployment, Job, Namespace, Node, PersistentVolume,
    PersistentVolumeClaim, Pod, ReplicaSet, StatefulSet,
};
use crate::core::client::metrics::MetricsUsage;
use crate::core::probe::ServiceState;
use crate::core::util::quantity::{bytes_of, cpu_and_memory, ratio};
use crate::core::util::time_util::created_at;
use crate::domain::model::node_model::{
    is_kubelet_healthy, is_runtime_healthy, node_pressures, node_ready_status, NodeStatus,
};
use crate::domain::model::pod_model::{pod_status, requested_resources, STATUS_COMPLETED};

/// A `(ready, total)` pair. `ready` never exceeds `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyTally {
    ready: usize,
    total: usize,
}

impl ReadyTally {
    pub fn new(ready: usize, total: usize) -> Self {
        Self {
            ready: ready.min(total),
            total,
        }
    }

    pub fn ready(&self) -> usize {
        self.ready
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Count one more member.
    pub fn record(&mut self, is_ready: bool) {
        self.total += 1;
        if is_ready {
            self.ready += 1;
        }
    }

    /// Add controller counts, clamping ready to the new total.
    pub fn add(&mut self, ready: i32, total: i32) {
        self.total += total.max(0) as usize;
        self.ready = (self.ready + ready.max(0) as usize).min(self.total);
    }
}

/// Every object list one summary cycle reads.
#[derive(Debug, Clone, Default)]
pub struct ClusterObjects {
    pub namespaces: Vec<Namespace>,
    pub nodes: Vec<Node>,
    pub pods: Vec<Pod>,
    pub deployments: Vec<Deployment>,
    pub daemon_sets: Vec<DaemonSet>,
    pub replica_sets: Vec<ReplicaSet>,
    pub stateful_sets: Vec<StatefulSet>,
    pub jobs: Vec<Job>,
    pub cron_jobs: Vec<CronJob>,
    pub persistent_volumes: Vec<PersistentVolume>,
    pub persistent_volume_claims: Vec<PersistentVolumeClaim>,
}

/// Cluster-wide rollup, rebuilt wholesale each summary cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub namespaces: usize,
    pub nodes: ReadyTally,
    pub pressures: usize,
    pub images: usize,
    pub volumes_in_use: usize,

    pub allocatable_cpu_millis: u64,
    pub allocatable_memory_bytes: u64,
    pub usage_cpu_millis: u64,
    pub usage_memory_bytes: u64,
    pub requested_cpu_millis: u64,
    pub requested_memory_bytes: u64,

    /// Non-completed pods.
    pub pods_available: usize,
    /// Running pods with every container ready.
    pub pods_running: usize,

    pub kubelet: ReadyTally,
    pub container_runtime: ReadyTally,
    pub remote_probe: ReadyTally,
    pub etcd: ReadyTally,

    pub deployments: ReadyTally,
    pub daemon_sets: ReadyTally,
    pub replica_sets: ReadyTally,
    pub stateful_sets: ReadyTally,

    pub jobs: usize,
    pub cron_jobs: usize,

    pub persistent_volumes: usize,
    pub persistent_volume_claims: usize,
    pub bound_volume_bytes: u64,
    pub bound_claim_bytes: u64,

    /// Earliest node creation time.
    pub up_since: Option<DateTime<Utc>>,
}

impl ClusterSummary {
    /// Fold one cycle's reads into a summary.
    ///
    /// `node_usage` holds metrics per node name (empty without a metrics
    /// backend); `remote_probe` holds the probe state per node name.
    pub fn build(
        objects: &ClusterObjects,
        node_usage: &HashMap<String, MetricsUsage>,
        remote_probe: &HashMap<String, ServiceState>,
    ) -> Self {
        let mut summary = ClusterSummary {
            namespaces: objects.namespaces.len(),
            jobs: objects.jobs.len(),
            cron_jobs: objects.cron_jobs.len(),
            persistent_volumes: objects.persistent_volumes.len(),
            persistent_volume_claims: objects.persistent_volume_claims.len(),
            ..Default::default()
        };

        summary.fold_nodes(&objects.nodes, node_usage, remote_probe);
        summary.fold_pods(&objects.pods);
        summary.fold_workloads(objects);
        summary.fold_volumes(objects);
        summary
    }

    fn fold_nodes(
        &mut self,
        nodes: &[Node],
        node_usage: &HashMap<String, MetricsUsage>,
        remote_probe: &HashMap<String, ServiceState>,
    ) {
        for node in nodes {
            let name = node.metadata.name.as_deref().unwrap_or_default();
            let status = node.status.as_ref();

            self.nodes.record(node_ready_status(node) == NodeStatus::Ready);
            self.pressures += node_pressures(node).len();
            self.images += status
                .and_then(|s| s.images.as_ref())
                .map(|i| i.len())
                .unwrap_or(0);
            self.volumes_in_use += status
                .and_then(|s| s.volumes_in_use.as_ref())
                .map(|v| v.len())
                .unwrap_or(0);

            let (cpu, mem) = cpu_and_memory(status.and_then(|s| s.allocatable.as_ref()));
            self.allocatable_cpu_millis = self.allocatable_cpu_millis.saturating_add(cpu);
            self.allocatable_memory_bytes = self.allocatable_memory_bytes.saturating_add(mem);

            let usage = node_usage.get(name).copied().unwrap_or_default();
            self.usage_cpu_millis = self.usage_cpu_millis.saturating_add(usage.cpu_millis);
            self.usage_memory_bytes = self.usage_memory_bytes.saturating_add(usage.memory_bytes);

            self.kubelet.record(is_kubelet_healthy(node));
            self.container_runtime.record(is_runtime_healthy(node));
            self.remote_probe.record(
                remote_probe
                    .get(name)
                    .map(|s| s.is_active())
                    .unwrap_or(false),
            );

            if let Some(created) = created_at(&node.metadata) {
                self.up_since = Some(match self.up_since {
                    Some(earliest) if earliest <= created => earliest,
                    _ => created,
                });
            }
        }
    }

    fn fold_pods(&mut self, pods: &[Pod]) {
        for pod in pods {
            let status = pod_status(pod);
            if status == STATUS_COMPLETED {
                continue;
            }
            self.pods_available += 1;

            let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
            let statuses = pod
                .status
                .as_ref()
                .and_then(|s| s.container_statuses.as_deref())
                .unwrap_or_default();
            let total = pod.spec.as_ref().map(|s| s.containers.len()).unwrap_or(0);
            let ready = statuses.iter().filter(|c| c.ready).count();
            if phase == Some("Running") && ready == total {
                self.pods_running += 1;
            }

            let (cpu, mem) = requested_resources(pod);
            self.requested_cpu_millis = self.requested_cpu_millis.saturating_add(cpu);
            self.requested_memory_bytes = self.requested_memory_bytes.saturating_add(mem);

            let is_etcd = pod
                .metadata
                .labels
                .as_ref()
                .and_then(|l| l.get("component"))
                .map(|c| c == "etcd")
                .unwrap_or(false);
            if is_etcd {
                self.etcd.record(phase == Some("Running"));
            }
        }
    }

    fn fold_workloads(&mut self, objects: &ClusterObjects) {
        for d in &objects.deployments {
            if let Some(s) = d.status.as_ref() {
                self.deployments
                    .add(s.ready_replicas.unwrap_or(0), s.replicas.unwrap_or(0));
            }
        }
        for ds in &objects.daemon_sets {
            if let Some(s) = ds.status.as_ref() {
                self.daemon_sets.add(s.number_ready, s.desired_number_scheduled);
            }
        }
        for rs in &objects.replica_sets {
            if let Some(s) = rs.status.as_ref() {
                self.replica_sets.add(s.ready_replicas.unwrap_or(0), s.replicas);
            }
        }
        for sts in &objects.stateful_sets {
            if let Some(s) = sts.status.as_ref() {
                self.stateful_sets.add(s.ready_replicas.unwrap_or(0), s.replicas);
            }
        }
    }

    fn fold_volumes(&mut self, objects: &ClusterObjects) {
        for pv in &objects.persistent_volumes {
            let bound = pv.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Bound");
            if bound {
                let capacity = pv
                    .spec
                    .as_ref()
                    .and_then(|s| s.capacity.as_ref())
                    .and_then(|c| c.get("storage"));
                self.bound_volume_bytes =
                    self.bound_volume_bytes.saturating_add(bytes_of(capacity));
            }
        }
        for pvc in &objects.persistent_volume_claims {
            let bound = pvc.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Bound");
            if bound {
                let requested = pvc
                    .spec
                    .as_ref()
                    .and_then(|s| s.resources.as_ref())
                    .and_then(|r| r.requests.as_ref())
                    .and_then(|r| r.get("storage"));
                self.bound_claim_bytes = self.bound_claim_bytes.saturating_add(bytes_of(requested));
            }
        }
    }

    pub fn uptime(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.up_since.map(|t| now - t)
    }

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{node, pod};
    use serde_json::json;

    fn objects() -> ClusterObjects {
        let mut etcd = pod("kube-system", "etcd-cp-1", "cp-1", "100m", "100Mi");
        etcd.metadata.labels = Some([("component".to_string(), "etcd".to_string())].into());

        let completed: Pod = serde_json::from_value(json!({
            "metadata": { "name": "job-1-abc", "namespace": "batch" },
            "spec": {
                "nodeName": "worker-1",
                "containers": [{ "name": "main", "image": "busybox",
                                 "resources": { "requests": { "cpu": "4" } } }]
            },
            "status": {
                "phase": "Succeeded",
                "containerStatuses": [{
                    "name": "main", "image": "busybox", "imageID": "", "ready": false, "restartCount": 0,
                    "state": { "terminated": { "exitCode": 0, "reason": "Completed" } }
                }]
            }
        }))
        .unwrap();

        ClusterObjects {
            namespaces: vec![
                serde_json::from_value(json!({ "metadata": { "name": "default" } })).unwrap(),
                serde_json::from_value(json!({ "metadata": { "name": "kube-system" } })).unwrap(),
            ],
            nodes: vec![
                node("cp-1", "10.0.0.2", "2", "4Gi", true),
                node("worker-1", "10.0.0.11", "4", "8Gi", false),
            ],
            pods: vec![
                etcd,
                pod("default", "web-0", "worker-1", "500m", "256Mi"),
                completed,
            ],
            deployments: vec![serde_json::from_value(json!({
                "metadata": { "name": "web" },
                "status": { "replicas": 3, "readyReplicas": 2 }
            }))
            .unwrap()],
            daemon_sets: vec![serde_json::from_value(json!({
                "metadata": { "name": "proxy" },
                "status": {
                    "currentNumberScheduled": 2, "desiredNumberScheduled": 2,
                    "numberMisscheduled": 0, "numberReady": 5
                }
            }))
            .unwrap()],
            persistent_volumes: vec![
                serde_json::from_value(json!({
                    "metadata": { "name": "pv-a" },
                    "spec": { "capacity": { "storage": "10Gi" } },
                    "status": { "phase": "Bound" }
                }))
                .unwrap(),
                serde_json::from_value(json!({
                    "metadata": { "name": "pv-b" },
                    "spec": { "capacity": { "storage": "5Gi" } },
                    "status": { "phase": "Available" }
                }))
                .unwrap(),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn folds_every_resource_list() {
        let probes: HashMap<String, ServiceState> = [
            ("cp-1".to_string(), ServiceState::Active),
            ("worker-1".to_string(), ServiceState::Unknown),
        ]
        .into();
        let summary = ClusterSummary::build(&objects(), &HashMap::new(), &probes);

        assert_eq!(summary.namespaces, 2);
        assert_eq!(summary.nodes, ReadyTally::new(1, 2));
        assert_eq!(summary.kubelet, ReadyTally::new(1, 2));
        assert_eq!(summary.container_runtime, ReadyTally::new(2, 2));
        assert_eq!(summary.remote_probe, ReadyTally::new(1, 2));
        assert_eq!(summary.etcd, ReadyTally::new(1, 1));
        assert_eq!(summary.allocatable_cpu_millis, 6000);
        assert_eq!(summary.deployments, ReadyTally::new(2, 3));
        assert_eq!(summary.persistent_volumes, 2);
        assert_eq!(summary.bound_volume_bytes, 10 * 1024 * 1024 * 1024);
        assert!(summary.up_since.is_some());
    }

    #[test]
    fn completed_pods_are_left_out_of_counts() {
        let summary = ClusterSummary::build(&objects(), &HashMap::new(), &HashMap::new());

        assert_eq!(summary.pods_available, 2);
        assert_eq!(summary.pods_running, 2);
        assert_eq!(summary.requested_cpu_millis, 600);
    }

    #[test]
    fn tallies_never_report_more_ready_than_total() {
        let summary = ClusterSummary::build(&objects(), &HashMap::new(), &HashMap::new());

        // the daemonset status claims 5 ready out of 2 desired
        assert_eq!(summary.daemon_sets, ReadyTally::new(2, 2));
        for tally in [
            summary.nodes,
            summary.kubelet,
            summary.container_runtime,
            summary.remote_probe,
            summary.etcd,
            summary.deployments,
            summary.daemon_sets,
            summary.replica_sets,
            summary.stateful_sets,
        ] {
            assert!(tally.ready() <= tally.total());
        }
    }

    #[test]
    fn ratio_uses_requested_basis_without_metrics() {
        let summary = ClusterSummary::build(&objects(), &HashMap::new(), &HashMap::new());
        assert_eq!(summary.usage_cpu_millis, 0);
        assert_eq!(summary.cpu_ratio(false), 0.1);
        assert_eq!(summary.cpu_ratio(true), 0.0);
    }

    #[test]
    fn node_metrics_feed_usage_totals() {
        let usage: HashMap<String, MetricsUsage> = [(
            "worker-1".to_string(),
            MetricsUsage {
                cpu_millis: 3000,
                memory_bytes: 1024,
            },
        )]
        .into();
        let summary = ClusterSummary::build(&objects(), &usage, &HashMap::new());
        assert_eq!(summary.usage_cpu_millis, 3000);
        assert_eq!(summary.cpu_ratio(true), 0.5);
    }
}
