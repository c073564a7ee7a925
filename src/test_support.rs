//! Fixtures and in-memory data sources shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::core::client::authz::{Authorizer, ClusterResource};
use crate::core::client::cache::ObjectCache;
use crate::core::client::kube_resources::{
    CronJob, DaemonSet, Deployment, Job, Namespace, Node, PersistentVolume,
    PersistentVolumeClaim, Pod, ReplicaSet, StatefulSet,
};
use crate::core::client::metrics::{MetricsSource, MetricsUsage};
use crate::core::probe::{HealthProber, ServiceState};
use crate::domain::model::PodModel;
use crate::errors::{source_unavailable, EngineError};
use crate::scheduler::DataSources;

pub(crate) fn node(name: &str, internal_ip: &str, cpu: &str, memory: &str, ready: bool) -> Node {
    serde_json::from_value(json!({
        "metadata": {
            "name": name,
            "creationTimestamp": "2024-01-01T00:00:00Z"
        },
        "status": {
            "allocatable": { "cpu": cpu, "memory": memory, "ephemeral-storage": "100Gi", "pods": "110" },
            "addresses": [
                { "type": "InternalIP", "address": internal_ip },
                { "type": "Hostname", "address": name }
            ],
            "conditions": [
                { "type": "Ready", "status": if ready { "True" } else { "False" } },
                { "type": "MemoryPressure", "status": "False" }
            ],
            "images": [
                { "names": ["registry.k8s.io/pause:3.9"], "sizeBytes": 300000 },
                { "names": ["nginx:1.25"], "sizeBytes": 70000000 }
            ],
            "nodeInfo": {
                "architecture": "amd64",
                "bootID": "boot",
                "containerRuntimeVersion": "containerd://1.7.2",
                "kernelVersion": "6.1.0",
                "kubeProxyVersion": "v1.31.0",
                "kubeletVersion": "v1.31.0",
                "machineID": "machine",
                "operatingSystem": "linux",
                "osImage": "Ubuntu 22.04.4 LTS",
                "systemUUID": "uuid"
            }
        }
    }))
    .unwrap()
}

/// A running pod with one ready container.
pub(crate) fn pod(namespace: &str, name: &str, node: &str, cpu: &str, memory: &str) -> Pod {
    serde_json::from_value(json!({
        "metadata": {
            "name": name,
            "namespace": namespace,
            "creationTimestamp": "2024-05-01T00:00:00Z"
        },
        "spec": {
            "nodeName": node,
            "containers": [{
                "name": "main",
                "image": "app:1.0",
                "resources": { "requests": { "cpu": cpu, "memory": memory } }
            }]
        },
        "status": {
            "phase": "Running",
            "podIP": "10.244.0.10",
            "containerStatuses": [{
                "name": "main",
                "image": "app:1.0",
                "imageID": "",
                "ready": true,
                "restartCount": 0,
                "state": { "running": { "startedAt": "2024-05-01T00:00:05Z" } }
            }]
        }
    }))
    .unwrap()
}

pub(crate) fn pod_model(namespace: &str, name: &str) -> PodModel {
    PodModel {
        namespace: namespace.to_string(),
        name: name.to_string(),
        status: "Running".to_string(),
        ..Default::default()
    }
}

#[derive(Default)]
pub(crate) struct MockCache {
    pub nodes: Mutex<Vec<Node>>,
    pub pods: Mutex<Vec<Pod>>,
    pub namespaces: Vec<Namespace>,
    pub fail_pods: AtomicBool,
    pub pod_reads: AtomicUsize,
}

impl MockCache {
    pub fn new(nodes: Vec<Node>, pods: Vec<Pod>) -> Self {
        Self {
            nodes: Mutex::new(nodes),
            pods: Mutex::new(pods),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ObjectCache for MockCache {
    async fn list_nodes(&self) -> Result<Vec<Node>, EngineError> {
        Ok(self.nodes.lock().unwrap().clone())
    }

    async fn list_pods(&self) -> Result<Vec<Pod>, EngineError> {
        self.pod_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_pods.load(Ordering::SeqCst) {
            return Err(source_unavailable(ClusterResource::Pods, "mirror not synced"));
        }
        Ok(self.pods.lock().unwrap().clone())
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, EngineError> {
        Ok(self.namespaces.clone())
    }

    async fn list_deployments(&self) -> Result<Vec<Deployment>, EngineError> {
        Ok(Vec::new())
    }

    async fn list_daemon_sets(&self) -> Result<Vec<DaemonSet>, EngineError> {
        Ok(Vec::new())
    }

    async fn list_replica_sets(&self) -> Result<Vec<ReplicaSet>, EngineError> {
        Ok(Vec::new())
    }

    async fn list_stateful_sets(&self) -> Result<Vec<StatefulSet>, EngineError> {
        Ok(Vec::new())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, EngineError> {
        Ok(Vec::new())
    }

    async fn list_cron_jobs(&self) -> Result<Vec<CronJob>, EngineError> {
        Ok(Vec::new())
    }

    async fn list_persistent_volumes(&self) -> Result<Vec<PersistentVolume>, EngineError> {
        Ok(Vec::new())
    }

    async fn list_persistent_volume_claims(
        &self,
    ) -> Result<Vec<PersistentVolumeClaim>, EngineError> {
        Ok(Vec::new())
    }
}

/// Metrics keyed by node name; nodes in `failing` report an error.
#[derive(Default)]
pub(crate) struct MockMetrics {
    pub available: bool,
    pub nodes: HashMap<String, MetricsUsage>,
    pub failing: HashSet<String>,
}

#[async_trait]
impl MetricsSource for MockMetrics {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn node_metrics(&self, node: &str) -> Result<MetricsUsage, EngineError> {
        if self.failing.contains(node) {
            return Err(EngineError::MetricsUnavailable(format!("no sample for {node}")));
        }
        Ok(self.nodes.get(node).copied().unwrap_or_default())
    }

    async fn pod_metrics(
        &self,
        _namespace: &str,
        _name: &str,
    ) -> Result<MetricsUsage, EngineError> {
        Ok(MetricsUsage {
            cpu_millis: 5,
            memory_bytes: 1024,
        })
    }
}

/// Answers by address after an optional delay. Unlisted addresses are `Unknown`.
#[derive(Default)]
pub(crate) struct MockProber {
    pub states: HashMap<String, ServiceState>,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl HealthProber for MockProber {
    async fn probe(&self, address: &str, _service: &str) -> ServiceState {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.states.get(address).copied().unwrap_or_default()
    }
}

#[derive(Default)]
pub(crate) struct MockAuthorizer {
    pub denied: Mutex<Vec<ClusterResource>>,
    pub failing: AtomicBool,
    pub checks: AtomicUsize,
}

impl MockAuthorizer {
    pub fn denying(resources: Vec<ClusterResource>) -> Self {
        Self {
            denied: Mutex::new(resources),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Authorizer for MockAuthorizer {
    async fn is_authorized(
        &self,
        resource: ClusterResource,
        _verbs: &[&str],
    ) -> Result<bool, EngineError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(EngineError::AuthorizationCheck("apiserver timeout".to_string()));
        }
        Ok(!self.denied.lock().unwrap().contains(&resource))
    }
}

pub(crate) fn sources(
    cache: Arc<MockCache>,
    metrics: Arc<MockMetrics>,
    prober: Arc<MockProber>,
    authorizer: Arc<MockAuthorizer>,
) -> DataSources {
    DataSources {
        cache,
        metrics,
        prober,
        authorizer,
    }
}
