use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::client::kube_resources::{ContainerStatus, Pod};
use crate::core::client::metrics::MetricsUsage;
use crate::core::util::quantity::cpu_and_memory;
use crate::core::util::time_util::created_at;

pub const STATUS_COMPLETED: &str = "Completed";
pub const STATUS_RUNNING: &str = "Running";

/// Identity of a pod across snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PodKey {
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One pod as shown in the pod view.
///
/// Every field is owned, so `clone()` is a deep copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodModel {
    pub namespace: String,
    pub name: String,
    /// Empty while unscheduled.
    pub node: String,
    pub ip: Option<String>,
    pub status: String,
    pub ready_containers: usize,
    pub total_containers: usize,
    pub restarts: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub volumes: usize,
    pub volume_mounts: usize,

    pub requested_cpu_millis: u64,
    pub requested_memory_bytes: u64,
    /// Falls back to the requested figures when metrics are absent.
    pub usage_cpu_millis: u64,
    pub usage_memory_bytes: u64,
}

impl PodModel {
    pub fn build(pod: &Pod, usage: Option<MetricsUsage>) -> Self {
        let spec = pod.spec.as_ref();
        let status = pod.status.as_ref();
        let statuses = status
            .and_then(|s| s.container_statuses.as_deref())
            .unwrap_or_default();

        let (requested_cpu_millis, requested_memory_bytes) = requested_resources(pod);
        let usage = usage.unwrap_or(MetricsUsage {
            cpu_millis: requested_cpu_millis,
            memory_bytes: requested_memory_bytes,
        });

        Self {
            namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            name: pod.metadata.name.clone().unwrap_or_default(),
            node: spec.and_then(|s| s.node_name.clone()).unwrap_or_default(),
            ip: status.and_then(|s| s.pod_ip.clone()),
            status: pod_status(pod),
            ready_containers: statuses.iter().filter(|c| c.ready).count(),
            total_containers: spec.map(|s| s.containers.len()).unwrap_or(0),
            restarts: statuses
                .iter()
                .map(|c| c.restart_count.max(0) as u64)
                .sum(),
            created_at: created_at(&pod.metadata),
            volumes: spec
                .and_then(|s| s.volumes.as_ref())
                .map(|v| v.len())
                .unwrap_or(0),
            volume_mounts: spec
                .map(|s| {
                    s.containers
                        .iter()
                        .map(|c| c.volume_mounts.as_ref().map(|m| m.len()).unwrap_or(0))
                        .sum()
                })
                .unwrap_or(0),
            requested_cpu_millis,
            requested_memory_bytes,
            usage_cpu_millis: usage.cpu_millis,
            usage_memory_bytes: usage.memory_bytes,
        }
    }

    pub fn key(&self) -> PodKey {
        PodKey {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.created_at.map(|t| now - t)
    }

    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }
}

/// Sum of container CPU (millicores) and memory (bytes) requests.
pub fn requested_resources(pod: &Pod) -> (u64, u64) {
    let Some(spec) = pod.spec.as_ref() else {
        return (0, 0);
    };
    spec.containers
        .iter()
        .map(|c| cpu_and_memory(c.resources.as_ref().and_then(|r| r.requests.as_ref())))
        .fold((0, 0), |(cpu, mem), (c, m)| {
            (cpu.saturating_add(c), mem.saturating_add(m))
        })
}

fn terminated_reason(reason: Option<&String>, signal: Option<i32>, exit_code: i32) -> String {
    match (reason.filter(|r| !r.is_empty()), signal) {
        (Some(r), _) => r.clone(),
        (None, Some(sig)) if sig != 0 => format!("Signal:{sig}"),
        _ => format!("ExitCode:{exit_code}"),
    }
}

fn init_status(statuses: &[ContainerStatus], total: usize) -> Option<String> {
    for (i, cs) in statuses.iter().enumerate() {
        let state = cs.state.as_ref();
        if let Some(t) = state.and_then(|s| s.terminated.as_ref()) {
            if t.exit_code == 0 {
                continue;
            }
            return Some(format!(
                "Init:{}",
                terminated_reason(t.reason.as_ref(), t.signal, t.exit_code)
            ));
        }
        if let Some(reason) = state
            .and_then(|s| s.waiting.as_ref())
            .and_then(|w| w.reason.as_ref())
            .filter(|r| !r.is_empty() && r.as_str() != "PodInitializing")
        {
            return Some(format!("Init:{reason}"));
        }
        return Some(format!("Init:{}/{}", i, total));
    }
    None
}

/// Status string as `kubectl get pods` prints it.
pub fn pod_status(pod: &Pod) -> String {
    let status = pod.status.as_ref();
    let mut reason = status
        .and_then(|s| s.reason.clone())
        .filter(|r| !r.is_empty())
        .or_else(|| status.and_then(|s| s.phase.clone()))
        .unwrap_or_else(|| "Unknown".to_string());

    let init_total = pod
        .spec
        .as_ref()
        .and_then(|s| s.init_containers.as_ref())
        .map(|c| c.len())
        .unwrap_or(0);
    let init_statuses = status
        .and_then(|s| s.init_container_statuses.as_deref())
        .unwrap_or_default();

    if let Some(init) = init_status(init_statuses, init_total) {
        reason = init;
    } else {
        let mut has_running = false;
        let statuses = status
            .and_then(|s| s.container_statuses.as_deref())
            .unwrap_or_default();

        for cs in statuses.iter().rev() {
            let state = cs.state.as_ref();
            let waiting = state
                .and_then(|s| s.waiting.as_ref())
                .and_then(|w| w.reason.as_ref())
                .filter(|r| !r.is_empty());

            if let Some(w) = waiting {
                reason = w.clone();
            } else if let Some(t) = state.and_then(|s| s.terminated.as_ref()) {
                reason = terminated_reason(t.reason.as_ref(), t.signal, t.exit_code);
            } else if cs.ready && state.and_then(|s| s.running.as_ref()).is_some() {
                has_running = true;
            }
        }

        // a finished sidecar must not hide a running main container
        if reason == STATUS_COMPLETED && has_running {
            reason = STATUS_RUNNING.to_string();
        }
    }

    if pod.metadata.deletion_timestamp.is_some() {
        reason = if status.and_then(|s| s.reason.as_deref()) == Some("NodeLost") {
            "Unknown".to_string()
        } else {
            "Terminating".to_string()
        };
    }

    reason
}
