use async_trait::async_trait;

use crate::core::client::kube_resources::{
    CronJob, DaemonSet, Deployment, Job, Namespace, Node, PersistentVolume,
    PersistentVolumeClaim, Pod, ReplicaSet, StatefulSet,
};
use crate::errors::EngineError;

/// Read-only view over a locally mirrored copy of cluster objects.
///
/// Every list may fail with a transient `SourceUnavailable`; callers treat that
/// as "skip this cycle", never as fatal.
#[async_trait]
pub trait ObjectCache: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>, EngineError>;
    async fn list_pods(&self) -> Result<Vec<Pod>, EngineError>;
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, EngineError>;
    async fn list_deployments(&self) -> Result<Vec<Deployment>, EngineError>;
    async fn list_daemon_sets(&self) -> Result<Vec<DaemonSet>, EngineError>;
    async fn list_replica_sets(&self) -> Result<Vec<ReplicaSet>, EngineError>;
    async fn list_stateful_sets(&self) -> Result<Vec<StatefulSet>, EngineError>;
    async fn list_jobs(&self) -> Result<Vec<Job>, EngineError>;
    async fn list_cron_jobs(&self) -> Result<Vec<CronJob>, EngineError>;
    async fn list_persistent_volumes(&self) -> Result<Vec<PersistentVolume>, EngineError>;
    async fn list_persistent_volume_claims(
        &self,
    ) -> Result<Vec<PersistentVolumeClaim>, EngineError>;
}
