use std::fmt::Debug;

use async_trait::async_trait;
use kube::api::ListParams;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::client::authz::ClusterResource;
use crate::core::client::cache::ObjectCache;
use crate::core::client::kube_resources::{
    CronJob, DaemonSet, Deployment, Job, Namespace, Node, PersistentVolume,
    PersistentVolumeClaim, Pod, ReplicaSet, StatefulSet,
};
use crate::errors::{source_unavailable, EngineError};

/// Lists straight from the API server on every call, no local mirror.
pub struct DirectLister {
    client: Client,
}

impl DirectLister {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetch all objects of one kind across the cluster
    async fn fetch_all<K>(&self, resource: ClusterResource) -> Result<Vec<K>, EngineError>
    where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        let api: Api<K> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| source_unavailable(resource, e))?;

        debug!("Discovered {} {}", list.items.len(), resource);
        Ok(list.items)
    }
}

#[async_trait]
impl ObjectCache for DirectLister {
    async fn list_nodes(&self) -> Result<Vec<Node>, EngineError> {
        self.fetch_all(ClusterResource::Nodes).await
    }

    async fn list_pods(&self) -> Result<Vec<Pod>, EngineError> {
        self.fetch_all(ClusterResource::Pods).await
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, EngineError> {
        self.fetch_all(ClusterResource::Namespaces).await
    }

    async fn list_deployments(&self) -> Result<Vec<Deployment>, EngineError> {
        self.fetch_all(ClusterResource::Deployments).await
    }

    async fn list_daemon_sets(&self) -> Result<Vec<DaemonSet>, EngineError> {
        self.fetch_all(ClusterResource::DaemonSets).await
    }

    async fn list_replica_sets(&self) -> Result<Vec<ReplicaSet>, EngineError> {
        self.fetch_all(ClusterResource::ReplicaSets).await
    }

    async fn list_stateful_sets(&self) -> Result<Vec<StatefulSet>, EngineError> {
        self.fetch_all(ClusterResource::StatefulSets).await
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, EngineError> {
        self.fetch_all(ClusterResource::Jobs).await
    }

    async fn list_cron_jobs(&self) -> Result<Vec<CronJob>, EngineError> {
        self.fetch_all(ClusterResource::CronJobs).await
    }

    async fn list_persistent_volumes(&self) -> Result<Vec<PersistentVolume>, EngineError> {
        self.fetch_all(ClusterResource::PersistentVolumes).await
    }

    async fn list_persistent_volume_claims(
        &self,
    ) -> Result<Vec<PersistentVolumeClaim>, EngineError> {
        self.fetch_all(ClusterResource::PersistentVolumeClaims).await
    }
}
