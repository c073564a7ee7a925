use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use kube::runtime::reflector::{self, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::client::authz::ClusterResource;
use crate::core::client::cache::ObjectCache;
use crate::core::client::kube_resources::{
    CronJob, DaemonSet, Deployment, Job, Namespace, Node, PersistentVolume,
    PersistentVolumeClaim, Pod, ReplicaSet, StatefulSet,
};
use crate::errors::{source_unavailable, EngineError};

/// One reflector-fed mirror of a single resource type.
struct Mirror<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    resource: ClusterResource,
    reader: Store<K>,
    synced: Arc<AtomicBool>,
}

impl<K> Mirror<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    fn spawn(
        client: &Client,
        resource: ClusterResource,
        strip: fn(&mut K),
        cancel: &CancellationToken,
        handles: &mut Vec<JoinHandle<()>>,
    ) -> Self {
        let (reader, writer) = reflector::store::<K>();
        let synced = Arc::new(AtomicBool::new(false));
        let api: Api<K> = Api::all(client.clone());

        let flag = synced.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            info!("Starting {} reflector...", resource);

            let stream = watcher(api, watcher::Config::default())
                .modify(strip)
                .default_backoff();

            // Flag only after the reflector has applied the initial list
            let reflect = reflector::reflector(writer, stream).for_each(move |event| {
                match event {
                    Ok(watcher::Event::InitDone) => flag.store(true, Ordering::Release),
                    Ok(_) => {}
                    Err(e) => warn!("{} reflector error: {:?}", resource, e),
                }
                futures::future::ready(())
            });

            tokio::select! {
                _ = cancel.cancelled() => debug!("{} reflector stopped", resource),
                _ = reflect => warn!("{} reflector stream ended", resource),
            }
        }));

        Self {
            resource,
            reader,
            synced,
        }
    }

    fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Copy every cached object out of the store (no API call).
    fn snapshot(&self) -> Result<Vec<K>, EngineError> {
        if !self.is_synced() {
            return Err(source_unavailable(
                self.resource,
                "initial list not completed",
            ));
        }
        Ok(self.reader.state().iter().map(|o| (**o).clone()).collect())
    }
}

fn strip_managed_fields<K: Resource>(obj: &mut K) {
    obj.managed_fields_mut().clear();
}

fn strip_pod(pod: &mut Pod) {
    pod.managed_fields_mut().clear();
    pod.annotations_mut().clear();
    if let Some(status) = pod.status.as_mut() {
        // Keep container state and readiness, drop history
        status.conditions = None;
        if let Some(statuses) = status.container_statuses.as_mut() {
            for cs in statuses {
                cs.last_state = None;
            }
        }
    }
}

/// Collects the reflector tasks spawned for one store.
struct MirrorSpawner<'a> {
    client: &'a Client,
    cancel: &'a CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl MirrorSpawner<'_> {
    fn mirror<K>(&mut self, resource: ClusterResource) -> Mirror<K>
    where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    {
        self.mirror_with(resource, strip_managed_fields::<K>)
    }

    fn mirror_with<K>(&mut self, resource: ClusterResource, strip: fn(&mut K)) -> Mirror<K>
    where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    {
        Mirror::spawn(self.client, resource, strip, self.cancel, &mut self.handles)
    }
}

/// Holds an in-memory cache of every resource type the engine reads,
/// automatically kept in sync via watchers.
pub struct KubeStore {
    nodes: Mirror<Node>,
    pods: Mirror<Pod>,
    namespaces: Mirror<Namespace>,
    deployments: Mirror<Deployment>,
    daemon_sets: Mirror<DaemonSet>,
    replica_sets: Mirror<ReplicaSet>,
    stateful_sets: Mirror<StatefulSet>,
    jobs: Mirror<Job>,
    cron_jobs: Mirror<CronJob>,
    persistent_volumes: Mirror<PersistentVolume>,
    persistent_volume_claims: Mirror<PersistentVolumeClaim>,
    handles: Vec<JoinHandle<()>>,
}

impl KubeStore {
    /// Start one reflector per resource type. They run until `cancel` fires.
    pub fn start(client: Client, cancel: CancellationToken) -> Self {
        let mut spawner = MirrorSpawner {
            client: &client,
            cancel: &cancel,
            handles: Vec::new(),
        };

        let store = Self {
            nodes: spawner.mirror(ClusterResource::Nodes),
            pods: spawner.mirror_with(ClusterResource::Pods, strip_pod),
            namespaces: spawner.mirror(ClusterResource::Namespaces),
            deployments: spawner.mirror(ClusterResource::Deployments),
            daemon_sets: spawner.mirror(ClusterResource::DaemonSets),
            replica_sets: spawner.mirror(ClusterResource::ReplicaSets),
            stateful_sets: spawner.mirror(ClusterResource::StatefulSets),
            jobs: spawner.mirror(ClusterResource::Jobs),
            cron_jobs: spawner.mirror(ClusterResource::CronJobs),
            persistent_volumes: spawner.mirror(ClusterResource::PersistentVolumes),
            persistent_volume_claims: spawner.mirror(ClusterResource::PersistentVolumeClaims),
            handles: spawner.handles,
        };

        info!("All Kubernetes resource reflectors started");
        store
    }

    /// True once every reflector has completed its initial list.
    pub fn is_synced(&self) -> bool {
        self.nodes.is_synced()
            && self.pods.is_synced()
            && self.namespaces.is_synced()
            && self.deployments.is_synced()
            && self.daemon_sets.is_synced()
            && self.replica_sets.is_synced()
            && self.stateful_sets.is_synced()
            && self.jobs.is_synced()
            && self.cron_jobs.is_synced()
            && self.persistent_volumes.is_synced()
            && self.persistent_volume_claims.is_synced()
    }

    /// Wait (bounded) for the initial lists so the first refresh has data.
    pub async fn wait_for_sync(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while !self.is_synced() {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        true
    }

    /// Await every reflector task after its cancellation token fired.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

#[async_trait]
impl ObjectCache for KubeStore {
    async fn list_nodes(&self) -> Result<Vec<Node>, EngineError> {
        self.nodes.snapshot()
    }

    async fn list_pods(&self) -> Result<Vec<Pod>, EngineError> {
        self.pods.snapshot()
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, EngineError> {
        self.namespaces.snapshot()
    }

    async fn list_deployments(&self) -> Result<Vec<Deployment>, EngineError> {
        self.deployments.snapshot()
    }

    async fn list_daemon_sets(&self) -> Result<Vec<DaemonSet>, EngineError> {
        self.daemon_sets.snapshot()
    }

    async fn list_replica_sets(&self) -> Result<Vec<ReplicaSet>, EngineError> {
        self.replica_sets.snapshot()
    }

    async fn list_stateful_sets(&self) -> Result<Vec<StatefulSet>, EngineError> {
        self.stateful_sets.snapshot()
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, EngineError> {
        self.jobs.snapshot()
    }

    async fn list_cron_jobs(&self) -> Result<Vec<CronJob>, EngineError> {
        self.cron_jobs.snapshot()
    }

    async fn list_persistent_volumes(&self) -> Result<Vec<PersistentVolume>, EngineError> {
        self.persistent_volumes.snapshot()
    }

    async fn list_persistent_volume_claims(
        &self,
    ) -> Result<Vec<PersistentVolumeClaim>, EngineError> {
        self.persistent_volume_claims.snapshot()
    }
}
