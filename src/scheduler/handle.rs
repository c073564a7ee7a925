use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::state::runtime::live::live_snapshot_repository_trait::LiveSnapshotRepositoryTrait;
use crate::domain::model::{ClusterSummary, NodeModel, PodModel};
use crate::domain::snapshot::{RetainedSnapshot, SnapshotDiff};
use crate::domain::sort::{NodeSortField, PodSortField};
use crate::scheduler::EngineContext;

/// Read side of a running engine, handed to the presentation layer.
///
/// Every accessor returns an owned copy; nothing returned aliases the live
/// snapshot or the pinned one.
#[derive(Clone)]
pub struct EngineHandle {
    ctx: Arc<EngineContext>,
}

impl EngineHandle {
    pub(crate) fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Pin the current pod view. Returns the capture time.
    pub async fn pin(&self) -> DateTime<Utc> {
        let live = self.ctx.live.get().await;
        self.ctx.retention.pin(&live.pods).await
    }

    /// Pods added and removed since the pin. `None` when nothing is pinned.
    pub async fn diff(&self) -> Option<SnapshotDiff> {
        let live = self.ctx.live.get().await;
        self.ctx.retention.diff_against(&live.pods).await
    }

    pub async fn clear_pinned(&self) -> bool {
        self.ctx.retention.clear().await
    }

    pub async fn pinned(&self) -> Option<RetainedSnapshot> {
        self.ctx.retention.pinned().await
    }

    /// Change the node order and return the re-sorted view.
    pub async fn sort_nodes_by(&self, field: NodeSortField) -> Vec<NodeModel> {
        self.ctx.live.update(|s| s.set_node_sort(field)).await.nodes.clone()
    }

    pub async fn sort_pods_by(&self, field: PodSortField) -> Vec<PodModel> {
        self.ctx.live.update(|s| s.set_pod_sort(field)).await.pods.clone()
    }

    pub async fn metrics_available(&self) -> bool {
        self.ctx.live.get().await.metrics_available
    }

    pub async fn nodes(&self) -> Vec<NodeModel> {
        self.ctx.live.get().await.nodes.clone()
    }

    pub async fn pods(&self) -> Vec<PodModel> {
        self.ctx.live.get().await.pods.clone()
    }

    pub async fn summary(&self) -> Option<ClusterSummary> {
        self.ctx.live.get().await.summary.clone()
    }

    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.ctx.live.get().await.last_refresh()
    }

    /// Message and time of the most recent skipped cycle, cleared by the next
    /// successful node cycle.
    pub async fn last_error(&self) -> Option<(String, DateTime<Utc>)> {
        let live = self.ctx.live.get().await;
        live.last_error_message.clone().zip(live.last_error_at)
    }
}
