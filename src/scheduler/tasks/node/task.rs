use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::core::client::authz::ClusterResource;
use crate::core::client::kube_resources::Pod;
use crate::core::client::metrics::MetricsUsage;
use crate::core::state::runtime::live::live_snapshot_repository_trait::LiveSnapshotRepositoryTrait;
use crate::core::util::fanout::concurrent_map;
use crate::domain::model::node_model::{node_address, INTERNAL_IP};
use crate::domain::model::NodeModel;
use crate::errors::EngineError;
use crate::scheduler::tasks::pod::task::build_pod_models;
use crate::scheduler::tasks::{deliver, probe_nodes};
use crate::scheduler::{EngineContext, NodeRefreshFn, PodRefreshFn};

/// Concurrent metrics reads per cycle.
pub(crate) const METRICS_FETCH_CONCURRENCY: usize = 16;

/// Callbacks fed by one node cycle. The pod view is built from the same read.
#[derive(Clone, Default)]
pub struct NodeCycleHandlers {
    pub nodes: Option<NodeRefreshFn>,
    pub pods: Option<PodRefreshFn>,
}

/// One node cycle: read, probe, fold, publish.
pub async fn refresh_nodes(
    ctx: Arc<EngineContext>,
    handlers: NodeCycleHandlers,
) -> Result<(), EngineError> {
    ctx.authorize_cycle(&[ClusterResource::Nodes, ClusterResource::Pods])
        .await?;

    let cache = &ctx.sources.cache;
    let (nodes, pods) = tokio::try_join!(cache.list_nodes(), cache.list_pods())?;
    let metrics_available = ctx.sources.metrics.is_available().await;
    debug!(
        "Read {} nodes and {} pods (metrics available: {})",
        nodes.len(),
        pods.len(),
        metrics_available
    );

    let mut pods_by_node: HashMap<&str, Vec<&Pod>> = HashMap::new();
    for pod in &pods {
        if let Some(node_name) = pod.spec.as_ref().and_then(|s| s.node_name.as_deref()) {
            pods_by_node.entry(node_name).or_default().push(pod);
        }
    }

    let names: Vec<String> = nodes
        .iter()
        .map(|n| n.metadata.name.clone().unwrap_or_default())
        .collect();

    let targets = nodes
        .iter()
        .zip(&names)
        .map(|(node, name)| (name.clone(), node_address(node, INTERNAL_IP)))
        .collect();
    let probes = probe_nodes(&ctx, targets).await;

    let usage = if metrics_available {
        Some(node_usage(&ctx, &names).await)
    } else {
        None
    };

    let node_models: Vec<NodeModel> = nodes
        .iter()
        .zip(&names)
        .map(|(node, name)| {
            let scheduled = pods_by_node
                .get(name.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();
            let used = usage
                .as_ref()
                .map(|u| u.get(name).copied().unwrap_or_default());
            let probe = probes.get(name).copied().unwrap_or_default();
            NodeModel::build(node, scheduled, used, probe)
        })
        .collect();

    let pod_models = build_pod_models(&ctx, &pods, metrics_available).await;

    // Deliver copies of what was stored, in the live state's sort order
    let snapshot = ctx
        .live
        .update(|s| s.replace_nodes(node_models, pod_models, metrics_available))
        .await;

    if ctx.cancel.is_cancelled() {
        debug!("Node cycle cancelled before delivery");
        return Ok(());
    }

    if let Some(handler) = &handlers.nodes {
        deliver("node", handler, snapshot.nodes.clone());
    }
    if let Some(handler) = &handlers.pods {
        deliver("pod", handler, snapshot.pods.clone());
    }
    Ok(())
}

/// Per-node usage. A node whose read fails counts as zero.
pub(crate) async fn node_usage(
    ctx: &EngineContext,
    names: &[String],
) -> HashMap<String, MetricsUsage> {
    let metrics = ctx.sources.metrics.clone();
    concurrent_map(
        names.iter().map(|n| (n.clone(), n.clone())),
        Some(METRICS_FETCH_CONCURRENCY),
        move |name| {
            let metrics = metrics.clone();
            async move {
                metrics.node_metrics(&name).await.unwrap_or_else(|e| {
                    debug!("Node {} metrics unavailable: {}", name, e);
                    MetricsUsage::default()
                })
            }
        },
    )
    .await
}
