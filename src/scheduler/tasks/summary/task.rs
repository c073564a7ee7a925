use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::core::client::authz::ClusterResource;
use crate::core::state::runtime::live::live_snapshot_repository_trait::LiveSnapshotRepositoryTrait;
use crate::domain::model::node_model::first_address;
use crate::domain::model::{ClusterObjects, ClusterSummary};
use crate::errors::EngineError;
use crate::scheduler::tasks::node::task::node_usage;
use crate::scheduler::tasks::{deliver, probe_nodes};
use crate::scheduler::{EngineContext, SummaryRefreshFn};

/// Read every summarized resource once. Any failed read fails the cycle.
async fn read_objects(ctx: &EngineContext) -> Result<ClusterObjects, EngineError> {
    let cache = &ctx.sources.cache;
    let (
        namespaces,
        nodes,
        pods,
        deployments,
        daemon_sets,
        replica_sets,
        stateful_sets,
        jobs,
        cron_jobs,
        persistent_volumes,
        persistent_volume_claims,
    ) = tokio::try_join!(
        cache.list_namespaces(),
        cache.list_nodes(),
        cache.list_pods(),
        cache.list_deployments(),
        cache.list_daemon_sets(),
        cache.list_replica_sets(),
        cache.list_stateful_sets(),
        cache.list_jobs(),
        cache.list_cron_jobs(),
        cache.list_persistent_volumes(),
        cache.list_persistent_volume_claims(),
    )?;

    Ok(ClusterObjects {
        namespaces,
        nodes,
        pods,
        deployments,
        daemon_sets,
        replica_sets,
        stateful_sets,
        jobs,
        cron_jobs,
        persistent_volumes,
        persistent_volume_claims,
    })
}

/// One summary cycle. Probes here are keyed by each node's first listed
/// address and only feed the remote service tally.
pub async fn refresh_summary(
    ctx: Arc<EngineContext>,
    handler: SummaryRefreshFn,
) -> Result<(), EngineError> {
    ctx.authorize_cycle(&ClusterResource::ALL).await?;

    let objects = read_objects(&ctx).await?;
    let metrics_available = ctx.sources.metrics.is_available().await;

    let targets = objects
        .nodes
        .iter()
        .map(|node| (node.metadata.name.clone().unwrap_or_default(), first_address(node)))
        .collect();
    let probes = probe_nodes(&ctx, targets).await;

    let usage_by_node = if metrics_available {
        let names: Vec<String> = objects
            .nodes
            .iter()
            .filter_map(|n| n.metadata.name.clone())
            .collect();
        node_usage(&ctx, &names).await
    } else {
        HashMap::new()
    };

    let summary = ClusterSummary::build(&objects, &usage_by_node, &probes);
    debug!(
        "Summary: {}/{} nodes ready, {} pods running",
        summary.nodes.ready(),
        summary.nodes.total(),
        summary.pods_running
    );

    ctx.live
        .update(|s| s.replace_summary(summary.clone(), metrics_available))
        .await;

    if ctx.cancel.is_cancelled() {
        debug!("Summary cycle cancelled before delivery");
        return Ok(());
    }
    deliver("summary", &handler, summary);
    Ok(())
}
