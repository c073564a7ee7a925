use std::collections::HashMap;

use tracing::debug;

use crate::core::client::kube_resources::Pod;
use crate::core::client::metrics::MetricsUsage;
use crate::core::util::fanout::concurrent_map;
use crate::domain::model::{PodKey, PodModel};
use crate::scheduler::tasks::node::task::METRICS_FETCH_CONCURRENCY;
use crate::scheduler::EngineContext;

fn in_namespace(pod: &Pod, namespace: Option<&str>) -> bool {
    match namespace {
        Some(ns) => pod.metadata.namespace.as_deref() == Some(ns),
        None => true,
    }
}

fn pod_key(pod: &Pod) -> PodKey {
    PodKey {
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        name: pod.metadata.name.clone().unwrap_or_default(),
    }
}

/// Build the pod view from one cycle's pod list, restricted to the configured
/// namespace.
///
/// With metrics available a pod whose read fails counts as zero usage;
/// without metrics every pod reports its requests as usage.
pub(crate) async fn build_pod_models(
    ctx: &EngineContext,
    pods: &[Pod],
    metrics_available: bool,
) -> Vec<PodModel> {
    let namespace = ctx.config.namespace.as_deref();
    let visible: Vec<&Pod> = pods.iter().filter(|p| in_namespace(p, namespace)).collect();

    if !metrics_available {
        return visible.iter().map(|p| PodModel::build(p, None)).collect();
    }

    let usage = pod_usage(ctx, &visible).await;
    visible
        .iter()
        .map(|pod| {
            let used = usage.get(&pod_key(pod)).copied().unwrap_or_default();
            PodModel::build(pod, Some(used))
        })
        .collect()
}

async fn pod_usage(ctx: &EngineContext, pods: &[&Pod]) -> HashMap<PodKey, MetricsUsage> {
    let metrics = ctx.sources.metrics.clone();
    let keys = pods.iter().map(|pod| (pod_key(pod), pod_key(pod)));

    concurrent_map(keys, Some(METRICS_FETCH_CONCURRENCY), move |key: PodKey| {
        let metrics = metrics.clone();
        async move {
            metrics
                .pod_metrics(&key.namespace, &key.name)
                .await
                .unwrap_or_else(|e| {
                    debug!("Pod {} metrics unavailable: {}", key, e);
                    MetricsUsage::default()
                })
        }
    })
    .await
}
