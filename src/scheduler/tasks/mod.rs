pub mod node;
pub mod pod;
pub mod summary;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::core::probe::ServiceState;
use crate::core::state::runtime::live::live_snapshot_repository_trait::LiveSnapshotRepositoryTrait;
use crate::core::util::fanout::concurrent_map;
use crate::errors::EngineError;
use crate::scheduler::EngineContext;

/// Drive one periodic cycle until the engine is cancelled.
///
/// The first tick fires immediately. A running cycle is always awaited to
/// completion; cancellation is only observed between cycles. A failed cycle
/// leaves the previous snapshot in place and is retried on the next tick.
pub(crate) async fn run_cycle<F, Fut>(
    name: &'static str,
    period: Duration,
    ctx: Arc<EngineContext>,
    mut cycle: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), EngineError>>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        debug!("{} cycle started", name);
        match cycle().await {
            Ok(()) => debug!("{} cycle finished", name),
            Err(e) => {
                if e.is_transient() {
                    debug!("{} cycle skipped: {}", name, e);
                } else {
                    warn!("{} cycle skipped: {}", name, e);
                }
                let message = format!("{} cycle: {}", name, e);
                ctx.live.update(move |s| s.mark_error(message)).await;
            }
        }
    }

    debug!("{} cycle stopped", name);
}

/// Probe every target concurrently and wait for all of them.
///
/// Targets without an address are not probed and report `Unknown`, as does
/// any probe task that panicked.
pub(crate) async fn probe_nodes(
    ctx: &EngineContext,
    targets: Vec<(String, Option<String>)>,
) -> HashMap<String, ServiceState> {
    let names: Vec<String> = targets.iter().map(|(name, _)| name.clone()).collect();
    let prober = ctx.sources.prober.clone();
    let service = ctx.config.probe.service.clone();

    let mut states = concurrent_map(targets, ctx.config.probe.max_concurrency, move |address| {
        let prober = prober.clone();
        let service = service.clone();
        async move {
            match address {
                Some(address) => prober.probe(&address, &service).await,
                None => ServiceState::Unknown,
            }
        }
    })
    .await;

    for name in names {
        states.entry(name).or_default();
    }
    states
}

/// Hand one snapshot to a callback. A callback error is logged only.
pub(crate) fn deliver<T>(
    cycle: &str,
    handler: &Arc<dyn Fn(T) -> anyhow::Result<()> + Send + Sync>,
    value: T,
) {
    if let Err(e) = handler(value) {
        warn!("{} callback failed: {:#}", cycle, e);
    }
}
