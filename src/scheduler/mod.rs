//! The refresh engine: independent node and summary cycles that read the
//! data sources, build snapshots and hand them to registered callbacks.

pub mod handle;
pub(crate) mod tasks;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, READ_VERBS};
use crate::core::client::authz::{Authorizer, ClusterResource};
use crate::core::client::cache::ObjectCache;
use crate::core::client::metrics::MetricsSource;
use crate::core::probe::HealthProber;
use crate::core::state::runtime::live::live_snapshot_repository::LiveSnapshotRepository;
use crate::domain::model::{ClusterSummary, NodeModel, PodModel};
use crate::domain::snapshot::RetentionStore;
use crate::errors::EngineError;

pub use handle::EngineHandle;

pub type NodeRefreshFn = Arc<dyn Fn(Vec<NodeModel>) -> anyhow::Result<()> + Send + Sync>;
pub type PodRefreshFn = Arc<dyn Fn(Vec<PodModel>) -> anyhow::Result<()> + Send + Sync>;
pub type SummaryRefreshFn = Arc<dyn Fn(ClusterSummary) -> anyhow::Result<()> + Send + Sync>;

/// Everything the engine reads from.
#[derive(Clone)]
pub struct DataSources {
    pub cache: Arc<dyn ObjectCache>,
    pub metrics: Arc<dyn MetricsSource>,
    pub prober: Arc<dyn HealthProber>,
    pub authorizer: Arc<dyn Authorizer>,
}

/// State shared by the cycles and the handle of one engine instance.
pub(crate) struct EngineContext {
    pub sources: DataSources,
    pub config: EngineConfig,
    pub live: Arc<LiveSnapshotRepository>,
    pub retention: RetentionStore,
    pub cancel: CancellationToken,
}

impl EngineContext {
    /// Check get/list on every configured resource that is also in `reads`.
    pub async fn authorize(&self, reads: &[ClusterResource]) -> Result<(), EngineError> {
        for resource in self
            .config
            .authorization
            .resources
            .iter()
            .filter(|r| reads.contains(r))
        {
            let allowed = self
                .sources
                .authorizer
                .is_authorized(*resource, &READ_VERBS)
                .await
                .map_err(|e| match e {
                    EngineError::AuthorizationCheck(_) => e,
                    other => EngineError::AuthorizationCheck(other.to_string()),
                })?;

            if !allowed {
                return Err(EngineError::Unauthorized {
                    resource: *resource,
                    verbs: READ_VERBS.join(","),
                });
            }
        }
        Ok(())
    }

    /// Per-cycle re-check, skipped when disabled in the config.
    pub async fn authorize_cycle(&self, reads: &[ClusterResource]) -> Result<(), EngineError> {
        if !self.config.authorization.recheck_each_cycle {
            return Ok(());
        }
        self.authorize(reads).await
    }
}

/// Aggregation engine. Register callbacks, then `start`.
pub struct Engine {
    ctx: Arc<EngineContext>,
    node_fn: Option<NodeRefreshFn>,
    pod_fn: Option<PodRefreshFn>,
    summary_fn: Option<SummaryRefreshFn>,
    tasks: Vec<JoinHandle<()>>,
    started: bool,
}

impl Engine {
    pub fn new(sources: DataSources, config: EngineConfig) -> Self {
        let ctx = EngineContext {
            sources,
            config,
            live: LiveSnapshotRepository::new().shared(),
            retention: RetentionStore::new(),
            cancel: CancellationToken::new(),
        };
        Self {
            ctx: Arc::new(ctx),
            node_fn: None,
            pod_fn: None,
            summary_fn: None,
            tasks: Vec::new(),
            started: false,
        }
    }

    pub fn set_node_refresh_fn<F>(&mut self, f: F)
    where
        F: Fn(Vec<NodeModel>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.node_fn = Some(Arc::new(f));
    }

    pub fn set_pod_refresh_fn<F>(&mut self, f: F)
    where
        F: Fn(Vec<PodModel>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.pod_fn = Some(Arc::new(f));
    }

    pub fn set_summary_refresh_fn<F>(&mut self, f: F)
    where
        F: Fn(ClusterSummary) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.summary_fn = Some(Arc::new(f));
    }

    /// Check authorization, then spawn the cycles.
    ///
    /// Errors only for conditions no retry can fix: access denied, a failed
    /// access check, a bad interval or a second start. No cycle runs then.
    pub async fn start(&mut self, interval: Duration) -> Result<(), EngineError> {
        if self.started {
            return Err(EngineError::Config("engine already started".to_string()));
        }
        if interval.is_zero() {
            return Err(EngineError::Config("refresh interval must be positive".to_string()));
        }
        let summary_interval = self.ctx.config.summary_interval_or(interval);
        if summary_interval.is_zero() {
            return Err(EngineError::Config("summary interval must be positive".to_string()));
        }

        self.ctx.authorize(&ClusterResource::ALL).await?;
        self.started = true;

        if self.node_fn.is_some() || self.pod_fn.is_some() {
            let ctx = self.ctx.clone();
            let handlers = tasks::node::task::NodeCycleHandlers {
                nodes: self.node_fn.clone(),
                pods: self.pod_fn.clone(),
            };
            self.tasks.push(tokio::spawn(async move {
                tasks::run_cycle("node", interval, ctx.clone(), || {
                    tasks::node::task::refresh_nodes(ctx.clone(), handlers.clone())
                })
                .await;
            }));
        }

        if let Some(summary_fn) = self.summary_fn.clone() {
            let ctx = self.ctx.clone();
            self.tasks.push(tokio::spawn(async move {
                tasks::run_cycle("summary", summary_interval, ctx.clone(), || {
                    tasks::summary::task::refresh_summary(ctx.clone(), summary_fn.clone())
                })
                .await;
            }));
        }

        if self.tasks.is_empty() {
            warn!("Engine started without any refresh callback");
        }
        info!(
            "Engine started: {} cycle(s), interval={:?}, summary_interval={:?}",
            self.tasks.len(),
            interval,
            summary_interval
        );
        Ok(())
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle::new(self.ctx.clone())
    }

    /// The signal shared by every cycle.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.ctx.cancel.clone()
    }

    /// Cancel every cycle and wait for their tasks to finish.
    pub async fn shutdown(mut self) {
        self.ctx.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Cycle task ended abnormally: {}", e);
            }
        }
        debug!("Engine stopped");
    }
}

impl Drop for Engine {
    // Cycles of an engine dropped without `shutdown` stop at their next tick
    fn drop(&mut self) {
        self.ctx.cancel.cancel();
    }
}
