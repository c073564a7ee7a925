use std::process::ExitCode;
use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use ktop_core::config::{CacheMode, EngineConfig};
use ktop_core::core::client::authz::KubeAuthorizer;
use ktop_core::core::client::cache::ObjectCache;
use ktop_core::core::client::kube_client::build_kube_client;
use ktop_core::core::client::lister::DirectLister;
use ktop_core::core::client::metrics::KubeMetricsClient;
use ktop_core::core::client::store::KubeStore;
use ktop_core::core::probe::SshProber;
use ktop_core::logging::init_logging;
use ktop_core::scheduler::{DataSources, Engine};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error loading config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Held until exit so buffered log lines are flushed
    let _log_guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error initializing logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("ktop-core failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: EngineConfig) -> anyhow::Result<()> {
    let client = build_kube_client(config.kube_context.as_deref()).await?;
    let mirror_cancel = CancellationToken::new();

    let (cache, store): (Arc<dyn ObjectCache>, Option<Arc<KubeStore>>) = match config.cache_mode {
        CacheMode::Watch => {
            let store = Arc::new(KubeStore::start(client.clone(), mirror_cancel.clone()));
            if !store.wait_for_sync(config.cache_sync_timeout).await {
                warn!(
                    "Object mirror not synced after {:?}; cycles skip until it is",
                    config.cache_sync_timeout
                );
            }
            let cache: Arc<dyn ObjectCache> = store.clone();
            (cache, Some(store))
        }
        CacheMode::Direct => {
            let cache: Arc<dyn ObjectCache> = Arc::new(DirectLister::new(client.clone()));
            (cache, None)
        }
    };

    let sources = DataSources {
        cache,
        metrics: Arc::new(KubeMetricsClient::new(client.clone())),
        prober: Arc::new(SshProber::from_config(&config.probe)),
        authorizer: Arc::new(KubeAuthorizer::new(client)),
    };

    let interval = config.refresh_interval;
    let mut engine = Engine::new(sources, config);
    engine.set_node_refresh_fn(|nodes| {
        info!("Node snapshot: {} nodes", nodes.len());
        Ok(())
    });
    engine.set_pod_refresh_fn(|pods| {
        info!("Pod snapshot: {} pods", pods.len());
        Ok(())
    });
    engine.set_summary_refresh_fn(|summary| {
        info!(
            "Cluster summary: {}/{} nodes ready, {}/{} pods running",
            summary.nodes.ready(),
            summary.nodes.total(),
            summary.pods_running,
            summary.pods_available
        );
        Ok(())
    });

    if let Err(e) = engine.start(interval).await {
        mirror_cancel.cancel();
        return Err(e.into());
    }

    shutdown_signal().await;
    info!("Shutting down");
    engine.shutdown().await;
    mirror_cancel.cancel();

    if let Some(store) = store {
        match Arc::try_unwrap(store) {
            Ok(store) => store.join().await,
            Err(_) => warn!("Object mirror still shared at shutdown"),
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for ctrl+c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
