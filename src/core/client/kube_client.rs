use anyhow::Result;
use kube::config::KubeConfigOptions;
use kube::{Client, Config};
use tracing::debug;

/// Creates a Kubernetes client from the local kubeconfig or in-cluster environment.
///
/// When `context` is set, that kubeconfig context is used instead of the current one.
pub async fn build_kube_client(context: Option<&str>) -> Result<Client> {
    let client = match context {
        Some(ctx) => {
            debug!("Using kubeconfig context '{}'", ctx);
            let options = KubeConfigOptions {
                context: Some(ctx.to_string()),
                ..Default::default()
            };
            let config = Config::from_kubeconfig(&options).await?;
            Client::try_from(config)?
        }
        None => {
            // Falls back to the in-cluster service account when no kubeconfig exists
            debug!("Using default client configuration");
            Client::try_default().await?
        }
    };

    debug!("Kubernetes client initialized successfully");
    Ok(client)
}
