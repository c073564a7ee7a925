use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::config::{LogTarget, LoggingConfig};

const DEFAULT_FILTER: &str = "ktop_core=info";

/// Build the filter: `KTOP_LOG`, then `RUST_LOG`, then the configured
/// directive, then `ktop_core=info`. Noisy client crates are capped at warn.
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directive = std::env::var("KTOP_LOG")
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .or_else(|| config.filter.clone())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string());

    Ok(EnvFilter::try_new(directive)?
        .add_directive("hyper=warn".parse()?)
        .add_directive("hyper_util=warn".parse()?)
        .add_directive("tower=warn".parse()?)
        .add_directive("kube_client=warn".parse()?))
}

/// Install the global subscriber.
///
/// With a file target the returned guard flushes the background writer and
/// must be held until exit.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(config)?;

    match config.target {
        LogTarget::File => {
            std::fs::create_dir_all(&config.directory)?;
            let appender = tracing_appender::rolling::daily(&config.directory, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let fmt_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_level(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
            Ok(Some(guard))
        }
        LogTarget::Stderr => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .compact();

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
            Ok(None)
        }
    }
}
