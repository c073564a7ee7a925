use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{extract_status, HealthProber, ServiceState};
use crate::config::ProbeConfig;

const ADDRESS_PLACEHOLDER: &str = "{address}";
const SERVICE_PLACEHOLDER: &str = "{service}";

/// Runs `systemctl status` on a remote host through a subprocess
/// (ssh by default) and reads the unit state from its output.
pub struct SshProber {
    command: Vec<String>,
    timeout: Option<Duration>,
}

impl SshProber {
    /// `command` is an argv template; `{address}` and `{service}` are
    /// substituted in every element.
    pub fn new(command: Vec<String>, timeout: Option<Duration>) -> Self {
        Self { command, timeout }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.command.clone(), config.timeout)
    }

    fn render(&self, address: &str, service: &str) -> Option<(String, Vec<String>)> {
        let mut argv = self.command.iter().map(|arg| {
            arg.replace(ADDRESS_PLACEHOLDER, address)
                .replace(SERVICE_PLACEHOLDER, service)
        });
        let program = argv.next()?;
        Some((program, argv.collect()))
    }
}

#[async_trait]
impl HealthProber for SshProber {
    async fn probe(&self, address: &str, service: &str) -> ServiceState {
        if address.is_empty() {
            return ServiceState::Unknown;
        }
        let Some((program, args)) = self.render(address, service) else {
            return ServiceState::Unknown;
        };

        let child = match Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                debug!("Probe of {} could not start {}: {}", address, program, e);
                return ServiceState::Unknown;
            }
        };

        // Dropping the pending wait kills the child; tokio reaps it afterwards
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    debug!("Probe of {} timed out after {:?}", address, limit);
                    return ServiceState::Unknown;
                }
            },
            None => child.wait_with_output().await,
        };

        match output {
            Ok(output) => {
                // systemctl exits non-zero for inactive units, the text is still valid
                let state = extract_status(&String::from_utf8_lossy(&output.stdout));
                debug!(
                    "Probe of {} {}: exit={:?} state={:?}",
                    address,
                    service,
                    output.status.code(),
                    state
                );
                state
            }
            Err(e) => {
                debug!("Probe of {} failed: {}", address, e);
                ServiceState::Unknown
            }
        }
    }
}
